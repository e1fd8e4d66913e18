//! Error taxonomy shared by the core components.

use crate::data::{CourseId, StudentId, TeacherId};
use std::time::Duration;

/// Rejections raised while validating a scheduling request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("scheduling request contains no teachers")]
    EmptyRequest,

    #[error("teacher {teacher} references unknown course {course}")]
    InvalidCourseReference { teacher: TeacherId, course: CourseId },

    #[error("teacher {teacher} lists course {course} more than once")]
    DuplicatePreference { teacher: TeacherId, course: CourseId },
}

/// Failures of a whole scheduling call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Invalid(#[from] PreferenceError),

    /// The validated preference graph has no candidate edge at all.
    #[error("no teacher has a candidate course")]
    NoFeasibleAssignment,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("course {0} has no remaining capacity")]
    CourseFull(CourseId),

    #[error("course {0} is not tracked by the ledger")]
    UnknownCourse(CourseId),
}

/// Failures reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage write timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("course {0} does not exist")]
    CourseNotExisted(CourseId),

    #[error("course {0} is full")]
    CourseNotAvailable(CourseId),

    #[error("student {student} already booked course {course}")]
    StudentHasCourse { student: StudentId, course: CourseId },

    #[error("student {student} has no booking for course {course}")]
    StudentHasNoCourse { student: StudentId, course: CourseId },

    /// The seat was not taken by someone else; our own write failed.
    #[error("booking storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The critical section task was aborted by the runtime.
    #[error("booking task did not complete: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("course {0} does not exist")]
    CourseNotExisted(CourseId),

    #[error("course {course} is already bound to teacher {teacher}")]
    CourseHasBound { course: CourseId, teacher: TeacherId },

    #[error("course {course} is not bound to teacher {teacher}")]
    CourseNotBind { course: CourseId, teacher: TeacherId },

    #[error("course name must not be empty")]
    EmptyName,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address '{0}'")]
    BindAddr(String),
}
