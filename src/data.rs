use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                compare_ids(&self.0, &other.0)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
    };
}

identity!(
    /// Identity of a teacher taking part in a scheduling request.
    TeacherId
);
identity!(
    /// Identity of a course in the catalog.
    CourseId
);
identity!(
    /// Identity of a student booking seats.
    StudentId
);

/// Numeric identities order by value and precede everything else,
/// which orders lexicographically.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// A course as seen by the core: catalog data plus live enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub capacity: u32,
    pub teacher: Option<TeacherId>,
    pub enrolled: u32,
}

/// The fact that a student occupies a seat in a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct BookingRecord {
    pub student: StudentId,
    pub course: CourseId,
}

impl BookingRecord {
    pub fn new(student: StudentId, course: CourseId) -> Self {
        Self { student, course }
    }
}

impl fmt::Display for BookingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.student, self.course)
    }
}

// Wire shapes of the API layer. Field names follow the public contract.

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateCourseRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Cap")]
    pub cap: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetCourseRequest {
    #[serde(rename = "CourseID")]
    pub course_id: CourseId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BindCourseRequest {
    #[serde(rename = "CourseID")]
    pub course_id: CourseId,
    #[serde(rename = "TeacherID")]
    pub teacher_id: TeacherId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetTeacherCourseRequest {
    #[serde(rename = "TeacherID")]
    pub teacher_id: TeacherId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleCourseRequest {
    #[serde(rename = "TeacherCourseRelationShip")]
    pub relationship: std::collections::BTreeMap<TeacherId, Vec<CourseId>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookCourseRequest {
    #[serde(rename = "StudentID")]
    pub student_id: StudentId,
    #[serde(rename = "CourseID")]
    pub course_id: CourseId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetStudentCourseRequest {
    #[serde(rename = "StudentID")]
    pub student_id: StudentId,
}

/// Course view returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TCourse {
    #[serde(rename = "CourseID")]
    pub course_id: CourseId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TeacherID")]
    pub teacher_id: String,
}

impl From<&Course> for TCourse {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.id.clone(),
            name: course.name.clone(),
            teacher_id: course
                .teacher
                .as_ref()
                .map(|t| t.0.clone())
                .unwrap_or_default(),
        }
    }
}
