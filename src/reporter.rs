//! Maps solver and booking outcomes onto the API response contracts.

use crate::data::{Course, TCourse};
use crate::error::{BookingError, CatalogError, SolveError};
use crate::solver::AssignmentResult;
use log::warn;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Response status codes of the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrNo {
    Ok = 0,
    ParamInvalid = 1,
    CourseNotAvailable = 7,
    CourseHasBound = 8,
    CourseNotBind = 9,
    CourseNotExisted = 12,
    StudentHasNoCourse = 13,
    StudentHasCourse = 14,
    UnknownError = 255,
}

impl Serialize for ErrNo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// `{"Code": .., "Data": ..}` envelope; `Data` is omitted when absent.
#[derive(Debug, Clone, Serialize)]
pub struct Response<T: Serialize> {
    #[serde(rename = "Code")]
    pub code: ErrNo,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: ErrNo::Ok,
            data: Some(data),
        }
    }

    pub fn status(code: ErrNo) -> Self {
        Self { code, data: None }
    }
}

/// Response without a payload.
pub type Empty = Response<()>;

#[derive(Debug, Clone, Serialize)]
pub struct CourseIdData {
    #[serde(rename = "CourseID")]
    pub course_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseListData {
    #[serde(rename = "CourseList")]
    pub course_list: Vec<TCourse>,
}

impl From<&BookingError> for ErrNo {
    fn from(err: &BookingError) -> Self {
        match err {
            BookingError::CourseNotExisted(_) => ErrNo::CourseNotExisted,
            BookingError::CourseNotAvailable(_) => ErrNo::CourseNotAvailable,
            BookingError::StudentHasCourse { .. } => ErrNo::StudentHasCourse,
            BookingError::StudentHasNoCourse { .. } => ErrNo::StudentHasNoCourse,
            BookingError::Storage(_) | BookingError::Interrupted(_) => ErrNo::UnknownError,
        }
    }
}

impl From<&CatalogError> for ErrNo {
    fn from(err: &CatalogError) -> Self {
        match err {
            CatalogError::CourseNotExisted(_) => ErrNo::CourseNotExisted,
            CatalogError::CourseHasBound { .. } => ErrNo::CourseHasBound,
            CatalogError::CourseNotBind { .. } => ErrNo::CourseNotBind,
            CatalogError::EmptyName => ErrNo::ParamInvalid,
        }
    }
}

impl From<&SolveError> for ErrNo {
    fn from(err: &SolveError) -> Self {
        match err {
            SolveError::Invalid(_) | SolveError::NoFeasibleAssignment => ErrNo::ParamInvalid,
        }
    }
}

/// Assigned teachers only; unassigned ones are left out of the map.
pub fn schedule_response(
    outcome: &Result<AssignmentResult, SolveError>,
) -> Response<BTreeMap<String, String>> {
    match outcome {
        Ok(result) => Response::ok(
            result
                .assigned()
                .map(|(t, c)| (t.0.clone(), c.0.clone()))
                .collect(),
        ),
        Err(e) => {
            warn!("Scheduling rejected: {e}");
            Response::status(e.into())
        }
    }
}

pub fn booking_response(outcome: &Result<(), BookingError>) -> Empty {
    match outcome {
        Ok(()) => Response::status(ErrNo::Ok),
        Err(e @ (BookingError::Storage(_) | BookingError::Interrupted(_))) => {
            warn!("Booking infrastructure failure: {e}");
            Response::status(e.into())
        }
        Err(e) => Response::status(e.into()),
    }
}

pub fn catalog_response(outcome: &Result<(), CatalogError>) -> Empty {
    match outcome {
        Ok(()) => Response::status(ErrNo::Ok),
        Err(e) => Response::status(e.into()),
    }
}

pub fn course_list(courses: &[Course]) -> Response<CourseListData> {
    Response::ok(CourseListData {
        course_list: courses.iter().map(TCourse::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CourseId, TeacherId};
    use crate::error::PreferenceError;
    use serde_json::json;

    #[test]
    fn unassigned_teachers_are_omitted() {
        let result = AssignmentResult {
            assignments: BTreeMap::from([
                (TeacherId::from("1"), Some(CourseId::from("7"))),
                (TeacherId::from("2"), None),
            ]),
            total_score: 1,
        };
        let body = serde_json::to_value(schedule_response(&Ok(result))).unwrap();
        assert_eq!(body, json!({"Code": 0, "Data": {"1": "7"}}));
    }

    #[test]
    fn validation_failure_is_param_invalid() {
        let body = serde_json::to_value(schedule_response(&Err(SolveError::Invalid(
            PreferenceError::EmptyRequest,
        ))))
        .unwrap();
        assert_eq!(body, json!({"Code": 1}));
    }

    #[test]
    fn booking_codes() {
        let full = Err(BookingError::CourseNotAvailable("1".into()));
        assert_eq!(booking_response(&full).code, ErrNo::CourseNotAvailable);

        let dup = Err(BookingError::StudentHasCourse {
            student: "s".into(),
            course: "1".into(),
        });
        assert_eq!(booking_response(&dup).code, ErrNo::StudentHasCourse);

        let storage = Err(BookingError::Storage(crate::error::StorageError::Backend(
            "down".into(),
        )));
        assert_eq!(booking_response(&storage).code, ErrNo::UnknownError);

        let body = serde_json::to_value(booking_response(&Ok(()))).unwrap();
        assert_eq!(body, json!({"Code": 0}));
    }
}
