use crate::booking::BookingEngine;
use crate::catalog::CourseCatalog;
use crate::config::ServiceConfig;
use crate::data::{
    BindCourseRequest, BookCourseRequest, CreateCourseRequest, GetCourseRequest,
    GetStudentCourseRequest, GetTeacherCourseRequest, ScheduleCourseRequest, TCourse,
};
use crate::error::StorageError;
use crate::ledger::CapacityLedger;
use crate::reporter::{self, CourseIdData, CourseListData, Empty, ErrNo, Response};
use crate::solver;
use crate::storage::BookingStore;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared handles behind every route.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CourseCatalog>,
    pub engine: BookingEngine,
}

impl AppState {
    /// Wires catalog and engine over one ledger, seeded with the booking
    /// records already held by `store`.
    pub async fn new(
        store: Arc<dyn BookingStore>,
        config: &ServiceConfig,
    ) -> Result<Self, StorageError> {
        let timeout = config.storage_timeout();
        let counts = tokio::time::timeout(timeout, store.count_by_course())
            .await
            .map_err(|_| StorageError::Timeout(timeout))??;
        info!(
            "Found {} stored bookings over {} courses",
            counts.values().sum::<u32>(),
            counts.len()
        );

        let ledger = Arc::new(CapacityLedger::new());
        Ok(Self {
            catalog: Arc::new(CourseCatalog::with_recovered(Arc::clone(&ledger), counts)),
            engine: BookingEngine::new(ledger, store, timeout),
        })
    }
}

async fn create_course_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateCourseRequest>,
) -> Json<Response<CourseIdData>> {
    match state.catalog.create_course(&req.name, req.cap) {
        Ok(id) => Json(Response::ok(CourseIdData { course_id: id.0 })),
        Err(e) => Json(Response::status((&e).into())),
    }
}

async fn get_course_handler(
    State(state): State<AppState>,
    Query(req): Query<GetCourseRequest>,
) -> Json<Response<TCourse>> {
    match state.catalog.get_course(&req.course_id) {
        Ok(course) => Json(Response::ok(TCourse::from(&course))),
        Err(e) => Json(Response::status((&e).into())),
    }
}

async fn bind_course_handler(
    State(state): State<AppState>,
    Json(req): Json<BindCourseRequest>,
) -> Json<Empty> {
    let outcome = state.catalog.bind_course(&req.course_id, &req.teacher_id);
    Json(reporter::catalog_response(&outcome))
}

async fn unbind_course_handler(
    State(state): State<AppState>,
    Json(req): Json<BindCourseRequest>,
) -> Json<Empty> {
    let outcome = state.catalog.unbind_course(&req.course_id, &req.teacher_id);
    Json(reporter::catalog_response(&outcome))
}

async fn teacher_courses_handler(
    State(state): State<AppState>,
    Query(req): Query<GetTeacherCourseRequest>,
) -> Json<Response<CourseListData>> {
    Json(reporter::course_list(&state.catalog.teacher_courses(&req.teacher_id)))
}

async fn schedule_handler(
    State(state): State<AppState>,
    Json(req): Json<ScheduleCourseRequest>,
) -> Json<Response<BTreeMap<String, String>>> {
    let courses = state.catalog.snapshot();
    debug!("Scheduling {} teachers against {} courses", req.relationship.len(), courses.len());
    let outcome = solver::solve(&req.relationship, &courses);
    Json(reporter::schedule_response(&outcome))
}

async fn book_handler(
    State(state): State<AppState>,
    Json(req): Json<BookCourseRequest>,
) -> Json<Empty> {
    let outcome = state.engine.book(req.student_id, req.course_id).await;
    Json(reporter::booking_response(&outcome))
}

async fn unbook_handler(
    State(state): State<AppState>,
    Json(req): Json<BookCourseRequest>,
) -> Json<Empty> {
    let outcome = state.engine.unbook(req.student_id, req.course_id).await;
    Json(reporter::booking_response(&outcome))
}

async fn student_courses_handler(
    State(state): State<AppState>,
    Query(req): Query<GetStudentCourseRequest>,
) -> Json<Response<CourseListData>> {
    let ids = match state.engine.student_courses(&req.student_id).await {
        Ok(ids) => ids,
        Err(e) => return Json(Response::status((&e).into())),
    };
    if ids.is_empty() {
        return Json(Response::status(ErrNo::StudentHasNoCourse));
    }
    let courses: Vec<_> = ids
        .iter()
        .filter_map(|id| match state.catalog.get_course(id) {
            Ok(course) => Some(course),
            Err(e) => {
                warn!("Student {} holds a booking outside the catalog: {e}", req.student_id);
                None
            }
        })
        .collect();
    Json(reporter::course_list(&courses))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/course/create", post(create_course_handler))
        .route("/course/get", get(get_course_handler))
        .route("/teacher/bind_course", post(bind_course_handler))
        .route("/teacher/unbind_course", post(unbind_course_handler))
        .route("/teacher/get_course", get(teacher_courses_handler))
        .route("/course/schedule", post(schedule_handler))
        .route("/student/book_course", post(book_handler))
        .route("/student/unbook_course", post(unbook_handler))
        .route("/student/course", get(student_courses_handler))
        .with_state(state);
    Router::new().nest("/api/v1", api)
}

pub async fn run_server(config: ServiceConfig, store: Arc<dyn BookingStore>) -> std::io::Result<()> {
    let addr = config
        .socket_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let state = AppState::new(store, &config)
        .await
        .map_err(std::io::Error::other)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
