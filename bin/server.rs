// LearnTrack - Report Server
// Read-only JSON API over the records and the report engine

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use learntrack::entities::{course, student, Course, Student};
use learntrack::{
    open_database, AppConfig, AttendanceSummary, GpaSummary, RecordsError, ReportConfig,
    ReportEngine, ReportError, SqliteStore, Transcript,
};
use learntrack::reports::OverallStatistics;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    reports: ReportConfig,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db.lock().map_err(|_| ApiError::Poisoned)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Rendered text report
#[derive(Serialize)]
struct ReportText {
    report: String,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug)]
enum ApiError {
    Report(ReportError),
    Records(RecordsError),
    Poisoned,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Report(ReportError::NotFound { .. })
            | ApiError::Records(RecordsError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Report(ReportError::NoData(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Records(RecordsError::Validation(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Report(e) => e.to_string(),
            ApiError::Records(e) => e.to_string(),
            ApiError::Poisoned => "database unavailable".to_string(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Report(err)
    }
}

impl From<RecordsError> for ApiError {
    fn from(err: RecordsError) -> Self {
        ApiError::Records(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.message(), "request failed");
        }
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message()),
        };
        (status, Json(body)).into_response()
    }
}

fn engine<'c>(conn: &'c Connection, reports: &ReportConfig) -> ReportEngine<SqliteStore<'c>> {
    ReportEngine::with_config(SqliteStore::new(conn), reports.clone())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/students
async fn list_students(State(state): State<AppState>) -> ApiResult<Vec<Student>> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(student::get_all_students(&conn)?))
}

/// GET /api/courses
async fn list_courses(State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(course::get_all_courses(&conn)?))
}

/// GET /api/students/:id/gpa
async fn student_gpa(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<GpaSummary> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(engine(&conn, &state.reports).compute_gpa(id)?))
}

/// GET /api/students/:id/transcript
async fn student_transcript(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Transcript> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(engine(&conn, &state.reports).transcript(id)?))
}

/// GET /api/students/:id/report
async fn student_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ReportText> {
    let conn = state.conn()?;
    let report = engine(&conn, &state.reports).render_student_report(id)?;
    Ok(ApiResponse::ok(ReportText { report }))
}

/// GET /api/courses/:id/report
async fn course_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ReportText> {
    let conn = state.conn()?;
    let report = engine(&conn, &state.reports).render_course_report(id)?;
    Ok(ApiResponse::ok(ReportText { report }))
}

/// GET /api/attendance/:student_id/:course_id
async fn attendance_percentage(
    State(state): State<AppState>,
    Path((student_id, course_id)): Path<(i64, i64)>,
) -> ApiResult<AttendanceSummary> {
    let conn = state.conn()?;
    let summary =
        engine(&conn, &state.reports).compute_attendance_percentage(student_id, course_id)?;
    Ok(ApiResponse::ok(summary))
}

/// GET /api/statistics
async fn statistics(State(state): State<AppState>) -> ApiResult<OverallStatistics> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(engine(&conn, &state.reports).overall_statistics()?))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/students", get(list_students))
        .route("/courses", get(list_courses))
        .route("/students/:id/gpa", get(student_gpa))
        .route("/students/:id/transcript", get(student_transcript))
        .route("/students/:id/report", get(student_report))
        .route("/courses/:id/report", get(course_report))
        .route("/attendance/:student_id/:course_id", get(attendance_percentage))
        .route("/statistics", get(statistics))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("LEARNTRACK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    let config = AppConfig::load(None).context("failed to load configuration")?;
    let conn = open_database(&config.database.path, config.database.wal).with_context(|| {
        format!("failed to open database {}", config.database.path.display())
    })?;
    info!(path = %config.database.path.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        reports: config.reports.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "report server listening");

    axum::serve(listener, router(state))
        .await
        .context("server stopped unexpectedly")
}

#[cfg(test)]
mod tests {
    use super::*;
    use learntrack::entities::{NewAcademicRecord, NewCourse, NewStudent};
    use learntrack::setup_database;

    fn state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        student::add_student(
            &conn,
            &NewStudent {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                date_of_birth: None,
            },
        )
        .unwrap();
        course::add_course(
            &conn,
            &NewCourse {
                course_code: "CS101".to_string(),
                course_name: "Intro".to_string(),
                credits: Some(3),
                description: None,
            },
        )
        .unwrap();
        learntrack::entities::academic::add_academic_record(
            &conn,
            &NewAcademicRecord {
                student_id: 1,
                course_id: 1,
                semester: "Fall".to_string(),
                year: 2023,
                grade: "B".to_string(),
                score: 80.0,
                remarks: None,
            },
        )
        .unwrap();
        AppState {
            db: Arc::new(Mutex::new(conn)),
            reports: ReportConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_gpa_handler() {
        let Json(body) = student_gpa(State(state()), Path(1)).await.unwrap();
        let gpa = body.data.unwrap();
        assert_eq!(gpa.courses, 1);
        assert!((gpa.gpa - 3.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_student_is_404() {
        let err = student_transcript(State(state()), Path(99)).await.err().unwrap();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "Student 99 not found");
    }

    #[tokio::test]
    async fn test_attendance_without_records_is_no_data() {
        let err = attendance_percentage(State(state()), Path((1, 1)))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_listings() {
        let state = state();
        let Json(students) = list_students(State(state.clone())).await.unwrap();
        assert_eq!(students.data.unwrap()[0].email, "ada@example.com");
        let Json(courses) = list_courses(State(state)).await.unwrap();
        assert_eq!(courses.data.unwrap()[0].code, "CS101");
    }
}
