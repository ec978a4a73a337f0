use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::planning::plan::PlanReport;
use crate::planning::{AbsenceRecord, Assignment, PlanError, SubstituteChoice};
use crate::recommender::{build_recommender, RecommenderKind};
use crate::session::PlanningSession;
use crate::snapshot::store::SqliteStorage;
use crate::snapshot::Storage;
use crate::timetable::{School, Teacher, TimetableSlot, Weekday};

#[derive(Clone)]
struct ApiState {
    config: Arc<Config>,
    school: Arc<School>,
    session: Arc<Mutex<PlanningSession>>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(error: PlanError) -> Self {
        let status = if error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TimetableQuery {
    day: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlanRequest {
    date: NaiveDate,
    absences: Vec<AbsenceRecord>,
    recommender: Option<String>,
    preparer_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubstituteRequest {
    row: usize,
    teacher: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ManualNameRequest {
    row: usize,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RowQuery {
    row: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct PreparerRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    cleared: bool,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let school = Arc::new(School::load(config.resolved_timetable_path().as_deref())?);
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.resolved_db_path())?);
    let app = router(config, school, storage);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(config: Config, school: Arc<School>, storage: Arc<dyn Storage>) -> Router {
    let mut session = PlanningSession::restore(Arc::clone(&school), storage);
    if session.preparer_name().is_empty() && !config.report.preparer_name.is_empty() {
        session.set_preparer_name(&config.report.preparer_name);
    }
    let state = ApiState {
        config: Arc::new(config),
        school,
        session: Arc::new(Mutex::new(session)),
    };

    Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/teachers", get(teachers))
        .route("/v1/timetable", get(timetable))
        .route("/v1/plan", get(show_plan).post(create_plan).delete(clear_plan))
        .route("/v1/plan/substitute", post(set_substitute))
        .route("/v1/plan/manual-name", post(set_manual_name))
        .route("/v1/plan/available", get(available))
        .route("/v1/preparer", put(set_preparer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config.as_ref().clone())
}

async fn teachers(State(state): State<ApiState>) -> Json<ApiResponse<Vec<Teacher>>> {
    ok(state.school.roster.teachers().to_vec())
}

async fn timetable(
    State(state): State<ApiState>,
    Query(query): Query<TimetableQuery>,
) -> ApiResult<Vec<TimetableSlot>> {
    let day = query
        .day
        .as_deref()
        .map(Weekday::from_str)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let mut slots: Vec<TimetableSlot> = state
        .school
        .timetable
        .slots()
        .iter()
        .filter(|s| day.map_or(true, |d| s.weekday == d))
        .cloned()
        .collect();
    slots.sort_by(|a, b| {
        a.weekday
            .cmp(&b.weekday)
            .then_with(|| a.period.cmp(&b.period))
            .then_with(|| a.class.cmp(&b.class))
    });
    Ok(ok(slots))
}

async fn create_plan(
    State(state): State<ApiState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<PlanReport> {
    let kind = match request.recommender.as_deref() {
        Some(raw) => RecommenderKind::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => state.config.recommender.kind,
    };
    let recommender = build_recommender(kind, &state.config.recommender);

    // the session stays unlocked while the recommender runs
    let run = PlanningSession::prepare(&state.school, request.date, request.absences)?;
    let plan = PlanningSession::propose_plan(&state.school, &run, recommender.as_ref()).await?;

    let mut session = state.session.lock().await;
    session.commit(plan);
    if let Some(name) = request.preparer_name.as_deref() {
        session.set_preparer_name(name);
    }
    current_report(&session).map(ok)
}

async fn show_plan(State(state): State<ApiState>) -> ApiResult<PlanReport> {
    let session = state.session.lock().await;
    current_report(&session).map(ok)
}

async fn clear_plan(State(state): State<ApiState>) -> Json<ApiResponse<ClearResponse>> {
    let mut session = state.session.lock().await;
    let cleared = session.plan().is_some();
    session.clear();
    ok(ClearResponse { cleared })
}

async fn set_substitute(
    State(state): State<ApiState>,
    Json(request): Json<SubstituteRequest>,
) -> ApiResult<Assignment> {
    let choice = SubstituteChoice::from_str(&request.teacher)?;
    let mut session = state.session.lock().await;
    Ok(ok(session.set_substitute(request.row, choice)?))
}

async fn set_manual_name(
    State(state): State<ApiState>,
    Json(request): Json<ManualNameRequest>,
) -> ApiResult<Assignment> {
    let mut session = state.session.lock().await;
    Ok(ok(session.set_manual_substitute_name(request.row, &request.name)?))
}

async fn available(
    State(state): State<ApiState>,
    Query(query): Query<RowQuery>,
) -> ApiResult<Vec<Teacher>> {
    let session = state.session.lock().await;
    Ok(ok(session.available_substitutes(query.row)?))
}

async fn set_preparer(
    State(state): State<ApiState>,
    Json(request): Json<PreparerRequest>,
) -> Json<ApiResponse<PreparerRequest>> {
    let mut session = state.session.lock().await;
    session.set_preparer_name(&request.name);
    ok(PreparerRequest {
        name: session.preparer_name().to_string(),
    })
}

fn current_report(session: &PlanningSession) -> std::result::Result<PlanReport, ApiError> {
    session
        .report()
        .ok_or_else(|| ApiError::not_found("no plan has been generated"))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}
