use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use crate::catalog::Locale;
use crate::client::PortalApi;
use crate::config::Config;
use crate::enrollment_context::{EnrollmentsContext, Notification, StatusUpdate};
use crate::enrollments::EnrollmentsByStatus;
use crate::error::PortalError;
use crate::models::{CourseId, EnterpriseConfig};
use crate::query::Location;
use crate::subsidy::{DashboardCommand, DashboardView, SubsidyContext};

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn PortalApi>,
    pub config: Arc<Config>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/:slug/enterprise", get(enterprise))
        // catalog dashboard; the query string is the dashboard state
        .route("/api/:slug/dashboard", get(dashboard))
        .route("/api/:slug/dashboard/commands", post(dashboard_command))
        .route("/api/:slug/courses/:course_id/request-access", post(request_access))
        // enrollments
        .route("/api/:slug/enrollments", get(enrollments))
        .route("/api/:slug/enrollments/:course_run_id/status", patch(update_enrollment_status))
        .with_state(state)
}

async fn enterprise(State(st): State<AppState>, Path(slug): Path<String>) -> ApiResult<EnterpriseConfig> {
    Ok(Json(resolve_enterprise(&st, &slug).await?))
}

async fn dashboard(
    State(st): State<AppState>,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<DashboardView> {
    let ctx = load_dashboard(&st, &slug, query, &headers).await?;
    Ok(Json(ctx.view()))
}

async fn dashboard_command(
    State(st): State<AppState>,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(cmd): Json<DashboardCommand>,
) -> ApiResult<DashboardView> {
    let mut ctx = load_dashboard(&st, &slug, query, &headers).await?;
    ctx.apply(cmd).map_err(map_err)?;
    Ok(Json(ctx.view()))
}

async fn request_access(
    State(st): State<AppState>,
    Path((slug, course_id)): Path<(String, CourseId)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> ApiResult<DashboardView> {
    let mut ctx = load_dashboard(&st, &slug, query, &headers).await?;
    ctx.request_course(st.api.as_ref(), course_id).await.map_err(map_err)?;
    Ok(Json(ctx.view()))
}

async fn enrollments(State(st): State<AppState>, Path(slug): Path<String>) -> ApiResult<EnrollmentsContext> {
    let cfg = resolve_enterprise(&st, &slug).await?;
    Ok(Json(EnrollmentsContext::load(st.api.as_ref(), cfg.uuid).await))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdateResponse {
    course_enrollments_by_status: EnrollmentsByStatus,
    notification: Notification,
}

async fn update_enrollment_status(
    State(st): State<AppState>,
    Path((slug, course_run_id)): Path<(String, String)>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<StatusUpdateResponse> {
    if update.course_run_id != course_run_id {
        return Err(e400("course run id in path and body differ"));
    }
    let cfg = resolve_enterprise(&st, &slug).await?;
    let mut ctx = EnrollmentsContext::load(st.api.as_ref(), cfg.uuid).await;
    let notification = ctx.update_status(st.api.as_ref(), &update).await.map_err(map_err)?;
    Ok(Json(StatusUpdateResponse { course_enrollments_by_status: ctx.course_enrollments_by_status, notification }))
}

// --- helpers ---

async fn resolve_enterprise(st: &AppState, slug: &str) -> Result<EnterpriseConfig, (StatusCode, String)> {
    st.api
        .fetch_enterprise_config(slug)
        .await
        .map_err(map_err)?
        .ok_or_else(|| e404(format!("enterprise {slug} not found")))
}

async fn load_dashboard(
    st: &AppState,
    slug: &str,
    query: Option<String>,
    headers: &HeaderMap,
) -> Result<SubsidyContext, (StatusCode, String)> {
    let cfg = resolve_enterprise(st, slug).await?;
    let locale = headers
        .get(http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(Locale::from_accept_language)
        .unwrap_or_else(|| st.config.default_locale.clone());
    let location = Location::new(format!("/{slug}"), query.unwrap_or_default());
    Ok(SubsidyContext::load(st.api.as_ref(), cfg.uuid, location, locale, st.config.courses_per_page).await)
}

fn map_err(e: PortalError) -> (StatusCode, String) {
    match e {
        PortalError::NotFound(_) => e404(e.to_string()),
        PortalError::DuplicateEnrollment { .. } => (StatusCode::CONFLICT, e.to_string()),
        PortalError::InvalidCommand(_) => e400(e.to_string()),
        e if e.is_network() => e502(e),
        e => e500(e),
    }
}

fn e400<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn e404<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, msg.into())
}

fn e502<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "upstream error");
    (StatusCode::BAD_GATEWAY, e.to_string())
}

fn e500<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
