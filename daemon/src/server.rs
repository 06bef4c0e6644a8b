use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gradebook_core::{
    ComputeReport, RawEntry, ResolveError, SaveReport, ServiceError, ServiceResult, SummaryReport,
};
use serde::{Deserialize, Serialize};
use tower::limit::ConcurrencyLimitLayer;

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::gradebook::{Gradebook, ServiceHandle};

pub async fn run(config: &DaemonConfig, service: ServiceHandle) -> Result<()> {
    let addr = config.socket_addr()?;
    let app = router(config, service);

    log::info!("listening on {addr}");

    axum::Server::try_bind(&addr)
        .map_err(|err| DaemonError::Http(err.to_string()))?
        .tcp_nodelay(config.server().tcp_nodelay)
        .serve(app.into_make_service())
        .await
        .map_err(|err| DaemonError::Http(err.to_string()))
}

fn router(config: &DaemonConfig, service: ServiceHandle) -> Router {
    let state = AppState { service };

    let mut app = Router::new()
        .route("/gpa/compute", post(handle_compute))
        .route("/gpa/save", post(handle_save))
        .route("/gpa/summary", get(handle_summary))
        .route("/api/subjects", get(handle_subjects))
        .route("/catalog/reload", post(handle_reload))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    if let Some(limit) = config.server().body_limit {
        app = app.layer(DefaultBodyLimit::max(limit));
    }

    if let Some(limit) = config.server().concurrency_limit {
        app = app.layer(ConcurrencyLimitLayer::new(limit));
    }

    app
}

#[derive(Clone)]
struct AppState {
    service: ServiceHandle,
}

#[derive(Deserialize)]
struct EntriesRequest {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Serialize)]
struct SuccessResponse<T> {
    status: &'static str,
    #[serde(flatten)]
    body: T,
}

impl<T> SuccessResponse<T> {
    fn ok(body: T) -> Json<Self> {
        Json(Self { status: "ok", body })
    }
}

#[derive(Serialize)]
struct SubjectList {
    subjects: Vec<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: String,
}

type ApiResult<T> = std::result::Result<Json<SuccessResponse<T>>, ApiError>;

/// Runs a service call on the blocking pool; the core does file I/O under
/// std locks.
async fn blocking<T, F>(state: &AppState, op: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Gradebook) -> ServiceResult<T> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    let outcome = tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|err| ApiError::from(DaemonError::Join(err.to_string())))?;
    outcome.map_err(|err| ApiError::from(DaemonError::Service(err)))
}

async fn handle_compute(
    State(state): State<AppState>,
    Json(request): Json<EntriesRequest>,
) -> ApiResult<ComputeReport> {
    let report = blocking(&state, move |service| service.compute_now(&request.entries)).await?;
    Ok(SuccessResponse::ok(report))
}

async fn handle_save(
    State(state): State<AppState>,
    Json(request): Json<EntriesRequest>,
) -> ApiResult<SaveReport> {
    let report = blocking(&state, move |service| service.save_lenient(&request.entries)).await?;
    Ok(SuccessResponse::ok(report))
}

async fn handle_summary(State(state): State<AppState>) -> ApiResult<SummaryReport> {
    let report = blocking(&state, |service| service.summary()).await?;
    Ok(SuccessResponse::ok(report))
}

async fn handle_subjects(State(state): State<AppState>) -> ApiResult<SubjectList> {
    let subjects = blocking(&state, |service| service.subjects()).await?;
    Ok(SuccessResponse::ok(SubjectList { subjects }))
}

async fn handle_reload(
    State(state): State<AppState>,
) -> std::result::Result<Json<StatusResponse>, ApiError> {
    blocking(&state, |service| service.reload_catalog()).await?;
    log::info!("catalog reload requested");
    Ok(Json(StatusResponse { status: "ok" }))
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<DaemonError> for ApiError {
    fn from(err: DaemonError) -> Self {
        let (status, message) = map_daemon_error(&err);
        if status.is_server_error() {
            log::error!("request failed: {message}");
        }
        ApiError::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = ErrorResponse {
            status: "error",
            error: self.message,
        };
        (self.status, Json(payload)).into_response()
    }
}

fn map_daemon_error(err: &DaemonError) -> (StatusCode, String) {
    match err {
        DaemonError::Service(ServiceError::Validation(_))
        | DaemonError::Service(ServiceError::Resolve(ResolveError::UnresolvedSubject { .. })) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        DaemonError::Service(ServiceError::Resolve(ResolveError::Catalog(_)))
        | DaemonError::Service(ServiceError::Storage(_))
        | DaemonError::Service(ServiceError::Requirements(_))
        | DaemonError::Service(ServiceError::Catalog(_))
        | DaemonError::Io(_)
        | DaemonError::Logger(_)
        | DaemonError::Config(_)
        | DaemonError::Toml(_)
        | DaemonError::Join(_)
        | DaemonError::Http(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::Path;

    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use gradebook_core::ResolutionPolicy;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::EntriesBackendKind;
    use crate::gradebook::shared_service;

    fn config_in(dir: &Path) -> DaemonConfig {
        fs::write(
            dir.join("subjects.csv"),
            "科目ID,科目名,単位数,小区分ID\n101,微積分Ⅰ,2,7\n",
        )
        .unwrap();
        let mut config = DaemonConfig::default();
        config.data.catalog = dir.join("subjects.csv");
        config.data.entries_backend = EntriesBackendKind::Memory;
        config.data.rules = dir.join("graduation_requirements.csv");
        config.data.subcategories = dir.join("subcategories.csv");
        config.data.majors = dir.join("categories.csv");
        config.data.categories = dir.join("maincategories.csv");
        config
    }

    fn app(config: &DaemonConfig) -> Router {
        router(config, shared_service(config))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_answers() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let response = app(&config)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn compute_succeeds_for_known_subjects() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let response = app(&config)
            .oneshot(post_json(
                "/gpa/compute",
                r#"{"entries":[{"name":"微積分I","grade":"A"}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn strict_unknown_subject_is_a_bad_request() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(tmp.path());
        config.resolution.compute_policy = ResolutionPolicy::Strict;

        let response = app(&config)
            .oneshot(post_json(
                "/gpa/compute",
                r#"{"entries":[{"name":"量子力学","grade":"A"}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_requirement_tables_are_a_server_error() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let response = app(&config)
            .oneshot(Request::get("/gpa/summary").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
