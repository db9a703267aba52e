#![cfg(feature = "web")]

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderName, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::downloader::{self, ExportFormat};
use crate::error::{GraphError, GraphResult};
use crate::generator::{GraphData, generate};
use crate::login::{self, CurrentUser};
use crate::render::GraphOptions;
use crate::saving::{HistoryEntry, HistoryStore};
use crate::settings::{TestSettings, TestSettingsForm};
use crate::validation::validate_form;

/// Shared state for all handlers
pub struct AppState {
    pub config: ServerConfig,
    pub history: HistoryStore,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let history = HistoryStore::new(config.history_dir());
        Self { config, history }
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<crate::validation::FieldError>,
}

impl IntoResponse for GraphError {
    fn into_response(self) -> Response {
        let status = match &self {
            GraphError::InvalidTimeRange { .. }
            | GraphError::Validation(_)
            | GraphError::OutOfRange(_)
            | GraphError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            GraphError::NotFound(_) => StatusCode::NOT_FOUND,
            GraphError::Auth(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let errors = match &self {
            GraphError::Validation(errors) => errors.errors.clone(),
            _ => Vec::new(),
        };
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.to_string(),
            errors,
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the application router
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/history", get(list_history))
        .route(
            "/api/history/:id",
            get(get_history_entry).delete(delete_history_entry),
        )
        .route("/api/history/:id/export", get(export_history_entry))
        .route_layer(middleware::from_fn(login::require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(login::handle_register))
        .route("/api/login", post(login::handle_login))
        .route("/api/logout", post(login::handle_logout))
        .route("/api/graph", post(generate_graph))
        .route("/api/export", post(export_graph))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    login::init_database(&config)?;

    let bind_addr = config.bind_addr.clone();
    let app = router(Arc::new(AppState::new(config)));

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn generate_graph(Json(form): Json<TestSettingsForm>) -> GraphResult<Json<GraphData>> {
    let settings = validate_form(&form)?;
    Ok(Json(generate(&settings)?))
}

/// Builds the exported file along with its download headers
fn export_response(settings: &TestSettings, format: ExportFormat) -> GraphResult<(Response, u64)> {
    let started = Instant::now();
    let graph = generate(settings)?;
    let bytes = downloader::export(format, settings, &graph, &GraphOptions::default())?;
    let elapsed_ms = started.elapsed().as_millis();
    let file_size = bytes.len() as u64;

    let headers = [
        (header::CONTENT_TYPE, format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", format.file_name(settings)),
        ),
        (HeaderName::from_static("x-file-size"), file_size.to_string()),
        (
            HeaderName::from_static("x-generation-time-ms"),
            elapsed_ms.to_string(),
        ),
    ];
    log::info!(
        "Exported {} ({} bytes) in {} ms",
        format,
        file_size,
        elapsed_ms
    );
    Ok(((headers, bytes).into_response(), file_size))
}

fn parse_format(query: &ExportQuery) -> GraphResult<ExportFormat> {
    query.format.as_deref().unwrap_or("png").parse()
}

async fn export_graph(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
    jar: CookieJar,
    Json(form): Json<TestSettingsForm>,
) -> GraphResult<Response> {
    let format = parse_format(&query)?;
    let settings = validate_form(&form)?;
    let (response, file_size) = export_response(&settings, format)?;

    if let Some(username) = login::current_user(&jar) {
        // The export already succeeded; a history failure must not fail it.
        if let Err(e) = state.history.record(&username, &settings, format, file_size) {
            log::warn!("Failed to record history for {}: {}", username, e);
        }
    }

    Ok(response)
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> GraphResult<Json<Vec<HistoryEntry>>> {
    Ok(Json(state.history.list(&username)?))
}

async fn get_history_entry(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GraphResult<Json<TestSettingsForm>> {
    let settings = state.history.load_settings(&username, &id)?;
    Ok(Json(settings.to_form()))
}

async fn export_history_entry(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> GraphResult<Response> {
    let format = parse_format(&query)?;
    let settings = state.history.load_settings(&username, &id)?;
    let (response, _) = export_response(&settings, format)?;
    Ok(response)
}

async fn delete_history_entry(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GraphResult<StatusCode> {
    state.history.delete(&username, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
