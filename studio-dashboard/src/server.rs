//! Web front end
//!
//! `GET /` renders the page for the selection in the query string,
//! `GET /api/render` returns the render instruction as JSON and
//! `GET /api/health` reports liveness. Every request reruns the pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use studio_client::RecordSource;
use studio_common::{ConflictPolicy, Sensor, StudioError, DEFAULT_START_DAYS, DEFAULT_STOP_DAYS};

use crate::driver::{Dashboard, RenderInstruction, Selection};
use crate::error::{DashboardError, DashboardResult};
use crate::render::{HtmlRenderer, PageContent};

/// State shared across handlers
pub struct AppState<S> {
    dashboard: Arc<Dashboard<S>>,
    renderer: Arc<HtmlRenderer>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            dashboard: Arc::clone(&self.dashboard),
            renderer: Arc::clone(&self.renderer),
        }
    }
}

impl<S: RecordSource> AppState<S> {
    pub fn new(dashboard: Dashboard<S>, renderer: HtmlRenderer) -> Self {
        Self {
            dashboard: Arc::new(dashboard),
            renderer: Arc::new(renderer),
        }
    }
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Query parameters carried by the input form
///
/// The day offsets arrive as raw text so that a cleared or malformed number
/// input still reaches the handler and is reported on the page.
#[derive(Debug, Default, Deserialize)]
pub struct InputForm {
    pub sensor: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
}

/// Parse a day offset, treating a missing or blank value as `default`
fn days_param(name: &str, raw: Option<&str>, default: u32) -> Result<u32, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(text) => text
            .parse::<u32>()
            .map_err(|_| format!("{} must be a whole number of days, got {:?}", name, text)),
    }
}

impl InputForm {
    pub fn selection(&self) -> Result<Selection, StudioError> {
        let sensor = match &self.sensor {
            Some(name) => name.parse::<Sensor>()?,
            None => Sensor::default(),
        };
        let start = days_param("start", self.start.as_deref(), DEFAULT_START_DAYS);
        let stop = days_param("stop", self.stop.as_deref(), DEFAULT_STOP_DAYS);

        match (start, stop) {
            (Ok(start), Ok(stop)) => Ok(Selection::new(sensor, start, stop)),
            (start, stop) => {
                let fallback = self.fallback_selection();
                let reason = [start.err(), stop.err()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(StudioError::InvalidWindow {
                    start: fallback.start_days,
                    stop: fallback.stop_days,
                    reason,
                })
            }
        }
    }

    /// Selection to redisplay in the form when the input itself was rejected
    fn fallback_selection(&self) -> Selection {
        let sensor = self
            .sensor
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or_default();
        Selection::new(
            sensor,
            days_param("start", self.start.as_deref(), DEFAULT_START_DAYS).unwrap_or(DEFAULT_START_DAYS),
            days_param("stop", self.stop.as_deref(), DEFAULT_STOP_DAYS).unwrap_or(DEFAULT_STOP_DAYS),
        )
    }
}

/// HTTP status reported for a failed interaction
pub fn error_status(err: &DashboardError) -> StatusCode {
    match err {
        err if err.is_input_error() => StatusCode::BAD_REQUEST,
        DashboardError::PivotConflict { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DashboardError::Store(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn run_selection<S: RecordSource>(
    state: &AppState<S>,
    form: &InputForm,
) -> DashboardResult<RenderInstruction> {
    let selection = form.selection()?;
    state.dashboard.on_input_changed(&selection).await
}

async fn index<S: RecordSource + 'static>(
    State(state): State<AppState<S>>,
    Query(form): Query<InputForm>,
) -> Response {
    match run_selection(&state, &form).await {
        Ok(instruction) => {
            Html(state.renderer.render_page(&PageContent::Instruction(&instruction))).into_response()
        }
        Err(e) => {
            warn!("Failed to render dashboard: {}", e);
            let page = state.renderer.render_page(&PageContent::Error {
                selection: form.fallback_selection(),
                message: e.to_string(),
            });
            (error_status(&e), Html(page)).into_response()
        }
    }
}

async fn api_render<S: RecordSource + 'static>(
    State(state): State<AppState<S>>,
    Query(form): Query<InputForm>,
) -> Response {
    match run_selection(&state, &form).await {
        Ok(instruction) => Json(ApiResponse::success(instruction)).into_response(),
        Err(e) => {
            warn!("Failed to render dashboard: {}", e);
            (
                error_status(&e),
                Json(ApiResponse::<RenderInstruction>::error(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Liveness report with the settings every request runs with
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub bucket: String,
    pub conflict_policy: ConflictPolicy,
}

async fn health_check<S: RecordSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        bucket: state.dashboard.bucket().to_string(),
        conflict_policy: state.dashboard.conflict_policy(),
    }))
}

pub fn router<S: RecordSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(index::<S>))
        .route("/api/render", get(api_render::<S>))
        .route("/api/health", get(health_check::<S>))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

pub async fn serve<S: RecordSource + 'static>(bind_addr: SocketAddr, state: AppState<S>) -> std::io::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Starting studio dashboard on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
