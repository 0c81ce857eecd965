//! HTTP routes: the prediction form, the JSON API, health checks and metrics

use crate::form::{self, FormInput, Outcome};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use yield_lib::{
    health::{ComponentStatus, HealthRegistry},
    FeatureDef, PredictionOutcome, RawRecord, YieldPredictor,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<YieldPredictor>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(predictor: Arc<YieldPredictor>, health_registry: HealthRegistry) -> Self {
        Self {
            predictor,
            health_registry,
        }
    }
}

/// JSON error body for the API routes
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Prediction(yield_lib::YieldError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Prediction(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub target: String,
    pub model_version: String,
    pub columns: Vec<String>,
    pub features: Vec<FeatureDef>,
}

async fn index() -> Html<String> {
    Html(form::render_page(&FormInput::default(), &Outcome::Empty))
}

/// Form submission; re-renders the page with the prediction or the input error
async fn predict_form(
    State(state): State<Arc<AppState>>,
    Form(input): Form<FormInput>,
) -> (StatusCode, Html<String>) {
    let values = match input.validate() {
        Ok(values) => values,
        Err(message) => {
            warn!(error = %message, "Rejected form input");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(form::render_page(&input, &Outcome::Error(message))),
            );
        }
    };

    match state.predictor.predict(&values.record()) {
        Ok(outcome) => {
            info!(
                rainfall = values.rainfall,
                temperature = values.temperature,
                fertilizer = values.fertilizer,
                predicted_yield = outcome.predicted_yield,
                "Form prediction"
            );
            (
                StatusCode::OK,
                Html(form::render_page(
                    &input,
                    &Outcome::Predicted(outcome.predicted_yield),
                )),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(form::render_page(&input, &Outcome::Error(e.to_string()))),
        ),
    }
}

async fn predict_json(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawRecord>, JsonRejection>,
) -> Result<Json<PredictionOutcome>, ApiError> {
    let Json(record) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state
        .predictor
        .predict(&record)
        .map(Json)
        .map_err(ApiError::Prediction)
}

async fn schema(State(state): State<Arc<AppState>>) -> Json<SchemaResponse> {
    let predictor = &state.predictor;
    Json(SchemaResponse {
        target: predictor.target().to_string(),
        model_version: predictor.model_version().to_string(),
        columns: predictor.schema().columns().to_vec(),
        features: predictor.schema().features().to_vec(),
    })
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/api/v1/predict", post(predict_json))
        .route("/api/v1/schema", get(schema))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
