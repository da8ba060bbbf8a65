use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{default_guidance_scale, default_inference_steps, Config, LlmConfig};
use crate::engine::{QueryEngine, QUERY_ERROR_PREFIX, SAMPLE_QUERIES};
use crate::error::{KgError, Result};
use crate::image::{visualization_prompts, ImageGenerator, ImageOrigin};
use crate::llm::{create_backend, BackendKind};

/// Check if a port is available by attempting to bind to it
async fn check_port_available(addr: &str) -> bool {
    tokio::net::TcpListener::bind(addr).await.is_ok()
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    engine: Arc<QueryEngine>,
    images: Arc<ImageGenerator>,
    /// Used to build one-off backends for per-request overrides
    llm: Arc<LlmConfig>,
}

impl AppState {
    pub fn new(engine: Arc<QueryEngine>, images: Arc<ImageGenerator>, llm: LlmConfig) -> Self {
        Self {
            engine,
            images,
            llm: Arc::new(llm),
        }
    }
}

/// HTTP front end for the query engine and image generator
pub struct HttpServer {
    state: AppState,
    config: Config,
}

impl HttpServer {
    pub fn new(engine: QueryEngine, images: ImageGenerator, config: Config) -> Self {
        Self {
            state: AppState::new(Arc::new(engine), Arc::new(images), config.llm.clone()),
            config,
        }
    }

    /// Run the HTTP server until it is stopped
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.http_server.host, self.config.http_server.port);
        let app = create_router(self.state.clone(), &self.config.http_server.allowed_origins);

        if !check_port_available(&addr).await {
            return Err(KgError::Config(format!(
                "Port {} is already in use. Stop the other process or set \
                 http_server.port in config.toml",
                self.config.http_server.port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        log::info!("Starting kgquery HTTP server on http://{}", addr);

        axum::serve(listener, app).await.map_err(|e| {
            KgError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }
}

/// Build the axum router.
///
/// An empty `allowed_origins` list allows any origin.
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/graph/stats", get(handle_stats))
        .route("/api/graph/context", get(handle_context))
        .route("/api/samples", get(handle_samples))
        .route("/api/query", post(handle_query))
        .route("/api/images", post(handle_image))
        .route("/api/images/prompts", post(handle_image_prompts))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// A question, optionally answered by a different provider, model or
/// temperature than the server's bound backend.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub provider: Option<BackendKind>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl QueryRequest {
    fn has_overrides(&self) -> bool {
        self.provider.is_some() || self.model.is_some() || self.temperature.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub backend: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub origin: ImageOrigin,
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct ImagePromptsRequest {
    pub response: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

async fn handle_health(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "kgquery",
            "version": env!("CARGO_PKG_VERSION"),
            "backend": state.engine.backend_label(),
            "image_backend": state.images.has_backend(),
        })),
    )
        .into_response()
}

async fn handle_stats(State(state): State<AppState>) -> Response {
    Json(state.engine.stats()).into_response()
}

async fn handle_context(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.engine.serialize_context(),
    )
        .into_response()
}

async fn handle_samples() -> Response {
    Json(serde_json::json!({ "samples": SAMPLE_QUERIES })).into_response()
}

async fn handle_query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Response {
    let question = req.question.trim();
    if question.is_empty() {
        return bad_request("Please enter a query before executing.");
    }
    if let Some(temperature) = req.temperature {
        if !(0.0..=1.0).contains(&temperature) {
            return bad_request("temperature must be between 0.0 and 1.0");
        }
    }

    if !req.has_overrides() {
        let answer = state.engine.query(question).await;
        return Json(QueryResponse {
            answer,
            backend: state.engine.backend_label(),
        })
        .into_response();
    }

    let kind = req.provider.unwrap_or(state.llm.provider);
    let mut settings = state.llm.settings_for(kind);
    if let Some(model) = &req.model {
        settings.model = model.clone();
    }
    if let Some(temperature) = req.temperature {
        settings.temperature = temperature;
    }

    let response = match create_backend(settings) {
        Ok(backend) => QueryResponse {
            answer: state.engine.query_with(backend.as_ref(), question).await,
            backend: Some(format!("{}/{}", backend.provider_name(), backend.model_name())),
        },
        Err(e) => {
            log::warn!("Per-request {} backend failed to initialize: {}", kind, e);
            QueryResponse {
                answer: format!("{}{}", QUERY_ERROR_PREFIX, e),
                backend: None,
            }
        }
    };
    Json(response).into_response()
}

async fn handle_image(State(state): State<AppState>, Json(req): Json<ImageRequest>) -> Response {
    if req.num_inference_steps == 0 {
        return bad_request("num_inference_steps must be greater than 0");
    }

    match state
        .images
        .generate_image(&req.prompt, req.num_inference_steps, req.guidance_scale)
        .await
    {
        Some(image) => Json(ImageResponse {
            origin: image.origin,
            mime_type: image.mime_type,
            data_base64: STANDARD.encode(&image.bytes),
        })
        .into_response(),
        None => bad_request("Please enter a prompt to generate an image."),
    }
}

async fn handle_image_prompts(Json(req): Json<ImagePromptsRequest>) -> Response {
    Json(serde_json::json!({ "prompts": visualization_prompts(&req.response) })).into_response()
}
