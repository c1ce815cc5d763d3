/// Canopy API - HTTP front end for the node pipeline
///
/// Accepts already-routed requests (node arrays plus a resolved query
/// descriptor), runs them through the pipeline, and answers with the
/// serialized envelope and the status code the pipeline chose.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use canopy::{
    CanopyConfig, DirectoryResolver, Fallback, HookBus, PageRequest, PageResponse, Pipeline,
    QueryState, Registry, TemplatePartResolver,
};

struct AppState {
    registry: Registry,
    hooks: HookBus,
    template_parts: Option<DirectoryResolver>,
    fallback: Fallback,
}

#[derive(Debug, Deserialize)]
struct RenderRequest {
    #[serde(flatten)]
    request: PageRequest,
    #[serde(default)]
    query: QueryState,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path = std::env::var("CANOPY_CONFIG").unwrap_or_else(|_| "canopy.yaml".to_string());
    let config = CanopyConfig::load(&config_path).expect("Failed to load configuration");

    // Registry and hooks are built once and only read while serving
    let state = Arc::new(AppState {
        registry: config.build_registry(),
        hooks: HookBus::new(),
        template_parts: config.template_part_resolver(),
        fallback: config.fallback.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/render", post(render))
        .route("/registry", get(list_registry))
        .route("/registry/*name", get(show_registration))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Canopy API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Render one request
async fn render(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let request_id = Uuid::new_v4();

    let RenderRequest { request, query } = serde_json::from_str(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid request: {}", e)))?;

    let response = render_sync(&state, request, &query);
    tracing::info!(
        "Request {} rendered with status {} ({} page nodes)",
        request_id,
        response.status,
        response.body.page.len()
    );

    let status = StatusCode::from_u16(response.status)
        .map_err(|_| AppError::InternalError(format!("Invalid status code {}", response.status)))?;

    Ok((status, Json(response.body)))
}

fn render_sync(state: &AppState, request: PageRequest, query: &QueryState) -> PageResponse {
    let mut pipeline = Pipeline::new(&state.registry, &state.hooks).with_fallback(state.fallback.clone());
    if let Some(resolver) = &state.template_parts {
        pipeline = pipeline.with_template_parts(resolver as &dyn TemplatePartResolver);
    }
    pipeline.render(request, query)
}

/// List registered node type names
async fn list_registry(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "count": state.registry.len(),
        "names": state.registry.names(),
    }))
}

/// Show one normalized registration
async fn show_registration(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let registration = state
        .registry
        .resolve(&name)
        .ok_or_else(|| AppError::NotFound(format!("No registration for '{}'", name)))?;

    serde_json::to_value(registration.as_ref())
        .map(Json)
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// Health check endpoint (liveness)
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "canopy-api",
        "version": env!("CARGO_PKG_VERSION"),
        "registrations": state.registry.len(),
    }))
}

// Error handling

#[derive(Debug)]
enum AppError {
    ValidationError(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({
            "error": message
        }))).into_response()
    }
}
