//! HTTP front end for the local certificate authority
//!
//! Serves the certificate request page and issues certificate bundles.

pub mod bundle;
pub mod handlers;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use devcerts_cert::SigningIdentity;
use rust_embed::RustEmbed;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;

#[derive(RustEmbed)]
#[folder = "assets"]
struct StaticAssets;

/// Application state shared across handlers
pub struct AppState {
    /// Identity that signs every issued certificate
    pub authority: Arc<SigningIdentity>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "devcerts API",
        version = "0.1.0",
        description = "Issues development certificates signed by a local certificate authority"
    ),
    paths(handlers::create_certificate, handlers::health_check),
    components(schemas(
        models::CertificateRequest,
        models::CreateCertificateForm,
        models::HealthResponse,
        models::ErrorResponse,
    )),
    tags(
        (name = "certificates", description = "Certificate issuance endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS (for development)
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 80)),
            enable_cors: false,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server issuing certificates from `authority`
    pub fn new(config: ApiServerConfig, authority: SigningIdentity) -> Self {
        let state = Arc::new(AppState {
            authority: Arc::new(authority),
        });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/create-certificate", post(handlers::create_certificate))
            .route("/api/health", get(handlers::health_check))
            .route("/api/openapi.json", get(openapi_json))
            .with_state(self.state.clone())
            .fallback(serve_assets);

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            use tower_http::cors::AllowOrigin;

            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
                    // Allow common development origins
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                        || origin_str.starts_with("https://localhost:")
                        || origin_str.starts_with("https://127.0.0.1:")
                }));

            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Listening on http://{}", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serve embedded static assets, with `index.html` for the page routes
async fn serve_assets(req: axum::extract::Request) -> Response {
    let path = req.uri().path().trim_start_matches('/');

    if let Some(content) = StaticAssets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (
            [(header::CONTENT_TYPE, mime.as_ref().to_string())],
            content.data.into_owned(),
        )
            .into_response();
    }

    if req.method() == Method::GET && !path.starts_with("api") {
        if let Some(content) = StaticAssets::get("index.html") {
            return (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8".to_string())],
                content.data.into_owned(),
            )
                .into_response();
        }
    }

    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
