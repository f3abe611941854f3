//! API server setup and startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::middleware::RateLimitLayer;
use crate::routes;
use crate::state::AppState;

pub struct Server {
    config: ServerConfig,
    app: Router,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let state = Arc::new(AppState::new(config.clone()).await?);
        let app = Self::build_app(state, &config);
        Ok(Self { config, app })
    }

    fn build_app(state: Arc<AppState>, config: &ServerConfig) -> Router {
        let mut app = routes::create_router(state);

        if config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            app = app.layer(cors);
        }

        app = app.layer(RateLimitLayer::default());
        app
    }

    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .expect("invalid socket address");

        info!("swapgraph marketplace API starting on http://{addr}");
        info!("health check: http://{addr}/healthz");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("failed to bind address");

        axum::serve(listener, self.app).await.expect("server error");
        Ok(())
    }

    /// The underlying router, for in-process testing via
    /// `tower::ServiceExt::oneshot` without binding a real socket.
    pub fn router(self) -> Router {
        self.app
    }
}
