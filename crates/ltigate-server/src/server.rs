use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{MethodRouter, get},
};
use ltigate_auth::{InMemorySessionStore, LtiState, SessionStore, lti_guard};
use tower_http::trace::TraceLayer;

use crate::{config::AppConfig, handlers};

pub struct LtigateServer {
    addr: SocketAddr,
    app: Router,
}

/// Wraps `handler` in the LTI guard for the declared access mode.
fn protected(lti: &LtiState, declared: Option<&str>, handler: MethodRouter) -> MethodRouter {
    let route = match declared {
        Some(d) => lti.route(d),
        None => lti.undeclared(),
    };
    handler.route_layer(from_fn_with_state(route, lti_guard))
}

pub fn build_app(cfg: &AppConfig, lti: &LtiState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        // Protected routes, one access mode each
        .route(
            "/unknown_protection",
            protected(lti, None, get(handlers::hello)),
        )
        .route(
            "/any",
            protected(lti, Some("any"), get(handlers::hello).post(handlers::hello)),
        )
        .route(
            "/session",
            protected(lti, Some("session"), get(handlers::hello)),
        )
        .route(
            "/initial",
            protected(
                lti,
                Some("initial"),
                get(handlers::hello).post(handlers::hello),
            ),
        )
        .route(
            "/close_session",
            protected(lti, Some("session"), get(handlers::close_session)),
        )
        .route(
            "/post_grade/{grade}",
            protected(lti, Some("session"), get(handlers::post_grade)),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<Arc<dyn SessionStore>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses `store` for sessions instead of the in-memory default.
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> anyhow::Result<LtigateServer> {
        let store: Arc<dyn SessionStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemorySessionStore::new()),
        };
        let lti = LtiState::from_config(&self.config.lti, store)?
            .with_body_limit(self.config.server.body_limit_bytes);
        tracing::info!(
            consumers = self.config.lti.consumers.len(),
            url_fix = !self.config.lti.url_fix.is_empty(),
            "LTI guard configured"
        );

        Ok(LtigateServer {
            addr: self.addr,
            app: build_app(&self.config, &lti),
        })
    }
}

impl LtigateServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
