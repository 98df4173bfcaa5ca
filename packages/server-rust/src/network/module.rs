//! HTTP front end with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, delete, get};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    add_dataset_handler, dataset_handler, health_handler, list_datasets_handler, liveness_handler,
    ping_handler, readiness_handler, remove_dataset_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::bootstrap::ServerContext;

/// Owns the listener and the shutdown controller for one server instance.
pub struct NetworkModule {
    config: NetworkConfig,
    context: Arc<ServerContext>,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, context: Arc<ServerContext>) -> Self {
        Self {
            config,
            context,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Routes and middleware over an existing state.
    ///
    /// - `GET /$/ping`, `/$/health`, `/$/health/live`, `/$/health/ready`
    /// - `GET|POST /$/datasets`, `DELETE /$/datasets/{name}`
    /// - any method on `/{dataset}/{endpoint}`
    pub fn router_for(state: AppState) -> Router {
        let layers = build_http_layers(&state.config);

        Router::new()
            .route("/$/ping", get(ping_handler))
            .route("/$/health", get(health_handler))
            .route("/$/health/live", get(liveness_handler))
            .route("/$/health/ready", get(readiness_handler))
            .route(
                "/$/datasets",
                get(list_datasets_handler).post(add_dataset_handler),
            )
            .route("/$/datasets/{name}", delete(remove_dataset_handler))
            .route("/{dataset}/{endpoint}", any(dataset_handler))
            // Body size is bounded by the HTTP layers instead.
            .layer(DefaultBodyLimit::disable())
            .layer(layers)
            .with_state(state)
    }

    pub fn build_router(&self) -> Router {
        Self::router_for(self.state())
    }

    fn state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.context),
            Arc::clone(&self.shutdown),
            Arc::new(self.config.clone()),
        )
    }

    /// Binds the TCP listener and returns the bound port, which differs
    /// from the configured one when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains in-flight
    /// requests for up to the configured drain timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, if the TLS
    /// material cannot be loaded, or on a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let shutdown_ctrl = self.shutdown;
        let config = self.config;

        shutdown_ctrl.set_ready();

        if let Some(ref tls_config) = config.tls {
            serve_tls(listener, router, tls_config, shutdown).await?;
        } else {
            info!("Serving plain HTTP connections");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await?;
        }

        drain(&shutdown_ctrl, &config).await;
        Ok(())
    }
}

/// Serves TLS connections with `axum-server`, reusing the bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls_config: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls_config.cert_path, &tls_config.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!("Serving TLS connections on {}", addr);

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn drain(shutdown_ctrl: &ShutdownController, config: &NetworkConfig) {
    shutdown_ctrl.trigger_shutdown();

    if shutdown_ctrl.wait_for_drain(config.drain_timeout).await {
        info!("All in-flight requests completed");
    } else {
        warn!(
            remaining = shutdown_ctrl.in_flight_count(),
            "Drain timeout expired with in-flight requests remaining"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::tests::test_state;
    use crate::network::HealthState;

    fn local_config() -> NetworkConfig {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..NetworkConfig::default()
        }
    }

    async fn module() -> NetworkModule {
        let state = test_state().await;
        NetworkModule::new(local_config(), state.context)
    }

    #[tokio::test]
    async fn new_creates_module_without_binding() {
        let module = module().await;
        assert!(module.listener.is_none());
    }

    #[tokio::test]
    async fn shutdown_controller_returns_shared_arc() {
        let module = module().await;
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn admin_routes_take_precedence_over_datasets() {
        let router = module().await.build_router();

        let response = router
            .clone()
            .oneshot(Request::get("/$/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/$/datasets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json[0]["name"], "ds1");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let state = test_state().await;
        state.shutdown.set_ready();
        let state = AppState {
            config: Arc::new(NetworkConfig {
                max_body_bytes: 64,
                ..NetworkConfig::default()
            }),
            ..state
        };
        let router = NetworkModule::router_for(state);

        let body = format!(
            r#"[{{"subject":"ex:s","predicate":"ex:p","object":"{}"}}]"#,
            "x".repeat(128)
        );
        let request = Request::put("/ds1/data")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module().await;
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = module().await;
        let err = module.serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let mut module = module().await;
        module.start().await.unwrap();
        let ctrl = module.shutdown_controller();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        server.await.unwrap().unwrap();
        assert_eq!(ctrl.health_state(), HealthState::Stopped);
    }
}
