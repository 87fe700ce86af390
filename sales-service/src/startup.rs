//! Application startup and lifecycle management.

use crate::config::{SalesConfig, StorageBackend};
use crate::handlers;
use crate::middleware::idempotency_middleware;
use crate::services::{
    idempotency::run_sweeper, run_event_logger, ChannelEventSink, Database, IdempotencyCache,
    InMemorySaleRepository, SaleEventSink, SaleRepository, SaleService,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: SalesConfig,
    pub sales: SaleService,
    pub idempotency: IdempotencyCache,
}

impl AppState {
    pub fn new(
        config: SalesConfig,
        repository: Arc<dyn SaleRepository>,
        events: Arc<dyn SaleEventSink>,
    ) -> Self {
        let sales = SaleService::new(repository, events, config.listing.clone());
        let idempotency = IdempotencyCache::new(config.idempotency.ttl());
        Self {
            config,
            sales,
            idempotency,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let sales_routes = Router::new()
        .route(
            "/api/sales",
            post(handlers::sales::create_sale).get(handlers::sales::list_sales),
        )
        .route(
            "/api/sales/:id",
            get(handlers::sales::get_sale)
                .put(handlers::sales::update_sale)
                .delete(handlers::sales::delete_sale),
        )
        .route(
            "/api/sales/:id/cancel",
            patch(handlers::sales::cancel_sale),
        )
        .route(
            "/api/sales/:id/reactivate",
            patch(handlers::sales::reactivate_sale),
        )
        .layer(from_fn_with_state(
            state.idempotency.clone(),
            idempotency_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(sales_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl Application {
    /// Build the application with the configured storage backend.
    pub async fn build(config: SalesConfig) -> Result<Self, AppError> {
        let repository: Arc<dyn SaleRepository> = match config.storage {
            StorageBackend::Postgres => {
                let db = Database::new(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.min_connections,
                    config.database.acquire_timeout(),
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    e
                })?;

                if config.database.run_migrations {
                    db.run_migrations().await.map_err(|e| {
                        tracing::error!("Failed to run database migrations: {}", e);
                        e
                    })?;
                }
                Arc::new(db)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory sale storage; data is lost on restart");
                Arc::new(InMemorySaleRepository::new())
            }
        };

        Self::build_with_repository(config, repository).await
    }

    /// Build the application over an already constructed repository.
    pub async fn build_with_repository(
        config: SalesConfig,
        repository: Arc<dyn SaleRepository>,
    ) -> Result<Self, AppError> {
        let (sink, events_rx) = ChannelEventSink::new();
        let state = AppState::new(config.clone(), repository, Arc::new(sink));

        let background = vec![
            tokio::spawn(run_event_logger(events_rx)),
            tokio::spawn(run_sweeper(
                state.idempotency.clone(),
                config.idempotency.sweep_interval(),
            )),
        ];

        // Port 0 binds a random port for testing.
        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Sales service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
            background,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        let result = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        for task in self.background {
            task.abort();
        }

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
