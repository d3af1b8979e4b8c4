//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use plotline_store::LedgerStore;
use plotline_types::Clock;

use crate::error::RpcError;
use crate::handlers::{self, SharedEngine};

/// Build the router over a shared engine.
pub fn router<S, C>(engine: SharedEngine<S, C>) -> Router
where
    S: LedgerStore + 'static,
    C: Clock + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics::<S, C>))
        .route("/chapters", post(handlers::open_chapter::<S, C>))
        .route("/chapters/:id/close", post(handlers::close_chapter::<S, C>))
        .route("/chapters/:id/resolve", post(handlers::resolve_chapter::<S, C>))
        .route(
            "/chapters/:id/reset-streaks",
            post(handlers::reset_streaks::<S, C>),
        )
        .route("/chapters/:id/odds", get(handlers::chapter_odds::<S, C>))
        .route("/chapters/:id/audit", get(handlers::chapter_audit::<S, C>))
        .route("/bets", post(handlers::place_bet::<S, C>))
        .route("/claims", post(handlers::claim::<S, C>))
        .route("/pools/active", get(handlers::active_pools::<S, C>))
        .route("/pools/:id", get(handlers::pool_breakdown::<S, C>))
        .route("/users/:id/bets", get(handlers::user_bets::<S, C>))
        .route("/users/:id/stats", get(handlers::user_stats::<S, C>))
        .route("/leaderboard", get(handlers::leaderboard::<S, C>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(engine)
}

pub struct RpcServer<S, C> {
    engine: SharedEngine<S, C>,
    addr: SocketAddr,
}

impl<S, C> RpcServer<S, C>
where
    S: LedgerStore + 'static,
    C: Clock + 'static,
{
    pub fn new(engine: SharedEngine<S, C>, addr: SocketAddr) -> Self {
        Self { engine, addr }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.engine))
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn start(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "rpc server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;

        tracing::info!("rpc server stopped");
        Ok(())
    }
}
