//! HTTP trigger surface
//!
//! Every request to `/` is one invocation of the handler. Decision paths
//! answer 200 with the message; faults surface as 500.

use crate::auth::TokenProvider;
use crate::compute::ComputeApi;
use crate::handler::RestartHandler;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Invocation failed");
        let error_msg = format!("Internal server error: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, error_msg).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Create the trigger router
pub fn create_app<T, C>(handler: Arc<RestartHandler<T, C>>) -> Router
where
    T: TokenProvider + 'static,
    C: ComputeApi + 'static,
{
    Router::new()
        .route("/", get(trigger::<T, C>).post(trigger::<T, C>))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn trigger<T, C>(
    State(handler): State<Arc<RestartHandler<T, C>>>,
) -> AppResult<(StatusCode, String)>
where
    T: TokenProvider + 'static,
    C: ComputeApi + 'static,
{
    let outcome = handler.handle().await?;
    Ok((StatusCode::OK, outcome.message))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Serve triggers until the process is stopped
pub async fn serve<T, C>(addr: SocketAddr, handler: Arc<RestartHandler<T, C>>) -> anyhow::Result<()>
where
    T: TokenProvider + 'static,
    C: ComputeApi + 'static,
{
    let app = create_app(handler);

    info!("Listening for triggers on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
