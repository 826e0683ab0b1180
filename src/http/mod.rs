//! HTTP surface: a control listener and a stream listener one port above it.
//!
//! - `GET /` - control page
//! - `GET /status` - sensor parameters as JSON
//! - `GET /control?var=..&val=..` - drive and sensor commands
//! - `GET /capture` - single JPEG
//! - `GET /stream` - MJPEG, stream listener only
//!
//! Capture and stream run on separate listeners and do not lock the camera
//! against each other.

pub mod capture;
pub mod control;
pub mod response;
pub mod stream;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::robot::Robot;
use crate::ServerConfig;

pub use response::{ResponseHead, ResponseWriter};

pub fn control_router(robot: Arc<Robot>) -> Router {
    Router::new()
        .route("/", get(control::index))
        .route("/status", get(control::status))
        .route("/control", get(control::control))
        .route("/capture", get(capture::capture))
        .with_state(robot)
}

pub fn stream_router(robot: Arc<Robot>) -> Router {
    Router::new()
        .route("/stream", get(stream::stream))
        .with_state(robot)
}

/// Bind both listeners and serve until one of them fails.
pub async fn serve(config: &ServerConfig, robot: Arc<Robot>) -> std::io::Result<()> {
    let control_addr = SocketAddr::new(config.bind, config.port);
    let stream_addr = SocketAddr::new(config.bind, config.stream_port());

    let control = TcpListener::bind(control_addr).await?;
    info!("Starting web server on http://{}", control.local_addr()?);
    let stream = TcpListener::bind(stream_addr).await?;
    info!("Starting stream server on http://{}", stream.local_addr()?);

    tokio::try_join!(
        axum::serve(control, control_router(Arc::clone(&robot))).into_future(),
        axum::serve(stream, stream_router(robot)).into_future(),
    )?;
    Ok(())
}
