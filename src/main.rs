//! rovercam: camera robot control server

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rovercam::capture::{Camera, TestPatternCamera};
use rovercam::{http, CameraBackend, CameraConfig, Config, Drivetrain, Robot};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rovercam=debug")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("rovercam launching...");

    // Load configuration
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    info!("Configuration: {:?}", config);

    let camera = open_camera(&config.camera)?;
    let robot = Arc::new(Robot::new(camera, Drivetrain::simulated(), &config.drive));

    tokio::select! {
        served = http::serve(&config.server, robot) => served?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!("rovercam shutting down");
    Ok(())
}

fn open_camera(config: &CameraConfig) -> Result<Arc<dyn Camera>> {
    match config.backend {
        CameraBackend::TestPattern => Ok(Arc::new(TestPatternCamera::new(config)?)),
        #[cfg(feature = "v4l2")]
        CameraBackend::V4l2 => Ok(Arc::new(rovercam::capture::V4l2Camera::open(config)?)),
        #[cfg(not(feature = "v4l2"))]
        CameraBackend::V4l2 => Err(color_eyre::eyre::eyre!("built without the v4l2 feature")),
    }
}
