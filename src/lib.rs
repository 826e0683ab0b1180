pub mod capture;
pub mod command;
pub mod drive;
pub mod error;
pub mod http;
pub mod robot;
pub mod sink;

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use capture::{FrameSize, PixelFormat};
use serde::{Deserialize, Serialize};

pub use capture::{Camera, Frame};
pub use robot::{Drivetrain, Robot};

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub drive: DriveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: IpAddr,
    /// Control port; the stream listener takes the next one up.
    pub port: u16,
}

impl ServerConfig {
    pub fn stream_port(&self) -> u16 {
        self.port.wrapping_add(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraBackend {
    TestPattern,
    V4l2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// V4L2 device path, empty to auto-detect
    pub device: String,
    pub format: PixelFormat,
    /// Framesize index, see [`FrameSize`]
    pub framesize: u8,
    /// Sensor JPEG quality, 0 (best) to 63
    pub quality: u8,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Motor PWM duty at startup
    pub speed: u8,
    /// Flash LED duty at startup
    pub flash: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::TestPattern,
            device: String::new(),
            format: PixelFormat::Mjpeg,
            framesize: FrameSize::Qvga.index(),
            quality: 12,
            buffer_count: 2,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self { speed: 255, flash: 0 }
    }
}

impl Config {
    /// Defaults, overlaid with the file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::layered(path.map(config::File::from))
    }

    fn layered<S>(source: Option<S>) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(source) = source {
            builder = builder.add_source(source);
        }
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn defaults_round_trip_through_loader() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.stream_port(), 8081);
    }

    #[test]
    fn file_overrides_defaults() {
        let toml = r#"
            [server]
            port = 80

            [camera]
            format = "Rgb24"
            framesize = 8

            [drive]
            speed = 128
        "#;
        let config = Config::layered(Some(File::from_str(toml, FileFormat::Toml))).unwrap();
        assert_eq!(config.server.port, 80);
        assert_eq!(config.server.stream_port(), 81);
        assert_eq!(config.camera.format, PixelFormat::Rgb24);
        assert_eq!(config.camera.framesize, 8);
        assert_eq!(config.camera.quality, 12);
        assert_eq!(config.drive.speed, 128);
        assert_eq!(config.drive.flash, 0);
    }
}
