//! Error types shared by the capture path, the drive controls and the HTTP handlers.

use axum::http::StatusCode;
use thiserror::Error;

use crate::capture::PixelFormat;

/// The camera driver could not hand out a frame.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no frame buffer available")]
    Unavailable,

    #[error("capture stream not started")]
    NotStarted,

    #[error("{0:?} frames are not supported by this camera")]
    UnsupportedFormat(PixelFormat),

    #[error("framesize index {0} out of range")]
    BadFrameSize(u8),

    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sensor JPEG encoding failed: {0}")]
    SensorEncode(#[source] EncodeError),
}

/// Transcoding a raw frame to JPEG failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame has zero area ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("{format:?} frame of {width}x{height} needs {expected} bytes, got {actual}")]
    Geometry {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{format:?} frame needs even dimensions, got {width}x{height}")]
    Subsampling {
        format: PixelFormat,
        width: u32,
        height: u32,
    },

    #[error("JPEG encoder failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("JPEG output rejected by sink: {0}")]
    Sink(#[from] TransportError),
}

/// Either half of producing one JPEG from the camera.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Why a media handler did not complete its response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ResponseError {
    /// The client went away, whether between writes or in the middle of an encode.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ResponseError::Transport(_) | ResponseError::Encode(EncodeError::Sink(_))
        )
    }
}

/// Writing to the client failed; the response is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("client connection closed")]
    Closed,

    #[error("response head already sent")]
    HeadSent,

    #[error("body written before response head")]
    HeadMissing,
}

/// A device setter refused the requested value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{param} value {value} rejected by device")]
pub struct DeviceError {
    pub param: &'static str,
    pub value: i32,
}

impl DeviceError {
    pub fn rejected(param: &'static str, value: i32) -> Self {
        Self { param, value }
    }
}

/// Outcome of a `/control` request that did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The query string is missing, malformed or lacks `var`/`val`.
    #[error("malformed command request: {0}")]
    RequestShape(&'static str),

    #[error("unrecognized command variable {0:?}")]
    Unrecognized(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl CommandError {
    /// Shape problems are the client's fault (404); everything else is a 500.
    pub fn status(&self) -> StatusCode {
        match self {
            CommandError::RequestShape(_) => StatusCode::NOT_FOUND,
            CommandError::Unrecognized(_) | CommandError::Device(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
