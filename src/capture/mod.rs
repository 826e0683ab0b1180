pub mod encoder;
pub mod frame;
pub mod guard;
pub mod jpeg;
pub mod pattern;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use serde::Serialize;

use crate::error::{CaptureError, DeviceError};

pub use frame::{Frame, FrameMetadata, FrameSize, PixelFormat};
pub use guard::FrameGuard;
pub use jpeg::{acquire_jpeg, Jpeg};
pub use pattern::TestPatternCamera;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Camera;

/// Camera driver contract.
///
/// A driver lends out frames from a fixed pool. Every frame returned by
/// [`acquire`](Camera::acquire) must come back through
/// [`release`](Camera::release) exactly once; [`FrameGuard`] does that on drop.
///
/// Drivers do not serialize callers. Two handlers capturing from the same
/// camera at the same time is the caller's problem.
pub trait Camera: Send + Sync {
    /// Take one frame out of the driver's pool.
    fn acquire(&self) -> Result<Frame, CaptureError>;

    /// Hand a frame back to the pool.
    fn release(&self, frame: Frame);

    /// Format of the frames the sensor currently produces.
    fn pixel_format(&self) -> PixelFormat;

    /// Current framesize index and JPEG quality.
    fn status(&self) -> SensorStatus;

    fn set_framesize(&self, framesize: i32) -> Result<(), DeviceError>;

    fn set_quality(&self, quality: i32) -> Result<(), DeviceError>;
}

/// Snapshot of the tunable sensor parameters, serialized as the `/status` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorStatus {
    pub framesize: u8,
    pub quality: u8,
}
