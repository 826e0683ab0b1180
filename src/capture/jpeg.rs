//! One JPEG out of the camera, whatever format the sensor is in.

use tracing::error;

use crate::capture::{encoder, Camera, FrameGuard};
use crate::error::FrameError;

/// A JPEG image and whatever owns its bytes.
///
/// Dropping it frees exactly one buffer: the driver's frame for
/// [`Jpeg::Native`], the transcoded allocation for [`Jpeg::Encoded`].
pub enum Jpeg<'a, C: Camera + ?Sized> {
    /// The sensor produced JPEG; the bytes are the frame's own buffer.
    Native(FrameGuard<'a, C>),
    /// Transcoded from a raw frame that has already gone back to the driver.
    Encoded(Vec<u8>),
}

impl<C: Camera + ?Sized> Jpeg<'_, C> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Jpeg::Native(frame) => &frame.data,
            Jpeg::Encoded(buf) => buf,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Acquire one frame and make sure it is JPEG.
///
/// A raw frame is transcoded at `quality` and released before this returns,
/// whether or not transcoding worked.
pub fn acquire_jpeg<C: Camera + ?Sized>(
    camera: &C,
    quality: u8,
) -> Result<Jpeg<'_, C>, FrameError> {
    let frame = match FrameGuard::acquire(camera) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Camera capture failed: {}", e);
            return Err(e.into());
        }
    };

    if frame.is_jpeg() {
        return Ok(Jpeg::Native(frame));
    }

    let encoded = encoder::to_jpeg(&frame, quality);
    frame.release();

    match encoded {
        Ok(buf) => Ok(Jpeg::Encoded(buf)),
        Err(e) => {
            error!("JPEG compression failed: {}", e);
            Err(e.into())
        }
    }
}
