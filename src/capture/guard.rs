use std::ops::Deref;

use crate::capture::{Camera, Frame};
use crate::error::CaptureError;

/// Scoped ownership of one frame borrowed from a [`Camera`].
///
/// The frame goes back to the driver when the guard is dropped, on every
/// path out of the scope that acquired it.
pub struct FrameGuard<'a, C: Camera + ?Sized> {
    camera: &'a C,
    frame: Option<Frame>,
}

impl<'a, C: Camera + ?Sized> FrameGuard<'a, C> {
    pub fn acquire(camera: &'a C) -> Result<Self, CaptureError> {
        let frame = camera.acquire()?;
        Ok(Self {
            camera,
            frame: Some(frame),
        })
    }

    /// Return the frame now rather than at end of scope.
    pub fn release(self) {
        drop(self)
    }
}

impl<C: Camera + ?Sized> Deref for FrameGuard<'_, C> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        match self.frame {
            Some(ref frame) => frame,
            // only taken in drop
            None => unreachable!("frame guard used after release"),
        }
    }
}

impl<C: Camera + ?Sized> Drop for FrameGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.camera.release(frame);
        }
    }
}
