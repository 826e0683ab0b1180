use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One frame buffer lent out by a camera driver.
///
/// Cloning is cheap (`Bytes` + `Arc`), but a frame is still owned by the
/// driver's pool: whoever acquired it must hand it back through
/// [`Camera::release`](super::Camera::release). Use [`FrameGuard`](super::FrameGuard)
/// rather than doing that by hand.
#[derive(Clone)]
pub struct Frame {
    /// Pixel or JPEG data
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(data: Bytes, meta: FrameMetadata) -> Self {
        Self {
            data,
            meta: Arc::new(meta),
            timestamp: Instant::now(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.meta.format
    }

    #[inline]
    pub fn is_jpeg(&self) -> bool {
        self.meta.format.is_jpeg()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("meta", &self.meta)
            .finish()
    }
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

/// Pixel formats a camera driver may hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Rgb565,
    Yuyv4,
    Mjpeg,
    Nv12,
    Gray8,
}

impl PixelFormat {
    #[inline]
    pub fn is_jpeg(self) -> bool {
        matches!(self, PixelFormat::Mjpeg)
    }

    /// Raw buffer length for a `width` x `height` frame, `None` for compressed formats.
    pub fn raw_len(self, width: u32, height: u32) -> Option<usize> {
        let px = width as usize * height as usize;
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(px * 3),
            PixelFormat::Rgb565 | PixelFormat::Yuyv4 => Some(px * 2),
            PixelFormat::Nv12 => Some(px * 3 / 2),
            PixelFormat::Gray8 => Some(px),
            PixelFormat::Mjpeg => None,
        }
    }
}

/// Sensor resolutions, indexed the way ESP32 camera firmware numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameSize {
    F96x96 = 0,
    Qqvga = 1,
    Qcif = 2,
    Hqvga = 3,
    F240x240 = 4,
    Qvga = 5,
    Cif = 6,
    Hvga = 7,
    Vga = 8,
    Svga = 9,
    Xga = 10,
    Hd = 11,
    Sxga = 12,
    Uxga = 13,
}

impl FrameSize {
    const ALL: [FrameSize; 14] = [
        FrameSize::F96x96,
        FrameSize::Qqvga,
        FrameSize::Qcif,
        FrameSize::Hqvga,
        FrameSize::F240x240,
        FrameSize::Qvga,
        FrameSize::Cif,
        FrameSize::Hvga,
        FrameSize::Vga,
        FrameSize::Svga,
        FrameSize::Xga,
        FrameSize::Hd,
        FrameSize::Sxga,
        FrameSize::Uxga,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FrameSize::F96x96 => (96, 96),
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qcif => (176, 144),
            FrameSize::Hqvga => (240, 176),
            FrameSize::F240x240 => (240, 240),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Hvga => (480, 320),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Hd => (1280, 720),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }
}
