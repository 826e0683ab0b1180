//! V4L2 capture backend

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::{Camera, Frame, FrameMetadata, FrameSize, PixelFormat, SensorStatus};
use crate::error::{CaptureError, DeviceError};
use crate::CameraConfig;

/// Camera backed by a V4L2 device with memory-mapped buffers.
///
/// The format is fixed when the stream starts, so the sensor setters only
/// accept the values already in effect.
pub struct V4l2Camera {
    _device: Device,
    stream: Mutex<MmapStream<'static>>,
    format: PixelFormat,
    framesize: FrameSize,
    quality: u8,
    width: u32,
    height: u32,
    sequence: AtomicU64,
}

impl V4l2Camera {
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let path = if config.device.is_empty() {
            auto_detect_device()?
        } else {
            config.device.clone()
        };
        info!("Initializing V4L2 capture: {}", path);

        let device = Device::with_path(&path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "device doesn't support video capture",
            )));
        }

        let framesize = FrameSize::from_index(config.framesize.into())
            .ok_or(CaptureError::BadFrameSize(config.framesize))?;
        let (width, height) = framesize.dimensions();

        let mut fmt = device.format()?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = match config.format {
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
            PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
            PixelFormat::Nv12 => FourCC::new(b"NV12"),
            PixelFormat::Gray8 => FourCC::new(b"GREY"),
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };
        let fmt = device.set_format(&fmt)?;

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, config.buffer_count)?;
        info!(
            "Capture stream started: {}x{} {}, {} buffers",
            fmt.width, fmt.height, fmt.fourcc, config.buffer_count
        );

        Ok(Self {
            _device: device,
            stream: Mutex::new(stream),
            format: config.format,
            framesize,
            quality: config.quality,
            width: fmt.width,
            height: fmt.height,
            sequence: AtomicU64::new(0),
        })
    }
}

impl Camera for V4l2Camera {
    #[instrument(skip(self))]
    fn acquire(&self) -> Result<Frame, CaptureError> {
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);

        let (buf, meta) = stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        // The mmap'd buffer is requeued on the next dequeue, so copy out now
        let data = Bytes::copy_from_slice(&buf[..used]);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        Ok(Frame::new(
            data,
            FrameMetadata {
                sequence,
                width: self.width,
                height: self.height,
                stride: self.width,
                format: self.format,
                device_timestamp: Some(
                    Duration::from_secs(meta.timestamp.sec as u64)
                        + Duration::from_micros(meta.timestamp.usec as u64),
                ),
            },
        ))
    }

    fn release(&self, frame: Frame) {
        debug!(sequence = frame.meta.sequence, "frame released");
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn status(&self) -> SensorStatus {
        SensorStatus {
            framesize: self.framesize.index(),
            quality: self.quality,
        }
    }

    fn set_framesize(&self, framesize: i32) -> Result<(), DeviceError> {
        if framesize == i32::from(self.framesize.index()) {
            Ok(())
        } else {
            Err(DeviceError::rejected("framesize", framesize))
        }
    }

    fn set_quality(&self, quality: i32) -> Result<(), DeviceError> {
        if quality == i32::from(self.quality) {
            Ok(())
        } else {
            Err(DeviceError::rejected("quality", quality))
        }
    }
}

/// First `/dev/videoN` that can capture MJPEG or YUYV.
pub fn auto_detect_device() -> Result<String, CaptureError> {
    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            continue;
        }
        if let Ok(formats) = dev.enum_formats() {
            if formats
                .iter()
                .any(|f| f.fourcc == FourCC::new(b"MJPG") || f.fourcc == FourCC::new(b"YUYV"))
            {
                info!("Found capture device: {} - {}", path, caps.card);
                return Ok(path);
            }
        }
    }

    Err(CaptureError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no suitable capture device found",
    )))
}
