//! Synthetic sensor drawing moving colour bars.
//!
//! Behaves like a small embedded camera driver: a fixed pool of frame
//! buffers, a framesize index and a 0-63 JPEG quality register.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, error, info};

use crate::capture::{encoder, Camera, Frame, FrameMetadata, FrameSize, PixelFormat, SensorStatus};
use crate::error::{CaptureError, DeviceError};
use crate::CameraConfig;

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

pub struct TestPatternCamera {
    format: PixelFormat,
    buffer_count: u32,
    state: Mutex<PatternState>,
    started: Instant,
}

struct PatternState {
    framesize: FrameSize,
    quality: u8,
    in_flight: u32,
    sequence: u64,
}

impl TestPatternCamera {
    pub fn new(config: &CameraConfig) -> Result<Self, CaptureError> {
        match config.format {
            PixelFormat::Mjpeg
            | PixelFormat::Rgb24
            | PixelFormat::Bgr24
            | PixelFormat::Rgb565
            | PixelFormat::Gray8 => {}
            other => return Err(CaptureError::UnsupportedFormat(other)),
        }
        let framesize = FrameSize::from_index(config.framesize.into())
            .ok_or(CaptureError::BadFrameSize(config.framesize))?;

        info!(
            "Test pattern camera: {:?} {:?}, {} buffers",
            config.format, framesize, config.buffer_count
        );

        Ok(Self {
            format: config.format,
            buffer_count: config.buffer_count.max(1),
            state: Mutex::new(PatternState {
                framesize,
                quality: config.quality.min(63),
                in_flight: 0,
                sequence: 0,
            }),
            started: Instant::now(),
        })
    }

    fn state(&self) -> MutexGuard<'_, PatternState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, framesize: FrameSize, quality: u8, sequence: u64) -> Result<Frame, CaptureError> {
        let (width, height) = framesize.dimensions();
        let rgb = draw_bars(width, height, sequence);

        let data = match self.format {
            PixelFormat::Rgb24 => rgb,
            PixelFormat::Bgr24 => rgb.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect(),
            PixelFormat::Gray8 => rgb
                .chunks_exact(3)
                .map(|p| ((77 * p[0] as u32 + 150 * p[1] as u32 + 29 * p[2] as u32) >> 8) as u8)
                .collect(),
            PixelFormat::Rgb565 => rgb
                .chunks_exact(3)
                .flat_map(|p| {
                    let v = ((p[0] as u16 >> 3) << 11) | ((p[1] as u16 >> 2) << 5) | (p[2] as u16 >> 3);
                    v.to_be_bytes()
                })
                .collect(),
            _ => {
                let raw = Frame::new(Bytes::from(rgb), meta(PixelFormat::Rgb24, width, height, sequence));
                sensor_jpeg(&raw, quality)?
            }
        };

        let mut meta = meta(self.format, width, height, sequence);
        meta.device_timestamp = Some(self.started.elapsed());
        Ok(Frame::new(Bytes::from(data), meta))
    }
}

/// Compress like the sensor does. Its quality register runs 0 (best) to 63 (worst).
fn sensor_jpeg(raw: &Frame, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let jpeg_quality = 100 - (u32::from(quality.min(63)) * 90 / 63) as u8;
    encoder::to_jpeg(raw, jpeg_quality).map_err(CaptureError::SensorEncode)
}

fn meta(format: PixelFormat, width: u32, height: u32, sequence: u64) -> FrameMetadata {
    FrameMetadata {
        sequence,
        width,
        height,
        stride: width,
        format,
        device_timestamp: None,
    }
}

/// Vertical colour bars scrolling one column per frame.
fn draw_bars(width: u32, height: u32, sequence: u64) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let bar = (w / BARS.len()).max(1);
    let shift = (sequence as usize) % w.max(1);

    let mut row = Vec::with_capacity(w * 3);
    for x in 0..w {
        row.extend_from_slice(&BARS[((x + shift) / bar) % BARS.len()]);
    }
    row.repeat(h)
}

impl Camera for TestPatternCamera {
    fn acquire(&self) -> Result<Frame, CaptureError> {
        let (framesize, quality, sequence) = {
            let mut state = self.state();
            if state.in_flight >= self.buffer_count {
                return Err(CaptureError::Unavailable);
            }
            state.in_flight += 1;
            state.sequence += 1;
            (state.framesize, state.quality, state.sequence)
        };
        match self.render(framesize, quality, sequence) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                // the buffer was never handed out
                let mut state = self.state();
                state.in_flight = state.in_flight.saturating_sub(1);
                error!(sequence, "test pattern render failed: {}", e);
                Err(e)
            }
        }
    }

    fn release(&self, frame: Frame) {
        let mut state = self.state();
        state.in_flight = state.in_flight.saturating_sub(1);
        debug!(sequence = frame.meta.sequence, "frame buffer returned");
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn status(&self) -> SensorStatus {
        let state = self.state();
        SensorStatus {
            framesize: state.framesize.index(),
            quality: state.quality,
        }
    }

    fn set_framesize(&self, framesize: i32) -> Result<(), DeviceError> {
        let size = FrameSize::from_index(framesize)
            .ok_or_else(|| DeviceError::rejected("framesize", framesize))?;
        self.state().framesize = size;
        Ok(())
    }

    fn set_quality(&self, quality: i32) -> Result<(), DeviceError> {
        match u8::try_from(quality) {
            Ok(q) if q <= 63 => {
                self.state().quality = q;
                Ok(())
            }
            _ => Err(DeviceError::rejected("quality", quality)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(format: PixelFormat, buffer_count: u32) -> TestPatternCamera {
        TestPatternCamera::new(&CameraConfig {
            format,
            framesize: FrameSize::Qqvga.index(),
            buffer_count,
            ..CameraConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn pool_exhaustion_and_return() {
        let cam = camera(PixelFormat::Rgb24, 2);
        let a = cam.acquire().unwrap();
        let b = cam.acquire().unwrap();
        assert!(matches!(cam.acquire(), Err(CaptureError::Unavailable)));
        cam.release(a);
        let c = cam.acquire().unwrap();
        cam.release(b);
        cam.release(c);
    }

    #[test]
    fn raw_frames_match_geometry() {
        for format in [PixelFormat::Rgb24, PixelFormat::Bgr24, PixelFormat::Rgb565, PixelFormat::Gray8] {
            let cam = camera(format, 1);
            let frame = cam.acquire().unwrap();
            assert_eq!(Some(frame.len()), format.raw_len(160, 120));
            assert!(encoder::check_geometry(&frame).is_ok());
            cam.release(frame);
        }
    }

    #[test]
    fn jpeg_frames_follow_framesize() {
        let cam = camera(PixelFormat::Mjpeg, 1);
        cam.set_framesize(FrameSize::Qvga.index().into()).unwrap();
        let frame = cam.acquire().unwrap();
        assert!(frame.is_jpeg());
        let mut decoder = jpeg_decoder::Decoder::new(&frame.data[..]);
        decoder.decode().unwrap();
        let info = decoder.info().unwrap();
        assert_eq!((info.width, info.height), (320, 240));
        cam.release(frame);
    }

    #[test]
    fn setters_validate() {
        let cam = camera(PixelFormat::Mjpeg, 1);
        assert!(cam.set_framesize(14).is_err());
        assert!(cam.set_quality(64).is_err());
        assert!(cam.set_quality(-1).is_err());
        cam.set_quality(10).unwrap();
        cam.set_framesize(8).unwrap();
        assert_eq!(cam.status(), SensorStatus { framesize: 8, quality: 10 });
    }

    #[test]
    fn unsupported_format() {
        let err = TestPatternCamera::new(&CameraConfig {
            format: PixelFormat::Nv12,
            ..CameraConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, CaptureError::UnsupportedFormat(PixelFormat::Nv12)));
    }

    #[test]
    fn sensor_encode_failure_is_a_capture_error() {
        let mut raw = crate::capture::testing::raw_frame(PixelFormat::Rgb24, 16, 16);
        raw.data = raw.data.slice(..10);
        let err = sensor_jpeg(&raw, 12).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::SensorEncode(crate::error::EncodeError::Geometry { .. })
        ));
    }

    #[test]
    fn sensor_quality_maps_to_encoder_quality() {
        let raw = crate::capture::testing::raw_frame(PixelFormat::Rgb24, 64, 48);
        let best = sensor_jpeg(&raw, 0).unwrap();
        let worst = sensor_jpeg(&raw, 63).unwrap();
        assert!(!best.is_empty() && !worst.is_empty());
        assert!(worst.len() < best.len());
    }
}
