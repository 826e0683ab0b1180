//! Test doubles for the camera driver and response sinks.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use bytes::Bytes;

use crate::capture::{Camera, Frame, FrameMetadata, FrameSize, PixelFormat, SensorStatus};
use crate::error::{CaptureError, DeviceError, TransportError};
use crate::sink::ChunkSink;

/// Noisy raw frame, so encoded output is large enough to span several chunks.
pub fn raw_frame(format: PixelFormat, width: u32, height: u32) -> Frame {
    let len = format.raw_len(width, height).unwrap_or(1024);
    let mut state = 0x2545_f491_u32;
    let data: Vec<u8> = (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();
    Frame::new(
        Bytes::from(data),
        FrameMetadata {
            sequence: 0,
            width,
            height,
            stride: width,
            format,
            device_timestamp: None,
        },
    )
}

/// Camera that counts every acquire and release.
pub struct MockCamera {
    format: PixelFormat,
    width: u32,
    height: u32,
    jpeg_len: usize,
    acquired: AtomicUsize,
    released: AtomicUsize,
    fail_acquire: AtomicBool,
    corrupt: AtomicBool,
    framesize: AtomicU8,
    quality: AtomicU8,
}

impl MockCamera {
    /// Sensor already producing JPEG frames of `len` bytes.
    pub fn jpeg(len: usize) -> Self {
        Self::new(PixelFormat::Mjpeg, 320, 240, len)
    }

    pub fn raw(format: PixelFormat, width: u32, height: u32) -> Self {
        Self::new(format, width, height, 0)
    }

    fn new(format: PixelFormat, width: u32, height: u32, jpeg_len: usize) -> Self {
        Self {
            format,
            width,
            height,
            jpeg_len,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            fail_acquire: AtomicBool::new(false),
            corrupt: AtomicBool::new(false),
            framesize: AtomicU8::new(FrameSize::Qvga.index()),
            quality: AtomicU8::new(12),
        }
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Hand out raw frames whose length does not match their geometry.
    pub fn corrupt_frames(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> usize {
        self.acquired() - self.released()
    }
}

impl Camera for MockCamera {
    fn acquire(&self) -> Result<Frame, CaptureError> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable);
        }
        let seq = self.acquired.fetch_add(1, Ordering::SeqCst) as u64;
        let mut frame = if self.format.is_jpeg() {
            let mut data = vec![0u8; self.jpeg_len];
            if self.jpeg_len >= 2 {
                data[..2].copy_from_slice(&[0xFF, 0xD8]);
            }
            Frame::new(
                Bytes::from(data),
                FrameMetadata {
                    sequence: seq,
                    width: self.width,
                    height: self.height,
                    stride: self.width,
                    format: PixelFormat::Mjpeg,
                    device_timestamp: None,
                },
            )
        } else {
            raw_frame(self.format, self.width, self.height)
        };
        if self.corrupt.load(Ordering::SeqCst) {
            frame.data = frame.data.slice(..frame.data.len() / 2);
        }
        Ok(frame)
    }

    fn release(&self, _frame: Frame) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn status(&self) -> SensorStatus {
        SensorStatus {
            framesize: self.framesize.load(Ordering::SeqCst),
            quality: self.quality.load(Ordering::SeqCst),
        }
    }

    fn set_framesize(&self, framesize: i32) -> Result<(), DeviceError> {
        let size = FrameSize::from_index(framesize)
            .ok_or_else(|| DeviceError::rejected("framesize", framesize))?;
        self.framesize.store(size.index(), Ordering::SeqCst);
        Ok(())
    }

    fn set_quality(&self, quality: i32) -> Result<(), DeviceError> {
        match u8::try_from(quality) {
            Ok(q) if q <= 63 => {
                self.quality.store(q, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(DeviceError::rejected("quality", quality)),
        }
    }
}

/// Sink keeping every chunk it was given.
#[derive(Default)]
pub struct RecordingSink {
    pub chunks: Vec<Vec<u8>>,
}

impl RecordingSink {
    pub fn sizes(&self) -> Vec<usize> {
        self.chunks.iter().map(Vec::len).collect()
    }
}

impl ChunkSink for RecordingSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.chunks.push(chunk.to_vec());
        Ok(())
    }
}

/// Sink accepting `limit` chunks and refusing everything after.
pub struct FailingSink {
    limit: usize,
    pub accepted: usize,
    pub attempts: usize,
}

impl FailingSink {
    pub fn after(limit: usize) -> Self {
        Self {
            limit,
            accepted: 0,
            attempts: 0,
        }
    }
}

impl ChunkSink for FailingSink {
    fn write_chunk(&mut self, _chunk: &[u8]) -> Result<(), TransportError> {
        self.attempts += 1;
        if self.accepted == self.limit {
            return Err(TransportError::Closed);
        }
        self.accepted += 1;
        Ok(())
    }
}
