//! Raw frame to JPEG transcoding.
//!
//! The encoder never builds the whole image in memory on its own: output is
//! cut into [`CHUNK_SIZE`] pieces and pushed into a [`ChunkSink`] as it is
//! produced. The first chunk the sink refuses aborts the encode.

use std::borrow::Cow;
use std::io::{self, Write};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::capture::{Frame, PixelFormat};
use crate::error::{EncodeError, TransportError};
use crate::sink::ChunkSink;

/// Size of the pieces handed to the sink.
pub const CHUNK_SIZE: usize = 4096;

/// Validate that `frame` can be transcoded, without touching any sink.
pub fn check_geometry(frame: &Frame) -> Result<(), EncodeError> {
    let format = frame.format();
    let (width, height) = (frame.meta.width, frame.meta.height);

    if format.is_jpeg() {
        return Ok(());
    }
    if width == 0 || height == 0 {
        return Err(EncodeError::EmptyFrame { width, height });
    }

    let odd = match format {
        PixelFormat::Yuyv4 => width % 2 != 0,
        PixelFormat::Nv12 => width % 2 != 0 || height % 2 != 0,
        _ => false,
    };
    if odd {
        return Err(EncodeError::Subsampling {
            format,
            width,
            height,
        });
    }

    let expected = format.raw_len(width, height).unwrap_or_default();
    if frame.len() != expected {
        return Err(EncodeError::Geometry {
            format,
            width,
            height,
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Transcode `frame` at `quality` (1-100), streaming the output into `sink`.
///
/// A frame that is already JPEG is passed through unchanged. Returns the
/// number of bytes the sink accepted.
pub fn encode_jpeg<S: ChunkSink + ?Sized>(
    frame: &Frame,
    quality: u8,
    sink: &mut S,
) -> Result<usize, EncodeError> {
    check_geometry(frame)?;

    let mut out = ChunkWriter::new(sink);

    if frame.is_jpeg() {
        for chunk in frame.data.chunks(CHUNK_SIZE) {
            out.sink.write_chunk(chunk)?;
            out.written += chunk.len();
        }
        return Ok(out.written);
    }

    let (pixels, color) = to_encodable(frame);
    let encoded = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
        &pixels,
        frame.meta.width,
        frame.meta.height,
        color,
    );

    // A sink failure surfaces from the encoder as an io error; report the cause.
    if let Some(err) = out.failed {
        return Err(err.into());
    }
    encoded?;
    out.finish()?;
    Ok(out.written)
}

/// Buffered variant of [`encode_jpeg`]: the whole JPEG in a fresh allocation.
pub fn to_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(frame.len() / 4);
    encode_jpeg(frame, quality, &mut buf)?;
    Ok(buf)
}

/// Pixels in a layout the JPEG encoder accepts.
fn to_encodable(frame: &Frame) -> (Cow<'_, [u8]>, ExtendedColorType) {
    let data = &frame.data[..];
    let (width, height) = (frame.meta.width as usize, frame.meta.height as usize);

    match frame.format() {
        PixelFormat::Rgb24 => (Cow::Borrowed(data), ExtendedColorType::Rgb8),
        PixelFormat::Gray8 => (Cow::Borrowed(data), ExtendedColorType::L8),
        PixelFormat::Bgr24 => {
            let rgb = data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect();
            (Cow::Owned(rgb), ExtendedColorType::Rgb8)
        }
        PixelFormat::Rgb565 => {
            let rgb = data
                .chunks_exact(2)
                .flat_map(|px| rgb565_to_rgb(px[0], px[1]))
                .collect();
            (Cow::Owned(rgb), ExtendedColorType::Rgb8)
        }
        PixelFormat::Yuyv4 => {
            let rgb = data
                .chunks_exact(4)
                .flat_map(|q| {
                    let [r0, g0, b0] = yuv_to_rgb(q[0], q[1], q[3]);
                    let [r1, g1, b1] = yuv_to_rgb(q[2], q[1], q[3]);
                    [r0, g0, b0, r1, g1, b1]
                })
                .collect();
            (Cow::Owned(rgb), ExtendedColorType::Rgb8)
        }
        PixelFormat::Nv12 => {
            let (luma, chroma) = data.split_at(width * height);
            let mut rgb = Vec::with_capacity(width * height * 3);
            for row in 0..height {
                let uv_row = &chroma[(row / 2) * width..];
                for col in 0..width {
                    let uv = (col / 2) * 2;
                    rgb.extend_from_slice(&yuv_to_rgb(
                        luma[row * width + col],
                        uv_row[uv],
                        uv_row[uv + 1],
                    ));
                }
            }
            (Cow::Owned(rgb), ExtendedColorType::Rgb8)
        }
        // check_geometry sends JPEG down the pass-through path
        PixelFormat::Mjpeg => (Cow::Borrowed(data), ExtendedColorType::Rgb8),
    }
}

/// Big-endian RGB565, as the sensor DMA writes it.
#[inline]
fn rgb565_to_rgb(hi: u8, lo: u8) -> [u8; 3] {
    let v = u16::from_be_bytes([hi, lo]);
    let r = ((v >> 11) & 0x1f) as u8;
    let g = ((v >> 5) & 0x3f) as u8;
    let b = (v & 0x1f) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

/// BT.601 limited range.
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e + 128),
        clamp(298 * c - 100 * d - 208 * e + 128),
        clamp(298 * c + 516 * d + 128),
    ]
}

/// `io::Write` adapter cutting encoder output into sink-sized chunks.
struct ChunkWriter<'s, S: ChunkSink + ?Sized> {
    sink: &'s mut S,
    buf: Vec<u8>,
    written: usize,
    failed: Option<TransportError>,
}

impl<'s, S: ChunkSink + ?Sized> ChunkWriter<'s, S> {
    fn new(sink: &'s mut S) -> Self {
        Self {
            sink,
            buf: Vec::with_capacity(CHUNK_SIZE),
            written: 0,
            failed: None,
        }
    }

    fn emit(&mut self) -> Result<(), TransportError> {
        if let Some(err) = self.failed {
            return Err(err);
        }
        if self.buf.is_empty() {
            return Ok(());
        }
        match self.sink.write_chunk(&self.buf) {
            Ok(()) => {
                self.written += self.buf.len();
                self.buf.clear();
                Ok(())
            }
            Err(err) => {
                self.failed = Some(err);
                Err(err)
            }
        }
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        self.emit()
    }
}

impl<S: ChunkSink + ?Sized> Write for ChunkWriter<'_, S> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.failed.is_some() {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let room = CHUNK_SIZE - self.buf.len();
        let n = data.len().min(room);
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() == CHUNK_SIZE {
            self.emit()
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Chunks are only cut at CHUNK_SIZE or at finish()
        if self.failed.is_some() {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        Ok(())
    }
}
