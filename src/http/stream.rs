//! `GET /stream`: MJPEG over `multipart/x-mixed-replace`.
//!
//! One blocking loop per client. Each part is header, JPEG, boundary; the
//! loop runs as fast as the camera and the socket allow and ends on the
//! first failed write or the first capture/encode failure.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Response;
use tracing::{debug, info, instrument};

use crate::capture::{acquire_jpeg, Camera};
use crate::error::{FrameError, TransportError};
use crate::http::response::{run_blocking, ResponseHead, ResponseWriter};
use crate::robot::Robot;

pub const PART_BOUNDARY: &str = "123456789000000000000987654321";
pub const STREAM_CONTENT_TYPE: &str =
    "multipart/x-mixed-replace; boundary=123456789000000000000987654321";
pub const STREAM_BOUNDARY: &str = "\r\n--123456789000000000000987654321\r\n";

/// JPEG quality for transcoded stream frames.
pub const STREAM_QUALITY: u8 = 80;

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The multipart head could not be sent.
    HeadRefused,
    /// A chunk write failed; the client is gone.
    Closed,
    CaptureFailed,
    EncodeFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Parts sent completely.
    pub frames: u64,
    pub end: StreamEnd,
}

pub async fn stream(State(robot): State<Arc<Robot>>) -> Response {
    let camera = robot.camera_handle();
    run_blocking(move |out| {
        handle_stream(&*camera, out);
    })
    .await
}

pub fn part_header(len: usize) -> String {
    format!("Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n", len)
}

/// Stream frames until the client goes away or the camera fails.
#[instrument(skip_all)]
pub fn handle_stream<C, W>(camera: &C, out: &mut W) -> StreamSummary
where
    C: Camera + ?Sized,
    W: ResponseWriter + ?Sized,
{
    if out
        .send_head(ResponseHead::ok().content_type(STREAM_CONTENT_TYPE))
        .is_err()
    {
        return StreamSummary {
            frames: 0,
            end: StreamEnd::HeadRefused,
        };
    }
    info!("MJPEG stream started");

    let mut frames = 0;
    let mut last_frame = Instant::now();

    let end = loop {
        let jpeg = match acquire_jpeg(camera, STREAM_QUALITY) {
            Ok(jpeg) => jpeg,
            Err(FrameError::Capture(_)) => break StreamEnd::CaptureFailed,
            Err(FrameError::Encode(_)) => break StreamEnd::EncodeFailed,
        };

        let len = jpeg.len();
        let sent = send_part(out, jpeg.as_bytes());
        // frees the frame or the transcoded buffer, whichever this one is
        drop(jpeg);
        if sent.is_err() {
            break StreamEnd::Closed;
        }

        frames += 1;
        metrics::counter!("rovercam_stream_frames_total").increment(1);
        metrics::counter!("rovercam_stream_bytes_total").increment(len as u64);

        let frame_time = last_frame.elapsed();
        last_frame = Instant::now();
        let ms = frame_time.as_secs_f64() * 1000.0;
        debug!(
            "MJPG: {}B {:.0}ms ({:.1}fps)",
            len,
            ms,
            if ms > 0.0 { 1000.0 / ms } else { 0.0 }
        );
    };

    info!(frames, ?end, "MJPEG stream closed");
    StreamSummary { frames, end }
}

fn send_part<W: ResponseWriter + ?Sized>(out: &mut W, jpeg: &[u8]) -> Result<(), TransportError> {
    out.write_chunk(part_header(jpeg.len()).as_bytes())?;
    out.write_chunk(jpeg)?;
    out.write_chunk(STREAM_BOUNDARY.as_bytes())
}
