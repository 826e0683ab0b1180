//! `GET /capture`: one JPEG per request.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tracing::{debug, error, info, instrument};

use crate::capture::{encoder, Camera, FrameGuard};
use crate::error::ResponseError;
use crate::http::response::{run_blocking, send_status, send_whole, ResponseHead, ResponseWriter};
use crate::robot::Robot;

/// JPEG quality used when the sensor frame has to be transcoded.
pub const CAPTURE_QUALITY: u8 = 80;

pub async fn capture(State(robot): State<Arc<Robot>>) -> Response {
    let camera = robot.camera_handle();
    run_blocking(move |out| match handle_capture(&*camera, out) {
        Ok(_) => {}
        Err(e) if e.is_transport() => debug!("capture response abandoned: {}", e),
        // capture and encode failures are logged where they happen
        Err(_) => {}
    })
    .await
}

/// Serve one frame as `image/jpeg`.
///
/// A JPEG frame goes out whole with a `Content-Length`. A raw frame is
/// transcoded straight into the response in chunks. Capture failures, and
/// encode failures found before the head is sent, answer 500 with no body.
/// Returns the body length.
#[instrument(skip_all)]
pub fn handle_capture<C, W>(camera: &C, out: &mut W) -> Result<usize, ResponseError>
where
    C: Camera + ?Sized,
    W: ResponseWriter + ?Sized,
{
    let start = Instant::now();

    let frame = match FrameGuard::acquire(camera) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Camera capture failed: {}", e);
            send_status(out, StatusCode::INTERNAL_SERVER_ERROR)?;
            return Err(e.into());
        }
    };

    let head = ResponseHead::ok().content_type("image/jpeg").header(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline; filename=capture.jpg"),
    );

    let len = if frame.is_jpeg() {
        send_whole(out, head, &frame.data)?;
        frame.len()
    } else {
        if let Err(e) = encoder::check_geometry(&frame) {
            error!("JPEG compression failed: {}", e);
            frame.release();
            send_status(out, StatusCode::INTERNAL_SERVER_ERROR)?;
            return Err(e.into());
        }
        out.send_head(head)?;
        let encoded = encoder::encode_jpeg(&frame, CAPTURE_QUALITY, out);
        frame.release();
        match encoded {
            Ok(len) => len,
            Err(e) => {
                error!("JPEG compression failed: {}", e);
                return Err(e.into());
            }
        }
    };

    metrics::counter!("rovercam_captures_total").increment(1);
    info!("JPG: {}B {}ms", len, start.elapsed().as_millis());
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::MockCamera;
    use crate::capture::PixelFormat;
    use crate::error::{CaptureError, EncodeError, TransportError};
    use crate::http::response::testing::RecordingWriter;

    #[test]
    fn jpeg_frame_sent_whole() {
        let camera = MockCamera::jpeg(5000);
        let mut out = RecordingWriter::default();
        let len = handle_capture(&camera, &mut out).unwrap();

        assert_eq!(len, 5000);
        let head = out.head.as_ref().unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.headers[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(head.headers[header::CONTENT_LENGTH], "5000");
        assert_eq!(
            head.headers[header::CONTENT_DISPOSITION],
            "inline; filename=capture.jpg"
        );
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(out.body().len(), 5000);
        assert_eq!((camera.acquired(), camera.released()), (1, 1));
    }

    #[test]
    fn raw_frame_streamed_in_chunks() {
        let camera = MockCamera::raw(PixelFormat::Rgb24, 320, 240);
        let mut out = RecordingWriter::default();
        let len = handle_capture(&camera, &mut out).unwrap();

        let head = out.head.as_ref().unwrap();
        assert!(head.headers.get(header::CONTENT_LENGTH).is_none());
        assert!(out.chunks.len() > 1);
        let body = out.body();
        assert_eq!(body.len(), len);
        let mut decoder = jpeg_decoder::Decoder::new(&body[..]);
        decoder.decode().unwrap();
        assert_eq!(decoder.info().unwrap().width, 320);
        assert_eq!(camera.released(), 1);
    }

    #[test]
    fn capture_failure_is_500() {
        let camera = MockCamera::jpeg(10);
        camera.fail_acquire(true);
        let mut out = RecordingWriter::default();
        let err = handle_capture(&camera, &mut out).unwrap_err();

        assert!(matches!(err, ResponseError::Capture(CaptureError::Unavailable)));
        assert_eq!(out.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(out.body().is_empty());
        assert_eq!(camera.released(), 0);
    }

    #[test]
    fn bad_raw_frame_is_500() {
        let camera = MockCamera::raw(PixelFormat::Yuyv4, 64, 48);
        camera.corrupt_frames(true);
        let mut out = RecordingWriter::default();
        let err = handle_capture(&camera, &mut out).unwrap_err();

        assert!(matches!(err, ResponseError::Encode(EncodeError::Geometry { .. })));
        assert_eq!(out.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!((camera.acquired(), camera.released()), (1, 1));
    }

    #[test]
    fn client_gone_mid_transcode() {
        let camera = MockCamera::raw(PixelFormat::Rgb24, 320, 240);
        let mut out = RecordingWriter::failing_after(1);
        let err = handle_capture(&camera, &mut out).unwrap_err();

        assert!(matches!(
            err,
            ResponseError::Encode(EncodeError::Sink(TransportError::Closed))
        ));
        assert!(err.is_transport());
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(camera.released(), 1);
    }
}
