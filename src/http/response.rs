//! Bridge between blocking handler bodies and axum responses.
//!
//! A handler body runs on the blocking pool and writes a [`ResponseHead`]
//! followed by body chunks into a [`ResponseWriter`]. The async side waits for
//! the head, then streams the chunks out as they arrive. The body channel is
//! shallow, so a slow client blocks the handler on its next write, and a
//! client that went away makes that write fail.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::error::TransportError;
use crate::sink::ChunkSink;

/// Chunks buffered between a handler and the socket.
pub const BODY_DEPTH: usize = 2;

/// Status line and headers, committed before any body bytes.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(self, value: &'static str) -> Self {
        self.header(header::CONTENT_TYPE, HeaderValue::from_static(value))
    }
}

/// What the HTTP runtime offers a blocking handler: one head, then chunks.
pub trait ResponseWriter: ChunkSink {
    fn send_head(&mut self, head: ResponseHead) -> Result<(), TransportError>;
}

/// Send `body` as a complete, fixed-length response.
pub fn send_whole<W: ResponseWriter + ?Sized>(
    out: &mut W,
    head: ResponseHead,
    body: &[u8],
) -> Result<(), TransportError> {
    out.send_head(head.header(header::CONTENT_LENGTH, HeaderValue::from(body.len())))?;
    out.write_chunk(body)
}

/// Send a bodyless response with `status`.
pub fn send_status<W: ResponseWriter + ?Sized>(
    out: &mut W,
    status: StatusCode,
) -> Result<(), TransportError> {
    send_whole(out, ResponseHead::new(status), &[])
}

/// [`ResponseWriter`] backed by channels to an async response.
pub struct ChannelWriter {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<Bytes>,
}

/// Receiving half of a [`ChannelWriter`].
pub struct PendingResponse {
    head: oneshot::Receiver<ResponseHead>,
    body: mpsc::Receiver<Bytes>,
}

pub fn channel(depth: usize) -> (ChannelWriter, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(depth.max(1));
    (
        ChannelWriter {
            head: Some(head_tx),
            body: body_tx,
        },
        PendingResponse {
            head: head_rx,
            body: body_rx,
        },
    )
}

impl ChunkSink for ChannelWriter {
    /// Blocks while the client is slow. Must not be called from async context.
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.head.is_some() {
            return Err(TransportError::HeadMissing);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.body
            .blocking_send(Bytes::copy_from_slice(chunk))
            .map_err(|_| TransportError::Closed)
    }
}

impl ResponseWriter for ChannelWriter {
    fn send_head(&mut self, head: ResponseHead) -> Result<(), TransportError> {
        let tx = self.head.take().ok_or(TransportError::HeadSent)?;
        tx.send(head).map_err(|_| TransportError::Closed)
    }
}

impl PendingResponse {
    /// Wait for the head. A handler that finished without sending one is a 500.
    pub async fn into_response(self) -> Response {
        let head = match self.head.await {
            Ok(head) => head,
            Err(_) => {
                warn!("handler ended without a response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let chunks = ReceiverStream::new(self.body).map(Ok::<_, Infallible>);
        let mut response = Response::new(Body::from_stream(chunks));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}

/// Run a blocking handler body on the blocking pool and answer with whatever it writes.
pub async fn run_blocking<F>(handler: F) -> Response
where
    F: FnOnce(&mut ChannelWriter) + Send + 'static,
{
    let (mut writer, pending) = channel(BODY_DEPTH);
    // Detached: the task ends once its writes start failing
    tokio::task::spawn_blocking(move || handler(&mut writer));
    pending.into_response().await
}


#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn head_then_chunks() {
        let response = run_blocking(|out| {
            out.send_head(ResponseHead::ok().content_type("text/plain")).unwrap();
            out.write_chunk(b"hello ").unwrap();
            out.write_chunk(b"world").unwrap();
        })
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn missing_head_is_500() {
        let response = run_blocking(|_out| {}).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn writes_fail_once_body_dropped() {
        let (mut writer, pending) = channel(1);
        let handle = tokio::task::spawn_blocking(move || -> Result<(), TransportError> {
            writer.send_head(ResponseHead::ok())?;
            loop {
                writer.write_chunk(b"x")?;
            }
        });
        let response = pending.into_response().await;
        drop(response);
        let result: Result<(), TransportError> = handle.await.unwrap();
        assert_eq!(result, Err(TransportError::Closed));
    }

    #[test]
    fn chunk_before_head_rejected() {
        let (mut writer, _pending) = channel(1);
        assert_eq!(writer.write_chunk(b"x"), Err(TransportError::HeadMissing));
        writer.send_head(ResponseHead::ok()).unwrap();
        assert_eq!(writer.send_head(ResponseHead::ok()), Err(TransportError::HeadSent));
    }
}
