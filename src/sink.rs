//! Byte sinks fed by the JPEG encoder and the HTTP handlers.

use crate::error::TransportError;

/// Consumer of response body chunks.
///
/// A failed write is final: producers stop at the first error and never
/// write again.
pub trait ChunkSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError>;
}

impl ChunkSink for Vec<u8> {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.extend_from_slice(chunk);
        Ok(())
    }
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        (**self).write_chunk(chunk)
    }
}
