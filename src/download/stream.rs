//! Audio body decoding seam
//!
//! Services that encrypt their audio plug a decoder in here; the bytes that
//! come out are the plain container stream (ID3+MP3 frames or FLAC).

use std::io;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Forward-only audio byte stream
pub type AudioReader = Pin<Box<dyn AsyncRead + Send>>;

/// Turns a raw response body into the plain audio stream for a track
pub trait StreamDecoder: Send + Sync {
    fn wrap(&self, body: AudioReader, track_id: &str) -> io::Result<AudioReader>;
}

/// Decoder for services that send unencrypted audio
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStream;

impl StreamDecoder for PlainStream {
    fn wrap(&self, body: AudioReader, _track_id: &str) -> io::Result<AudioReader> {
        Ok(body)
    }
}
