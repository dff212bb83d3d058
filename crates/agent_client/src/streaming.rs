//! Chunk sources for the event stream.
//!
//! Live HTTP responses and recorded playback implement the same interface,
//! so the decode path downstream of them is identical in both modes.

use crate::recording::RecordedChunk;
use crate::types::ApiError;
use async_trait::async_trait;
use reqwest::Response;
use std::time::{Duration, Instant};

/// Source of raw transport chunks for one stream.
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError>;
}

/// Chunks read from a live HTTP response body.
pub struct HttpChunkStream {
    response: Response,
}

impl HttpChunkStream {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        match self.response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(ApiError::Network(e.to_string())),
        }
    }
}

/// Replays the chunks of a recorded session.
///
/// In fast mode only a token delay is kept between chunks; otherwise the
/// original timing is honored.
pub struct PlaybackChunkStream {
    chunks: Vec<RecordedChunk>,
    current_index: usize,
    start_time: Instant,
    fast: bool,
}

impl PlaybackChunkStream {
    pub fn new(chunks: Vec<RecordedChunk>, fast: bool) -> Self {
        Self {
            chunks,
            current_index: 0,
            start_time: Instant::now(),
            fast,
        }
    }
}

#[async_trait]
impl ChunkStream for PlaybackChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        if self.current_index >= self.chunks.len() {
            return Ok(None);
        }

        let chunk = &self.chunks[self.current_index];

        if self.fast {
            tokio::time::sleep(Duration::from_millis(5)).await;
        } else {
            let elapsed = self.start_time.elapsed();
            let expected = Duration::from_millis(chunk.timestamp_ms);
            if elapsed < expected {
                tokio::time::sleep(expected - elapsed).await;
            }
        }

        let frame = format!("data: {}\n", chunk.data);
        self.current_index += 1;

        Ok(Some(frame.into_bytes()))
    }
}
