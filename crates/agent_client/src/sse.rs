//! Incremental decoding of `text/event-stream` frames.
//!
//! Transport chunks arrive at arbitrary boundaries, so the decoder buffers
//! bytes until a full line is available and only then interprets it. A
//! complete line is always valid UTF-8 on this protocol; partial multi-byte
//! sequences can only sit at the buffer tail, never inside a finished line.

use tracing::trace;

/// Stateful decoder turning raw transport chunks into event data payloads.
///
/// Comment lines (leading `:`) and blank keepalive lines are swallowed
/// here and never reach the classifier.
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Feed one transport chunk, returning the data payloads of all frames
    /// completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(payload) = decode_line(&line[..line.len() - 1]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing unterminated line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let line: Vec<u8> = self.pending.drain(..).collect();
        decode_line(&line)
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.strip_suffix('\r').unwrap_or(&line);

    if line.is_empty() || line.starts_with(':') {
        trace!("Swallowing keepalive frame");
        return None;
    }

    line.strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
        .map(str::to_string)
}
