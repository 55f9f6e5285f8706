//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers until a full
//! line is available, so multi-byte UTF-8 characters split across
//! chunks are reassembled before decoding.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, `"message"` when absent.
    pub event: String,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

/// Longest line accepted before the stream is considered broken.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// The peer sent more than the allowed bytes without a line break.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event-stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            event: None,
            data: Vec::new(),
        }
    }

    /// Feed a chunk and return every frame completed by it.
    ///
    /// Fails once the unterminated tail grows past the line limit; the
    /// decoder must not be fed again after that.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, LineTooLong> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            return Err(LineTooLong {
                limit: self.max_line,
            });
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        // Blank line dispatches the pending event.
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry / unknown fields carry nothing we use.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
