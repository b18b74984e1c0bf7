//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes are fed as they arrive from the network; chunk boundaries may fall
//! anywhere, including between `\r` and `\n` or inside a UTF-8 sequence.
//! A line or event larger than the decoder's limit is dropped whole.

use tracing::warn;

pub const DEFAULT_EVENT: &str = "message";
pub const DEFAULT_MAX_EVENT_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream when this event was dispatched.
    pub id: Option<String>,
    /// Reconnection delay hint in milliseconds, if the stream sent one.
    pub retry: Option<u64>,
}

#[derive(Debug)]
pub struct SseDecoder {
    line: Vec<u8>,
    after_cr: bool,
    first_line_seen: bool,
    event: Option<String>,
    data: String,
    last_id: Option<String>,
    retry: Option<u64>,
    max_event_len: usize,
    /// Bytes of the current line are being skipped.
    line_overflow: bool,
    /// Fields are ignored until the next blank line.
    oversized: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_event_len(DEFAULT_MAX_EVENT_LEN)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps both a single line and the accumulated `data` of one event.
    pub fn with_max_event_len(max_event_len: usize) -> Self {
        Self {
            line: Vec::new(),
            after_cr: false,
            first_line_seen: false,
            event: None,
            data: String::new(),
            last_id: None,
            retry: None,
            max_event_len,
            line_overflow: false,
            oversized: false,
        }
    }

    /// Consumes a chunk and returns every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut events);
                }
                _ if self.line_overflow => {}
                _ if self.line.len() >= self.max_event_len => {
                    self.line_overflow = true;
                    self.line.clear();
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        if std::mem::take(&mut self.line_overflow) {
            self.first_line_seen = true;
            self.discard_event();
            return;
        }
        let raw = std::mem::take(&mut self.line);
        let decoded = String::from_utf8_lossy(&raw);
        let mut line: &str = &decoded;
        if !self.first_line_seen {
            self.first_line_seen = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') || self.oversized {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.data.len() + value.len() + 1 > self.max_event_len {
                    self.discard_event();
                    return;
                }
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    fn discard_event(&mut self) {
        if !self.oversized {
            warn!(limit = self.max_event_len, "discarding oversized push event");
        }
        self.oversized = true;
        self.event = None;
        self.data.clear();
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event = self.event.take();
        if std::mem::take(&mut self.oversized) {
            return;
        }
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        events.push(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
            retry: self.retry,
        });
    }
}

#[cfg(test)]
#[path = "tests/sse_tests.rs"]
mod tests;
