//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines and
//! yields complete events when a blank line closes them. Field handling
//! follows the EventSource processing model:
//!
//! - `event:` sets the event name (default `message`),
//! - `data:` lines accumulate, joined by `\n`,
//! - `id:` updates the last event id (ignored when it contains NUL),
//! - `retry:` carries a reconnection hint in milliseconds,
//! - lines starting with `:` are comments,
//! - a single space after the colon is stripped,
//! - `\n`, `\r\n` and lone `\r` all terminate a line.
//!
//! Events with an empty data buffer are not dispatched.

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: String,
    has_data: bool,
    retry: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: PendingEvent,
    last_event_id: Option<String>,
    /// A chunk ended on `\r`; a leading `\n` in the next chunk belongs to it.
    skip_leading_lf: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feeds a chunk and returns every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut bytes = chunk;

        if self.skip_leading_lf {
            self.skip_leading_lf = false;
            if let Some((b'\n', rest)) = bytes.split_first() {
                bytes = rest;
            }
        }

        let mut start = 0;
        let mut index = 0;
        while index < bytes.len() {
            match bytes[index] {
                b'\n' => {
                    self.buffer.extend_from_slice(&bytes[start..index]);
                    self.take_line(&mut events);
                    index += 1;
                    start = index;
                }
                b'\r' => {
                    self.buffer.extend_from_slice(&bytes[start..index]);
                    self.take_line(&mut events);
                    index += 1;
                    if index == bytes.len() {
                        self.skip_leading_lf = true;
                    } else if bytes[index] == b'\n' {
                        index += 1;
                    }
                    start = index;
                }
                _ => index += 1,
            }
        }
        self.buffer.extend_from_slice(&bytes[start..]);

        events
    }

    /// Flushes at end of stream. A trailing event without its closing blank
    /// line is discarded, as an EventSource would.
    pub fn finish(&mut self) {
        self.buffer.clear();
        self.pending = PendingEvent::default();
        self.skip_leading_lf = false;
    }

    fn take_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw);
        if let Some(event) = self.process_line(&line) {
            events.push(event);
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
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
            "event" => self.pending.event = Some(value.to_string()),
            "data" => {
                if self.pending.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.pending.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.pending.retry = value.parse().ok();
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(&mut self.pending);
        if !pending.has_data {
            return None;
        }
        Some(SseEvent {
            event: pending
                .event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: pending.data,
            id: self.last_event_id.clone(),
            retry: pending.retry,
        })
    }
}
