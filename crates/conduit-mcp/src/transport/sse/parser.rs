//! SSE Wire Parser
//!
//! Incremental parser for `text/event-stream` bytes: feed chunks in
//! whatever sizes the network delivers, get complete events out. Events
//! are groups of `field: value` lines terminated by a blank line;
//! `event:` names the event, multiple `data:` lines join with newlines,
//! comment lines (leading `:`) are dropped. Partial lines and partial
//! UTF-8 sequences stay buffered across feeds.
//!
//! The parser is transport-free so it can be tested without sockets.

/// One parsed SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseWireEvent {
    /// Event name from `event:`, `None` means the default `message` type
    pub event: Option<String>,
    /// Joined `data:` payload
    pub data: String,
    /// Optional event id from `id:`
    pub id: Option<String>,
}

impl SseWireEvent {
    /// Effective event type, defaulting to `message` per the SSE standard
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Incremental SSE parser with a rolling byte buffer
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    /// Create an empty parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every event completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseWireEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..newline]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(event) = self.take_event() {
                    events.push(event);
                }
            } else {
                self.parse_field(line);
            }
        }
        events
    }

    fn take_event(&mut self) -> Option<SseWireEvent> {
        if self.event.is_none() && self.data_lines.is_empty() && self.id.is_none() {
            return None;
        }
        let event = SseWireEvent {
            event: self.event.take(),
            data: self.data_lines.join("\n"),
            id: self.id.take(),
        };
        self.data_lines.clear();
        Some(event)
    }

    fn parse_field(&mut self, line: &str) {
        // A leading colon marks a comment (keep-alive pings use these).
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // retry and unknown fields are ignored
            _ => {}
        }
    }
}
