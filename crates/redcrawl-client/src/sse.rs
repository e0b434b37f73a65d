//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; complete events are emitted once their
//! terminating blank line has been seen.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, `message` unless the server set one.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Events delivered to a plain `message` listener.
    pub fn is_message(&self) -> bool {
        self.event == "message"
    }
}

/// Upper bound on a pending line and on an event's accumulated data.
pub const MAX_EVENT_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    max_len: usize,
    /// Previous byte was a CR, so an immediately following LF is part of it.
    after_cr: bool,
    /// Rest of the current line is being skipped after an overflow.
    skipping_line: bool,
    /// Current event lost data to an overflow and will not be dispatched.
    discard_event: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_len(MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
            max_len,
            after_cr: false,
            skipping_line: false,
            discard_event: false,
        }
    }

    /// Feed a chunk and collect every event it completes.
    ///
    /// Lines end with CRLF, a bare LF or a bare CR.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    if std::mem::take(&mut self.skipping_line) {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.buffer.clear();
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                _ if self.skipping_line => {}
                _ if self.buffer.len() >= self.max_len => {
                    tracing::warn!(limit = self.max_len, "Event stream line too long, dropping event");
                    self.buffer.clear();
                    self.skipping_line = true;
                    self.discard_event = true;
                }
                _ => self.buffer.push(byte),
            }
        }
        events
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
            "data" if self.data.len() + value.len() >= self.max_len => {
                tracing::warn!(limit = self.max_len, "Event stream data too long, dropping event");
                self.data.clear();
                self.discard_event = true;
            }
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // retry and unknown fields are ignored
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if std::mem::take(&mut self.discard_event) {
            self.has_data = false;
            self.data.clear();
            return None;
        }
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}
