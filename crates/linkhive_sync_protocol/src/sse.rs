//! Line-oriented SSE framing: encoder and incremental parser.
//!
//! The wire format is text, one event per blank-line-terminated block:
//!
//! ```text
//! id: 7
//! data: {"type":"bookmark.created", ...}
//!
//! ```
//!
//! Comment lines begin with `:` and carry no semantic payload; they are
//! used as keepalives.

/// A parsed frame from the push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A comment/keepalive line. Carries no payload.
    Comment(String),
    /// A complete event block, flushed at a blank line.
    Event {
        /// The `id:` field, when present and numeric.
        id: Option<u64>,
        /// Concatenated `data:` lines, joined with `\n`.
        data: String,
    },
}

/// Parser states. `Accumulating` means at least one field line of the
/// current block has been seen; the next blank line flushes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    Accumulating,
}

/// An incremental SSE parser.
///
/// Bytes are fed in arbitrary chunks; only complete lines are
/// interpreted, so a multi-byte character or a field split across a
/// chunk boundary is handled correctly. Parsing is invariant to how the
/// byte stream is chunked.
#[derive(Debug)]
pub struct SseParser {
    residual: Vec<u8>,
    state: ParserState,
    id: Option<u64>,
    data_lines: Vec<String>,
}

impl SseParser {
    /// Creates a parser in the idle state.
    pub fn new() -> Self {
        Self {
            residual: Vec::new(),
            state: ParserState::Idle,
            id: None,
            data_lines: Vec::new(),
        }
    }

    /// Feeds a chunk of bytes, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.residual.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.residual.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.residual.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            self.process_line(line, &mut frames);
        }
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            if self.state == ParserState::Accumulating {
                self.flush(frames);
            }
            self.state = ParserState::Idle;
            return;
        }

        if let Some(comment) = line.strip_prefix(':') {
            frames.push(SseFrame::Comment(comment.trim_start().to_string()));
            return;
        }

        if let Some(value) = field_value(line, "id") {
            // Non-numeric ids are dropped; the block itself survives.
            if let Ok(id) = value.parse::<u64>() {
                self.id = Some(id);
            }
            self.state = ParserState::Accumulating;
            return;
        }

        if let Some(value) = field_value(line, "data") {
            self.data_lines.push(value.to_string());
            self.state = ParserState::Accumulating;
            return;
        }

        // Unknown field: part of the block, contributes nothing.
        self.state = ParserState::Accumulating;
    }

    fn flush(&mut self, frames: &mut Vec<SseFrame>) {
        let id = self.id.take();
        let data = std::mem::take(&mut self.data_lines).join("\n");
        if id.is_some() || !data.is_empty() {
            frames.push(SseFrame::Event { id, data });
        }
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the value of `name: value` when the line carries that field.
/// At most one space after the colon is stripped, per the SSE format.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Encodes an event block with an id and a data payload.
///
/// Multi-line payloads become one `data:` line each and are rejoined by
/// the parser.
pub fn encode_event(id: u64, data: &str) -> String {
    let mut out = format!("id: {id}\n");
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Encodes a comment/keepalive line terminated by a blank line.
pub fn encode_comment(text: &str) -> String {
    format!(": {text}\n\n")
}
