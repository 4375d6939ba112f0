//! Incremental server-sent-events decoding.
//!
//! Network chunks do not line up with SSE lines, so bytes are buffered until
//! a full line is available. Consecutive `data:` lines are joined with `\n`
//! and dispatched as one payload at the blank line that ends the event.
//! Comments and other fields (`event:`, `id:`, `retry:`) are dropped.

/// Line-buffered SSE event decoder yielding `data` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
    /// Data lines of the event being assembled.
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every completed event's data in order.
    ///
    /// An event still missing its blank-line terminator stays buffered; if
    /// the byte stream ends there, the event is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        while let Some(rel) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + rel;
            process_line(&self.buf[start..end], &mut self.data, &mut payloads);
            start = end + 1;
            self.scanned = start;
        }

        // One shift per push; the remainder holds no newline.
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        payloads
    }
}

fn process_line(line: &[u8], data: &mut Option<String>, payloads: &mut Vec<String>) {
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    if line.is_empty() {
        if let Some(event) = data.take() {
            payloads.push(event);
        }
        return;
    }
    if line.starts_with(b":") {
        return;
    }

    let line = String::from_utf8_lossy(line);
    let (field, value) = match line.split_once(':') {
        // A single leading space after the colon is part of the framing.
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (&*line, ""),
    };
    if field != "data" {
        return;
    }

    match data {
        Some(buf) => {
            buf.push('\n');
            buf.push_str(value);
        }
        None => *data = Some(value.to_string()),
    }
}
