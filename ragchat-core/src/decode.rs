//! Incremental byte → line decoding for event-stream bodies.
//!
//! Network chunks can end anywhere: inside a multi-byte UTF-8 sequence, inside a
//! line, inside a JSON object. [`Utf8Decoder`] keeps incomplete sequences across
//! chunks and [`DecodeBuffer`] keeps the unterminated tail of the last line, so
//! callers only ever see complete lines.

use std::char::REPLACEMENT_CHARACTER;

/// Stateful UTF-8 decoder. Invalid bytes become U+FFFD; an incomplete trailing
/// sequence is held back until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    if let Ok(s) = std::str::from_utf8(valid) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT_CHARACTER);
                            rest = &tail[bad..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of input. A dangling partial sequence decodes to U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// One unit produced by [`DecodeBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    /// A complete line, without its `\n` (or `\r\n`) terminator.
    Line(String),
    /// A line longer than the configured cap was dropped; carries its byte length.
    Oversized(usize),
}

/// Byte-to-line accumulator for one stream.
#[derive(Debug)]
pub struct DecodeBuffer {
    decoder: Utf8Decoder,
    pending: String,
    max_line_bytes: usize,
    discarding: bool,
    discarded: usize,
}

impl DecodeBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            pending: String::new(),
            max_line_bytes,
            discarding: false,
            discarded: 0,
        }
    }

    /// Feed one network chunk; returns the lines it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedLine> {
        let text = self.decoder.decode(chunk);
        self.push_text(&text)
    }

    /// End of input: flush the decoder and return the unterminated tail, if any.
    pub fn finish(&mut self) -> Vec<DecodedLine> {
        let tail = self.decoder.finish();
        let mut out = self.push_text(&tail);
        if self.discarding {
            self.discarding = false;
            out.push(DecodedLine::Oversized(std::mem::take(&mut self.discarded)));
        } else if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            out.push(self.complete_line(&line));
        }
        out
    }

    /// Text buffered past the last newline.
    pub fn pending_text(&self) -> &str {
        &self.pending
    }

    fn push_text(&mut self, mut text: &str) -> Vec<DecodedLine> {
        let mut out = Vec::new();

        if self.discarding {
            match text.find('\n') {
                Some(idx) => {
                    self.discarded += idx;
                    self.discarding = false;
                    out.push(DecodedLine::Oversized(std::mem::take(&mut self.discarded)));
                    text = &text[idx + 1..];
                }
                None => {
                    self.discarded += text.len();
                    return out;
                }
            }
        }

        self.pending.push_str(text);
        if let Some(last) = self.pending.rfind('\n') {
            let rest = self.pending.split_off(last + 1);
            let complete = std::mem::replace(&mut self.pending, rest);
            for line in complete[..complete.len() - 1].split('\n') {
                out.push(self.complete_line(line));
            }
        }

        if self.pending.len() > self.max_line_bytes {
            tracing::warn!(
                buffered = self.pending.len(),
                cap = self.max_line_bytes,
                "event-stream line exceeded cap, discarding"
            );
            self.discarded = self.pending.len();
            self.pending.clear();
            self.discarding = true;
        }
        out
    }

    // A line can arrive whole in one chunk, so the cap applies here too.
    fn complete_line(&self, line: &str) -> DecodedLine {
        let line = trim_cr(line);
        if line.len() > self.max_line_bytes {
            tracing::warn!(bytes = line.len(), cap = self.max_line_bytes, "event-stream line exceeded cap");
            DecodedLine::Oversized(line.len())
        } else {
            DecodedLine::Line(line.to_string())
        }
    }
}

fn trim_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}
