//! Output buffer that keeps prompt detection bounded to the final line.
//!
//! Devices can stream megabytes of configuration before the prompt comes
//! back. Rather than re-running the prompt regex over the whole buffer after
//! every read, the buffer tracks where its final line starts (updated from
//! each new chunk with `memrchr`) so only that line is ever tested.
//!
//! Incoming bytes pass through a `vte` parser first, which drops the VT100
//! escape sequences a PTY shell likes to wrap around prompts.

use bytes::BytesMut;

use super::patterns::PromptMatcher;

/// Buffer for accumulating channel output between prompts.
pub struct PromptBuffer {
    /// The accumulated, escape-stripped output.
    buffer: BytesMut,

    /// Offset of the first byte after the last `\n`.
    line_start: usize,

    /// Escape-sequence parser; keeps state across chunk boundaries.
    parser: vte::Parser,
}

impl PromptBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            line_start: 0,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping terminal escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let before = self.buffer.len();

        let mut sink = Printable {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut sink, data);

        if let Some(pos) = memchr::memrchr(b'\n', &self.buffer[before..]) {
            self.line_start = before + pos + 1;
        }
    }

    /// The text after the last newline.
    pub fn last_line(&self) -> &[u8] {
        &self.buffer[self.line_start..]
    }

    /// Test the final line against a prompt matcher.
    pub fn match_prompt(&self, matcher: &dyn PromptMatcher) -> Option<String> {
        matcher.match_prompt(self.last_line())
    }

    /// Take everything before the final newline and reset the buffer.
    ///
    /// The final line (normally the prompt) is discarded.
    pub fn take_output(&mut self) -> Vec<u8> {
        let output = match self.line_start {
            0 => Vec::new(),
            start => self.buffer[..start - 1].to_vec(),
        };
        self.clear();
        output
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.line_start = 0;
    }
}

impl Default for PromptBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PromptBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBuffer")
            .field("len", &self.buffer.len())
            .field("line_start", &self.line_start)
            .finish()
    }
}

/// `vte` performer that keeps printable text and line control characters.
struct Printable<'a> {
    out: &'a mut BytesMut,
}

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}
