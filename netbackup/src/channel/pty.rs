//! PTY channel abstraction for interactive sessions.
//!
//! Turns a raw duplex byte stream into request/response pairs delimited by
//! CLI prompts.

use std::sync::Arc;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::buffer::PromptBuffer;
use super::patterns::{PromptMatcher, PromptPattern};
use crate::error::{ChannelError, Result};

/// Bytes requested from the stream per read.
pub const READ_CHUNK_SIZE: usize = 8192;

/// High-level PTY channel for interactive device sessions.
///
/// Reads never time out on their own; a device that never prints a
/// recognizable prompt keeps `read_until_prompt` pending, so callers wrap
/// these calls in `tokio::time::timeout`.
pub struct PtyChannel<S> {
    /// The underlying duplex stream.
    stream: S,

    /// Output accumulated since the last prompt.
    buffer: PromptBuffer,

    /// Decides whether the final line is a prompt.
    matcher: Arc<dyn PromptMatcher>,

    /// The most recently matched prompt.
    prompt: Option<String>,
}

impl<S> PtyChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream using the default prompt pattern.
    pub fn new(stream: S) -> Self {
        Self::with_matcher(stream, Arc::new(PromptPattern::default()))
    }

    /// Wrap a stream using a custom prompt matcher.
    pub fn with_matcher(stream: S, matcher: Arc<dyn PromptMatcher>) -> Self {
        Self {
            stream,
            buffer: PromptBuffer::new(),
            matcher,
            prompt: None,
        }
    }

    /// Read until the final line of output is a prompt.
    ///
    /// Returns everything before that line and remembers the prompt. The
    /// buffer is reset afterwards, so each call sees only fresh output.
    pub async fn read_until_prompt(&mut self) -> Result<String> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(ChannelError::Io)?;

            if n == 0 {
                debug!(
                    "channel closed with {} unmatched bytes buffered",
                    self.buffer.len()
                );
                return Err(ChannelError::Closed.into());
            }

            trace!("read {} bytes", n);
            self.buffer.extend(&chunk[..n]);

            if let Some(prompt) = self.buffer.match_prompt(self.matcher.as_ref()) {
                trace!("prompt matched: {:?}", prompt);
                self.prompt = Some(prompt);
                let output = self.buffer.take_output();
                return Ok(String::from_utf8_lossy(&output).into_owned());
            }
        }
    }

    /// Send a command and return its output without the echo or prompt.
    pub async fn run_command(&mut self, command: &str) -> Result<String> {
        debug!("sending command: {:?}", command);
        self.send(command).await?;

        let output = self.read_until_prompt().await?;
        Ok(strip_echo(&output, command).to_string())
    }

    /// Write a line to the device.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        self.stream
            .write_all(&data)
            .await
            .map_err(ChannelError::Io)?;
        self.stream.flush().await.map_err(ChannelError::Io)?;
        Ok(())
    }

    /// The most recently matched prompt.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Release the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Strip the device's echo of `command` from the start of `output`.
///
/// The echo is the command text followed by one newline (`\n` or `\r\n`).
/// Output that does not start with the command is returned unchanged.
pub fn strip_echo<'a>(output: &'a str, command: &str) -> &'a str {
    match output.strip_prefix(command) {
        Some(rest) => {
            let rest = rest.strip_prefix('\r').unwrap_or(rest);
            rest.strip_prefix('\n').unwrap_or(rest)
        }
        None => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_run_command_strips_echo_and_prompt() {
        let mock = Builder::new()
            .write(b"show version\n")
            .read(b"show version\nOutput line 1\nOutput line 2\nrouter1#")
            .build();
        let mut channel = PtyChannel::new(mock);

        let output = channel.run_command("show version").await.unwrap();
        assert_eq!(output, "Output line 1\nOutput line 2");
        assert_eq!(channel.prompt(), Some("router1#"));
    }

    #[tokio::test]
    async fn test_run_command_crlf_echo() {
        let mock = Builder::new()
            .write(b"show clock\n")
            .read(b"show clock\r\n12:00:00 UTC\r\nsw1>")
            .build();
        let mut channel = PtyChannel::new(mock);

        let output = channel.run_command("show clock").await.unwrap();
        assert_eq!(output, "12:00:00 UTC\r");
        assert_eq!(channel.prompt(), Some("sw1>"));
    }

    #[tokio::test]
    async fn test_read_until_prompt_across_partial_reads() {
        let mock = Builder::new()
            .read(b"Welcome\r\nLast login: today\r\nrou")
            .read(b"ter")
            .read(b"1#")
            .build();
        let mut channel = PtyChannel::new(mock);

        let banner = channel.read_until_prompt().await.unwrap();
        assert_eq!(banner, "Welcome\r\nLast login: today\r");
        assert_eq!(channel.prompt(), Some("router1#"));
    }

    #[tokio::test]
    async fn test_prompt_like_line_mid_output_is_not_a_boundary() {
        let mock = Builder::new()
            .write(b"show run\n")
            .read(b"show run\nbanner motd\nr1#\n")
            .read(b"end\nr1#")
            .build();
        let mut channel = PtyChannel::new(mock);

        let output = channel.run_command("show run").await.unwrap();
        assert_eq!(output, "banner motd\nr1#\nend");
    }

    #[tokio::test]
    async fn test_sequential_commands_reset_buffer() {
        let mock = Builder::new()
            .read(b"r1#")
            .write(b"terminal length 0\n")
            .read(b"terminal length 0\nr1#")
            .write(b"show run\n")
            .read(b"show run\n!\nhostname r1\n!\nr1#")
            .build();
        let mut channel = PtyChannel::new(mock);

        assert_eq!(channel.read_until_prompt().await.unwrap(), "");
        assert_eq!(channel.run_command("terminal length 0").await.unwrap(), "");
        assert_eq!(
            channel.run_command("show run").await.unwrap(),
            "!\nhostname r1\n!"
        );
    }

    #[tokio::test]
    async fn test_closed_stream_before_prompt() {
        let mock = Builder::new().read(b"partial output").build();
        let mut channel = PtyChannel::new(mock);

        let err = channel.read_until_prompt().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Channel(ChannelError::Closed)
        ));
    }

    #[test]
    fn test_strip_echo() {
        assert_eq!(strip_echo("cmd\nout", "cmd"), "out");
        assert_eq!(strip_echo("cmd\r\nout", "cmd"), "out");
        assert_eq!(strip_echo("other\nout", "cmd"), "other\nout");
        assert_eq!(strip_echo("cmd", "cmd"), "");
    }
}
