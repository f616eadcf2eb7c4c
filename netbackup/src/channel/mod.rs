//! Channel layer for prompt detection and PTY operations.
//!
//! This module turns the raw byte stream of an interactive shell into
//! discrete command outputs delimited by CLI prompts.

mod buffer;
mod patterns;
mod pty;

pub use buffer::PromptBuffer;
pub use patterns::{DEFAULT_PROMPT_PATTERN, PromptMatcher, PromptPattern};
pub use pty::{PtyChannel, READ_CHUNK_SIZE, strip_echo};
