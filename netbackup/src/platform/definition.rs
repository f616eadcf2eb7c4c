//! OS profile definition: which commands capture a device's configuration.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::channel::{PromptMatcher, PromptPattern};
use crate::error::{ChannelError, PlatformError, Result};

/// Command that prints the running configuration on most CLIs.
pub const DEFAULT_SHOW_RUNNING: &str = "show running-config";

/// Per-OS description of how to retrieve the running configuration.
///
/// A profile with `disable_paging` set (even to an empty list) is captured
/// through an interactive shell; without it the show-command runs as a
/// single non-interactive command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OsProfile {
    /// Profile name (e.g., "ios", "junos"). Filled from the config key.
    #[serde(default)]
    pub name: String,

    /// Command that prints the running configuration.
    #[serde(default = "default_show_running")]
    pub show_running: String,

    /// Commands that turn off `--More--` paging, in order.
    ///
    /// Accepts a single string or a list in configuration files.
    #[serde(default, deserialize_with = "one_or_many")]
    pub disable_paging: Option<Vec<String>>,

    /// Prompt regex overriding the default matcher.
    #[serde(default)]
    pub prompt_pattern: Option<String>,
}

impl OsProfile {
    /// Create a profile that runs `show running-config` non-interactively.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            show_running: default_show_running(),
            disable_paging: None,
            prompt_pattern: None,
        }
    }

    /// Set the show-command.
    pub fn with_show_running(mut self, command: impl Into<String>) -> Self {
        self.show_running = command.into();
        self
    }

    /// Append a paging-disable command.
    pub fn with_disable_paging(mut self, command: impl Into<String>) -> Self {
        self.disable_paging
            .get_or_insert_with(Vec::new)
            .push(command.into());
        self
    }

    /// Set a custom prompt regex.
    pub fn with_prompt_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.prompt_pattern = Some(pattern.into());
        self
    }

    /// Whether capture needs an interactive shell.
    pub fn is_interactive(&self) -> bool {
        self.disable_paging.is_some()
    }

    /// Paging-disable commands, empty when none are configured.
    pub fn paging_commands(&self) -> &[String] {
        self.disable_paging.as_deref().unwrap_or_default()
    }

    /// Build the prompt matcher for this OS.
    pub fn prompt_matcher(&self) -> Result<Arc<dyn PromptMatcher>> {
        let pattern = match &self.prompt_pattern {
            Some(pattern) => PromptPattern::new(pattern).map_err(ChannelError::from)?,
            None => PromptPattern::default(),
        };
        Ok(Arc::new(pattern))
    }

    /// Check the profile can drive a capture.
    pub fn validate(&self) -> Result<()> {
        if self.show_running.trim().is_empty() {
            return Err(self.invalid("show_running is empty"));
        }
        if self.paging_commands().iter().any(|c| c.trim().is_empty()) {
            return Err(self.invalid("disable_paging contains an empty command"));
        }
        if let Some(pattern) = &self.prompt_pattern {
            if let Err(e) = PromptPattern::new(pattern) {
                return Err(self.invalid(&format!("prompt_pattern: {e}")));
            }
        }
        Ok(())
    }

    fn invalid(&self, message: &str) -> crate::Error {
        PlatformError::InvalidDefinition {
            name: self.name.clone(),
            message: message.to_string(),
        }
        .into()
    }
}

impl Default for OsProfile {
    fn default() -> Self {
        Self::new(super::DEFAULT_PROFILE)
    }
}

fn default_show_running() -> String {
    DEFAULT_SHOW_RUNNING.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(command) => vec![command],
        OneOrMany::Many(commands) => commands,
    }))
}
