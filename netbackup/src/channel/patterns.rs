//! Prompt detection for CLI output.

use regex::bytes::Regex;

/// Default CLI prompt pattern.
///
/// A full line of 1 to 32 hostname-ish characters followed by `#`, `>` or
/// `$`, optionally preceded by a carriage return. Group 1 is the prompt.
pub const DEFAULT_PROMPT_PATTERN: &str = r"(?mi)^\r?([a-z0-9.\-_@()/:]{1,32}\s*[#>$])\s*$";

/// Trait for prompt matching - regex by default, extensible for custom parsers.
pub trait PromptMatcher: Send + Sync {
    /// Returns the prompt text if `line` is a prompt, or None.
    ///
    /// `line` is the text after the last newline of the output seen so far.
    fn match_prompt(&self, line: &[u8]) -> Option<String>;

    /// Check if the line is a prompt.
    fn is_prompt(&self, line: &[u8]) -> bool {
        self.match_prompt(line).is_some()
    }
}

/// Regex-based prompt matcher (the default implementation).
#[derive(Debug, Clone)]
pub struct PromptPattern {
    pattern: Regex,
}

impl PromptPattern {
    /// Compile a custom prompt pattern.
    ///
    /// When the pattern has a capture group, group 1 is reported as the
    /// prompt; otherwise the whole match is.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Get a reference to the underlying regex.
    pub fn regex(&self) -> &Regex {
        &self.pattern
    }
}

impl Default for PromptPattern {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_PATTERN).expect("default prompt pattern compiles")
    }
}

impl PromptMatcher for PromptPattern {
    fn match_prompt(&self, line: &[u8]) -> Option<String> {
        let caps = self.pattern.captures(line)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        Some(String::from_utf8_lossy(m.as_bytes()).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(line: &str) -> Option<String> {
        PromptPattern::default().match_prompt(line.as_bytes())
    }

    #[test]
    fn test_matches_common_prompts() {
        assert_eq!(prompt("router1#").as_deref(), Some("router1#"));
        assert_eq!(prompt("SW-core>").as_deref(), Some("SW-core>"));
        assert_eq!(
            prompt("host.example.com$").as_deref(),
            Some("host.example.com$")
        );
        assert_eq!(prompt("admin@fw01:/#").as_deref(), Some("admin@fw01:/#"));
        assert_eq!(prompt("sw1(config)#").as_deref(), Some("sw1(config)#"));
    }

    #[test]
    fn test_leading_carriage_return_and_trailing_space() {
        assert_eq!(prompt("\rrouter1#").as_deref(), Some("router1#"));
        assert_eq!(prompt("router1# ").as_deref(), Some("router1#"));
        assert_eq!(prompt("router1#\r").as_deref(), Some("router1#"));
    }

    #[test]
    fn test_rejects_long_names() {
        let name = "a".repeat(32);
        assert!(prompt(&format!("{name}#")).is_some());

        let name = "a".repeat(33);
        assert!(prompt(&format!("{name}#")).is_none());
    }

    #[test]
    fn test_rejects_disallowed_characters() {
        assert!(prompt("router 1#").is_none());
        assert!(prompt("router!#").is_none());
        assert!(prompt("[admin@host]$").is_none());
        assert!(prompt("Building configuration...").is_none());
        assert!(prompt("#").is_none());
        assert!(prompt("").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(prompt("ROUTER1#").is_some());
        assert!(prompt("Edge-Rtr.LAB>").is_some());
    }

    #[test]
    fn test_custom_pattern_without_group() {
        let matcher = PromptPattern::new(r"^\[\w+@\w+\]\$\s*$").unwrap();
        assert_eq!(
            matcher.match_prompt(b"[admin@host]$ ").as_deref(),
            Some("[admin@host]$ ")
        );
        assert!(!matcher.is_prompt(b"router1#"));
    }
}
