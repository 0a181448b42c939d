//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

use std::collections::HashMap;

/// Result of a successful pattern match.
///
/// Positions are absolute byte offsets into everything the process has
/// written since the session started, so two results from the same session
/// can be compared directly.
///
/// # Examples
///
/// ```no_run
/// use expectrust::{Session, Pattern};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let session = Session::spawn("echo test")?;
/// let result = session.expect(Pattern::literal("test")).await?;
///
/// println!("Matched: {}", result.matched);
/// println!("Before match: {}", result.before);
/// println!("Position: {}..{}", result.start, result.end);
/// # Ok(())
/// # }
/// ```
///
/// # Regex Captures
///
/// ```no_run
/// use expectrust::{Session, Pattern};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let session = Session::spawn("echo user@example.com")?;
/// let pattern = Pattern::regex(r"(?P<user>\w+)@(\w+)\.(\w+)")?;
/// let result = session.expect(pattern).await?;
///
/// println!("Email: {:?}", result.capture(0));
/// println!("User: {:?}", result.name("user"));
/// println!("Domain: {:?}", result.capture(2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Index of the pattern that matched (for `expect_any`).
    ///
    /// For `expect` with a single pattern, this is always 0.
    pub pattern_index: usize,

    /// The matched text (lossy UTF-8).
    pub matched: String,

    /// Absolute start offset of the match in the output stream.
    pub start: usize,

    /// Absolute end offset of the match in the output stream.
    pub end: usize,

    /// Output received after the previous match and before this one.
    ///
    /// This is usually the interesting part: the output of the command that
    /// was sent before waiting for the prompt.
    pub before: String,

    /// Positional captures.
    ///
    /// Index 0 is the whole match. Groups that did not participate in the
    /// match are `None`. Literal patterns only carry index 0.
    pub captures: Vec<Option<String>>,

    /// Named captures that participated in the match.
    pub named: HashMap<String, String>,
}

impl MatchResult {
    /// Capture group by index (0 is the whole match).
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index)?.as_deref()
    }

    /// Capture group by name.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the match is zero-width.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchResult {
        let mut named = HashMap::new();
        named.insert("user".to_string(), "bob".to_string());
        MatchResult {
            pattern_index: 0,
            matched: "bob@host".into(),
            start: 10,
            end: 18,
            before: "login: ".into(),
            captures: vec![Some("bob@host".into()), Some("bob".into()), None],
            named,
        }
    }

    #[test]
    fn test_capture_lookup() {
        let result = sample();
        assert_eq!(result.capture(0), Some("bob@host"));
        assert_eq!(result.capture(1), Some("bob"));
        assert_eq!(result.capture(2), None);
        assert_eq!(result.capture(9), None);
        assert_eq!(result.name("user"), Some("bob"));
        assert_eq!(result.name("host"), None);
    }

    #[test]
    fn test_len() {
        let result = sample();
        assert_eq!(result.len(), 8);
        assert!(!result.is_empty());
    }
}
