//! Pattern matching for expect operations

mod matcher;
mod search;

pub use matcher::{Match, Matcher};
pub(crate) use search::Search;

use crate::result::PatternError;
use regex::bytes::Regex;
use std::fmt;

/// Pattern types for matching process output.
///
/// Patterns are matched against raw output bytes, so output that is not valid
/// UTF-8, or a multibyte character split across two reads, never prevents a
/// match.
///
/// # Examples
///
/// ```
/// use expectrust::Pattern;
///
/// // Literal string (fastest)
/// let p1 = Pattern::literal("password: ");
///
/// // Regular expression, searched anywhere in the pending output
/// let p2 = Pattern::regex(r"\d+").unwrap();
///
/// // Regular expression that must match right at the pending output's start
/// let p3 = Pattern::anchored_regex(r"\r?\n\$ ").unwrap();
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Literal string match.
    ///
    /// Uses the Boyer-Moore-Horspool algorithm. Prefer this whenever the
    /// expected text is known exactly.
    Literal(String),

    /// Regular expression, first match anywhere in the unconsumed output.
    ///
    /// Capture groups (positional and named) are returned in the
    /// `MatchResult`.
    Regex(Regex),

    /// Regular expression that must match starting exactly at the first
    /// unconsumed byte. Used for strict sequencing of output.
    AnchoredRegex(Regex),
}

impl Pattern {
    /// Create a literal string pattern.
    ///
    /// # Examples
    ///
    /// ```
    /// use expectrust::Pattern;
    ///
    /// let pattern = Pattern::literal("$ ");
    /// let pattern2 = Pattern::literal(String::from(">>> "));
    /// ```
    pub fn literal(s: impl Into<String>) -> Self {
        Pattern::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid, or if it matches the empty
    /// string (such a pattern would match immediately without consuming
    /// anything).
    ///
    /// # Examples
    ///
    /// ```
    /// use expectrust::Pattern;
    ///
    /// let digits = Pattern::regex(r"\d+").unwrap();
    /// let email = Pattern::regex(r"(?P<user>\w+)@(\w+)\.(\w+)").unwrap();
    /// let ci = Pattern::regex(r"(?i)hello").unwrap();
    ///
    /// assert!(Pattern::regex("[invalid(").is_err());
    /// assert!(Pattern::regex(r"\d*").is_err());
    /// ```
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(compile(pattern)?))
    }

    /// Create a regex pattern anchored at the current position.
    ///
    /// The match must begin at the first byte not yet consumed by a previous
    /// `expect`; output that merely contains the pattern further along does
    /// not match.
    ///
    /// # Errors
    ///
    /// Same as [`Pattern::regex`].
    pub fn anchored_regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::AnchoredRegex(compile(&format!("{ANCHOR_OPEN}{pattern})"))?))
    }

    /// Convert pattern to a matcher implementation
    pub fn to_matcher(&self) -> Result<Box<dyn Matcher>, PatternError> {
        use matcher::{LiteralMatcher, RegexMatcher};

        match self {
            Pattern::Literal(s) => Ok(Box::new(LiteralMatcher::new(s.as_bytes())?)),
            Pattern::Regex(r) | Pattern::AnchoredRegex(r) => {
                Ok(Box::new(RegexMatcher::new(r.clone())))
            }
        }
    }
}

/// Wrapper that pins an anchored regex to the first unconsumed byte
const ANCHOR_OPEN: &str = r"\A(?:";

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    let regex = Regex::new(pattern)?;
    if regex.is_match(b"") {
        return Err(PatternError::MatchesEmpty(pattern.to_string()));
    }
    Ok(regex)
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::literal(s)
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::Literal(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "{s:?}"),
            Pattern::Regex(r) => write!(f, "/{}/", r.as_str()),
            Pattern::AnchoredRegex(r) => {
                let source = r
                    .as_str()
                    .strip_prefix(ANCHOR_OPEN)
                    .and_then(|rest| rest.strip_suffix(')'))
                    .unwrap_or(r.as_str());
                write!(f, "anchored /{source}/")
            }
        }
    }
}
