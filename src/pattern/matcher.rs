//! Pattern matcher implementations

use crate::result::PatternError;
use regex::bytes::Regex;

/// Result of a pattern match, relative to the searched haystack
#[derive(Debug, Clone)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match
    pub end: usize,
    /// Positional captures; index 0 is the whole match
    pub captures: Vec<Option<String>>,
    /// Named captures that participated in the match
    pub named: Vec<(String, String)>,
}

/// Trait for pattern matching
pub trait Matcher: Send + Sync {
    /// Find the leftmost match starting at or after `from`.
    fn find_at(&self, haystack: &[u8], from: usize) -> Option<Match>;

    /// Find the leftmost match in the haystack
    fn find(&self, haystack: &[u8]) -> Option<Match> {
        self.find_at(haystack, 0)
    }

    /// Where a new search may start, given that the first `scanned` bytes of
    /// the same haystack were already searched without a match.
    ///
    /// The haystack only ever grows at the tail between searches, so a
    /// matcher that can prove earlier positions are dead skips them.
    fn resume_from(&self, _scanned: usize) -> usize {
        0
    }
}

/// Literal matcher using the Boyer-Moore-Horspool algorithm
pub struct LiteralMatcher {
    pattern: Vec<u8>,
    bad_char_table: [usize; 256],
}

impl LiteralMatcher {
    /// Create a new literal matcher
    pub fn new(pattern: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        let pattern = pattern.into();

        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let mut bad_char_table = [pattern.len(); 256];
        for (i, &byte) in pattern.iter().enumerate().take(pattern.len() - 1) {
            bad_char_table[byte as usize] = pattern.len() - 1 - i;
        }

        Ok(Self {
            pattern,
            bad_char_table,
        })
    }
}

impl Matcher for LiteralMatcher {
    fn find_at(&self, haystack: &[u8], from: usize) -> Option<Match> {
        let len = self.pattern.len();
        let mut pos = from;

        while pos + len <= haystack.len() {
            if haystack[pos..pos + len] == self.pattern[..] {
                return Some(Match {
                    start: pos,
                    end: pos + len,
                    captures: vec![Some(String::from_utf8_lossy(&self.pattern).into_owned())],
                    named: vec![],
                });
            }

            let shift_char = haystack[pos + len - 1];
            pos += self.bad_char_table[shift_char as usize];
        }

        None
    }

    fn resume_from(&self, scanned: usize) -> usize {
        // An occurrence straddling the old tail starts at most len-1 bytes
        // before it.
        scanned.saturating_sub(self.pattern.len() - 1)
    }
}

/// Regex matcher over raw bytes
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Create a new regex matcher from a compiled regex
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    /// Zero-width matches (`\b`, `$`, lookaround-like assertions) are
    /// skipped: they would consume nothing, so the same position would match
    /// forever.
    fn find_at(&self, haystack: &[u8], from: usize) -> Option<Match> {
        let mut at = from;
        let (captures, full_match) = loop {
            if at > haystack.len() {
                return None;
            }
            let captures = self.regex.captures_at(haystack, at)?;
            let full_match = captures.get(0)?;
            if full_match.start() < full_match.end() {
                break (captures, full_match);
            }
            at = full_match.end() + 1;
        };

        let positional = (0..captures.len())
            .map(|i| {
                captures
                    .get(i)
                    .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            })
            .collect();

        let named = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures.name(name).map(|m| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(m.as_bytes()).into_owned(),
                    )
                })
            })
            .collect();

        Some(Match {
            start: full_match.start(),
            end: full_match.end(),
            captures: positional,
            named,
        })
    }
}
