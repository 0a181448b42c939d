//! Incremental multi-pattern search over a growing haystack

use super::{Match, Matcher, Pattern};
use crate::result::PatternError;

struct Entry {
    matcher: Box<dyn Matcher>,
    scanned: usize,
}

/// Search state for one `expect` call.
///
/// The haystack handed to [`Search::poll`] must be the same unconsumed range
/// each time, only grown at the tail. Every entry remembers how much of it was
/// already searched so new chunks don't trigger a full rescan for matchers
/// that can resume.
pub(crate) struct Search {
    entries: Vec<Entry>,
    description: String,
}

impl Search {
    pub(crate) fn new(patterns: &[Pattern]) -> Result<Self, PatternError> {
        if patterns.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let entries = patterns
            .iter()
            .map(|p| {
                Ok(Entry {
                    matcher: p.to_matcher()?,
                    scanned: 0,
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        let description = patterns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ");

        Ok(Self {
            entries,
            description,
        })
    }

    /// Human-readable description of the patterns, for error messages.
    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    /// Earliest match across all patterns; ties go to the lowest index.
    pub(crate) fn poll(&mut self, haystack: &[u8]) -> Option<(usize, Match)> {
        let mut best: Option<(usize, Match)> = None;

        for (index, entry) in self.entries.iter_mut().enumerate() {
            let from = entry.matcher.resume_from(entry.scanned).min(haystack.len());
            match entry.matcher.find_at(haystack, from) {
                Some(m) => {
                    if best.as_ref().is_none_or(|(_, b)| m.start < b.start) {
                        best = Some((index, m));
                    }
                }
                None => entry.scanned = haystack.len(),
            }
        }

        best
    }
}
