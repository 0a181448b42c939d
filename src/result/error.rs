//! Error types for ExpectRust

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a session.
///
/// `Timeout` and `Eof` are ordinary outcomes of an `expect` call that callers
/// are expected to branch on (see [`ExpectError::is_recoverable`]). The rest
/// indicate that something went wrong with the process, the PTY or the way the
/// session is being used.
///
/// # Examples
///
/// ```no_run
/// use expectrust::{ExpectError, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(5))
///     .spawn("some-command")?;
///
/// match session.expect(Pattern::literal("done")).await {
///     Ok(result) => println!("Matched: {}", result.matched),
///     Err(ExpectError::Timeout { duration, .. }) => {
///         eprintln!("Timed out after {:?}", duration);
///     }
///     Err(ExpectError::Eof) => {
///         eprintln!("Process exited unexpectedly");
///     }
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Timeout waiting for pattern.
    ///
    /// The unconsumed output is left untouched, so a later `expect` call still
    /// sees everything that arrived while this one was waiting.
    #[error("Timeout waiting for {pattern} (after {duration:?})")]
    Timeout {
        /// Duration that was waited before timeout
        duration: Duration,
        /// Description of the pattern(s) being waited for
        pattern: String,
    },

    /// The process closed its output before the pattern matched.
    #[error("EOF reached before pattern matched")]
    Eof,

    /// The unconsumed output grew past the configured retention limit.
    ///
    /// This almost always means the session is waiting for something that
    /// will never arrive. The reader stops once this happens.
    #[error("Buffer overflow: more than {limit} unconsumed bytes")]
    BufferOverflow {
        /// Configured maximum number of retained bytes
        limit: usize,
    },

    /// Invalid pattern.
    #[error("Invalid pattern: {0}")]
    PatternError(#[from] PatternError),

    /// Writing to the process input failed, or the process has already exited.
    #[error("Write failed: {0}")]
    WriteError(#[source] std::io::Error),

    /// Unexpected OS-level I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// PTY error.
    ///
    /// Returned when the pseudo-terminal cannot be allocated or manipulated.
    #[error("PTY error: {0}")]
    PtyError(String),

    /// Process spawning error (command not found, permission denied, ...).
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),

    /// The exit status was already consumed by an earlier `wait()`.
    #[error("Process has already been reaped")]
    AlreadyReaped,

    /// The session was closed, possibly while an `expect` was in flight.
    #[error("Session is closed")]
    Closed,
}

impl ExpectError {
    /// Whether this error is an expected outcome the caller can branch on
    /// (timeout or end of output) rather than a hard failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExpectError::Timeout { .. } | ExpectError::Eof)
    }

    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExpectError::Timeout { .. })
    }
}

/// Errors related to pattern creation or matching.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Empty pattern.
    ///
    /// An empty literal would match at every position and consume nothing.
    #[error("Pattern cannot be empty")]
    EmptyPattern,

    /// Regex that matches the empty string.
    ///
    /// Such a regex matches immediately with zero width, so waiting on it
    /// would never consume any output.
    #[error("Regex matches the empty string: {0}")]
    MatchesEmpty(String),
}
