//! Session management for PTY-based process automation

mod builder;
mod deadline;

pub use builder::SessionBuilder;

use crate::buffer::{SharedBuffer, StreamStatus};
use crate::pattern::{Pattern, Search};
use crate::process::{ProcessHandle, Signal};
use crate::reader::StreamReader;
use crate::result::{ExpectError, MatchResult};
use deadline::Deadline;
use portable_pty::ExitStatus;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long `close()` waits for the reader thread before leaving it detached
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long the output may stay open after the child was reaped before the
/// rest of its process group is signalled
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No `expect` in progress
    Idle,
    /// An `expect` is waiting for output
    Waiting,
    /// `close()` was called; the process is gone
    Closed,
}

#[derive(Debug)]
struct SessionConfig {
    name: String,
    timeout: Option<Duration>,
    eol: String,
    close_grace: Duration,
    max_buffer_size: usize,
}

/// Main session for interacting with a spawned process.
///
/// A `Session` represents a running process with an attached PTY (pseudo-terminal).
/// Output is collected in the background from the moment the process starts;
/// `expect` waits for a pattern to show up in the output that has not been
/// consumed by an earlier match.
///
/// Every method takes `&self`. Wrap the session in an [`Arc`] to send input or
/// close it from another task while an `expect` is waiting. Concurrent
/// `expect` calls on one session are served one after the other.
///
/// Dropping a session closes it (see [`Session::close`]), blocking the current
/// thread for up to the close grace period if the process is still running.
///
/// # Examples
///
/// ```no_run
/// use expectrust::Session;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(30))
///     .spawn("python3 -i")?;
///
/// session.expect(">>> ").await?;
/// session.send_line("print('Hello')").await?;
/// session.expect("Hello").await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    process: Arc<ProcessHandle>,
    shared: Arc<SharedBuffer>,
    reader: Mutex<Option<StreamReader>>,
    expecting: tokio::sync::Mutex<()>,
    state: Mutex<SessionState>,
    config: SessionConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Create a new session builder.
    ///
    /// This is the recommended way to create a session as it allows you to configure
    /// various options like timeout, buffer size, and PTY size.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    /// use std::time::Duration;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .timeout(Duration::from_secs(60))
    ///     .max_buffer_size(16384)
    ///     .spawn("ssh user@host")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn a command and return a session (convenience method).
    ///
    /// This is a shorthand for `Session::builder().spawn(command)`.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to spawn, split on whitespace (e.g. "python3 -i")
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("echo Hello")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(command: &str) -> Result<Self, ExpectError> {
        SessionBuilder::new().spawn(command)
    }

    /// Name used for this session in logs
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Wait for a pattern to appear in the output, using the session timeout.
    ///
    /// Plain strings are matched literally.
    ///
    /// # Returns
    ///
    /// A `MatchResult` with the matched text, its position, and the output
    /// received between the previous match and this one. Everything up to
    /// the end of the match is consumed.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::Timeout`] if nothing matched in time. The output is
    ///   kept, so a later `expect` can still match it.
    /// - [`ExpectError::Eof`] if the process closed its output first
    /// - [`ExpectError::BufferOverflow`] if unconsumed output hit the limit
    /// - [`ExpectError::Closed`] if the session was closed
    /// - [`ExpectError::IoError`] if reading from the PTY failed
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::{Session, Pattern};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let session = Session::spawn("echo test")?;
    /// let result = session.expect("test").await?;
    /// println!("Matched: {}", result.matched);
    ///
    /// let result = session.expect(Pattern::regex(r"\$ $")?).await?;
    /// println!("Before: {}", result.before);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn expect(&self, pattern: impl Into<Pattern>) -> Result<MatchResult, ExpectError> {
        self.expect_any_timeout(&[pattern.into()], self.config.timeout)
            .await
    }

    /// Like [`Session::expect`] with an explicit timeout; `None` waits forever.
    pub async fn expect_timeout(
        &self,
        pattern: impl Into<Pattern>,
        timeout: Option<Duration>,
    ) -> Result<MatchResult, ExpectError> {
        self.expect_any_timeout(&[pattern.into()], timeout).await
    }

    /// Wait for any of several patterns, using the session timeout.
    ///
    /// The pattern whose match starts earliest in the output wins; if two
    /// start at the same position, the one listed first wins.
    /// [`MatchResult::pattern_index`] tells which one it was.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::{Session, Pattern};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let session = Session::spawn("ssh user@host")?;
    /// let result = session.expect_any(&[
    ///     Pattern::literal("password:"),
    ///     Pattern::literal("Are you sure"),
    ///     Pattern::regex(r"[$#] $")?,
    /// ]).await?;
    ///
    /// match result.pattern_index {
    ///     0 => session.send_line("secret").await?,
    ///     1 => session.send_line("yes").await?,
    ///     _ => {}
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn expect_any(&self, patterns: &[Pattern]) -> Result<MatchResult, ExpectError> {
        self.expect_any_timeout(patterns, self.config.timeout).await
    }

    /// Like [`Session::expect_any`] with an explicit timeout; `None` waits
    /// forever.
    ///
    /// # Errors
    ///
    /// Same as [`Session::expect`], plus [`ExpectError::PatternError`] if
    /// `patterns` is empty.
    pub async fn expect_any_timeout(
        &self,
        patterns: &[Pattern],
        timeout: Option<Duration>,
    ) -> Result<MatchResult, ExpectError> {
        let deadline = Deadline::after(timeout);
        let mut search = Search::new(patterns)?;

        let _turn = self.expecting.lock().await;
        if !self.transition(SessionState::Waiting) {
            return Err(ExpectError::Closed);
        }

        tracing::trace!(session = %self.config.name, pattern = %search.description(), "expecting");
        let outcome = self.wait_for(&mut search, deadline).await;
        self.transition(SessionState::Idle);

        match &outcome {
            Ok(result) => tracing::debug!(
                session = %self.config.name,
                pattern_index = result.pattern_index,
                start = result.start,
                end = result.end,
                "matched"
            ),
            Err(e) => tracing::debug!(session = %self.config.name, error = %e, "expect failed"),
        }
        outcome
    }

    async fn wait_for(
        &self,
        search: &mut Search,
        deadline: Deadline,
    ) -> Result<MatchResult, ExpectError> {
        loop {
            // Register for wakeups before looking, so data that lands in
            // between is not missed.
            let changed = self.shared.changed();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if let Some(outcome) = self.poll_buffer(search) {
                return outcome;
            }

            if deadline.is_expired() {
                return Err(ExpectError::Timeout {
                    duration: deadline.timeout(),
                    pattern: search.description().to_string(),
                });
            }

            match deadline.instant() {
                Some(at) => {
                    let _ = tokio::time::timeout_at(at, changed).await;
                }
                None => changed.await,
            }
        }
    }

    /// One evaluation of `search` against the unconsumed output.
    ///
    /// `None` means keep waiting.
    fn poll_buffer(&self, search: &mut Search) -> Option<Result<MatchResult, ExpectError>> {
        if self.shared.is_cancelled() {
            return Some(Err(ExpectError::Closed));
        }

        let mut buffer = self.shared.lock();
        let snapshot = buffer.snapshot();

        if let Some((pattern_index, m)) = search.poll(snapshot.bytes) {
            let result = MatchResult {
                pattern_index,
                matched: String::from_utf8_lossy(&snapshot.bytes[m.start..m.end]).into_owned(),
                start: snapshot.offset + m.start,
                end: snapshot.offset + m.end,
                before: String::from_utf8_lossy(&snapshot.bytes[..m.start]).into_owned(),
                captures: m.captures,
                named: m.named.into_iter().collect(),
            };
            buffer.advance(m.end);
            return Some(Ok(result));
        }

        match snapshot.status {
            StreamStatus::Open => None,
            StreamStatus::Eof => Some(Err(ExpectError::Eof)),
            StreamStatus::Overflowed => Some(Err(ExpectError::BufferOverflow {
                limit: self.config.max_buffer_size,
            })),
            StreamStatus::Failed { kind, message } => Some(Err(ExpectError::IoError(
                io::Error::new(*kind, message.clone()),
            ))),
        }
    }

    /// Move to `next` unless the session is closed. Returns whether it moved.
    fn transition(&self, next: SessionState) -> bool {
        let mut state = lock(&self.state);
        if *state == SessionState::Closed {
            return false;
        }
        *state = next;
        true
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Send raw bytes to the process.
    ///
    /// Control characters are sent as-is, e.g. `b"\x03"` for Ctrl-C or
    /// `b"\x04"` for Ctrl-D.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::WriteError`] if the process has exited or its
    /// input is closed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let session = Session::spawn("cat")?;
    /// session.send(b"Hello").await?;
    /// session.send(b"\x03").await?; // Ctrl-C
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&self, data: &[u8]) -> Result<(), ExpectError> {
        let process = self.process.clone();
        let data = data.to_vec();
        let len = data.len();

        tokio::task::spawn_blocking(move || process.write(&data))
            .await
            .map_err(|e| ExpectError::IoError(io::Error::other(e)))??;

        tracing::trace!(session = %self.config.name, bytes = len, "sent");
        Ok(())
    }

    /// Send a line to the process, followed by the configured end-of-line
    /// (`"\n"` unless changed with [`SessionBuilder::eol`]).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let session = Session::spawn("python3 -i")?;
    /// session.expect(">>> ").await?;
    /// session.send_line("print('Hello')").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_line(&self, line: &str) -> Result<(), ExpectError> {
        let mut data = Vec::with_capacity(line.len() + self.config.eol.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.config.eol.as_bytes());
        self.send(&data).await
    }

    /// Close the process input. The process reads end-of-file.
    pub fn send_eof(&self) {
        self.process.close_input();
    }

    /// Send a signal to the process and its process group
    pub fn signal(&self, signal: Signal) -> Result<(), ExpectError> {
        self.process.terminate(signal)
    }

    /// Check if the process is still alive.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("sleep 10")?;
    ///
    /// if session.is_alive()? {
    ///     println!("Process is still running");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn is_alive(&self) -> Result<bool, ExpectError> {
        self.process.is_alive()
    }

    /// OS process id of the child
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Output received but not yet consumed by a match (lossy UTF-8)
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(self.shared.lock().unconsumed()).into_owned()
    }

    /// Number of output bytes consumed by matches so far
    pub fn consumed(&self) -> usize {
        self.shared.lock().consumed()
    }

    /// Whether the process output has ended (for any reason)
    pub fn is_eof(&self) -> bool {
        self.shared.lock().status().is_closed()
    }

    /// Change the terminal size seen by the process
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ExpectError> {
        self.process.resize(rows, cols)
    }

    /// Wait for the process to exit and return its exit status.
    ///
    /// The status can be taken once. Works after [`Session::close`] too, in
    /// which case it returns how the process ended.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::AlreadyReaped`] if the status was already taken.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("echo done")?;
    /// session.expect("done").await?;
    ///
    /// let status = session.wait().await?;
    /// println!("Process exited with: {}", status.exit_code());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait(&self) -> Result<ExitStatus, ExpectError> {
        let process = self.process.clone();
        tokio::task::spawn_blocking(move || process.wait())
            .await
            .map_err(|e| ExpectError::IoError(io::Error::other(e)))?
    }

    /// Terminate the session.
    ///
    /// Any `expect` in progress returns [`ExpectError::Closed`]. A running
    /// process gets SIGHUP, then the close grace period to exit, then
    /// SIGKILL, and is reaped. The reader thread is stopped.
    ///
    /// Calling it again, or after the process already exited, is fine.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::spawn("bash")?;
    /// session.close().await?;
    /// session.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn close(&self) -> Result<(), ExpectError> {
        let Some(shutdown) = self.begin_close() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || shutdown.run())
            .await
            .map_err(|e| ExpectError::IoError(io::Error::other(e)))?
    }

    /// Flip to `Closed` and wake every waiter. `None` if already closed.
    fn begin_close(&self) -> Option<Shutdown> {
        {
            let mut state = lock(&self.state);
            if *state == SessionState::Closed {
                return None;
            }
            *state = SessionState::Closed;
        }

        tracing::debug!(session = %self.config.name, pid = ?self.process.pid(), "closing");
        self.shared.cancel();

        let reader = lock(&self.reader).take();
        if let Some(reader) = &reader {
            reader.request_stop();
        }

        Some(Shutdown {
            name: self.config.name.clone(),
            process: self.process.clone(),
            reader,
            grace: self.config.close_grace,
        })
    }
}

/// Blocking half of `close()`, shared with `Drop`
struct Shutdown {
    name: String,
    process: Arc<ProcessHandle>,
    reader: Option<StreamReader>,
    grace: Duration,
}

impl Shutdown {
    fn run(mut self) -> Result<(), ExpectError> {
        let reaped = self.process.reap(self.grace);
        match &reaped {
            Ok(status) => tracing::debug!(session = %self.name, ?status, "process reaped"),
            Err(e) => tracing::warn!(session = %self.name, error = %e, "failed to reap process"),
        }

        if let Some(reader) = self.reader.take() {
            // Output still open after the child is gone: background processes
            // it started hold the terminal. They share its process group.
            if !reader.wait(OUTPUT_DRAIN_TIMEOUT) {
                tracing::debug!(session = %self.name, "terminal still open, clearing process group");
                self.signal_group(Signal::Hangup);
                if !reader.wait(self.grace) {
                    self.signal_group(Signal::Kill);
                }
            }

            if !reader.join(READER_JOIN_TIMEOUT) {
                tracing::warn!(session = %self.name, "reader thread still running, detaching");
            }
        }

        reaped.map(|_| ())
    }

    fn signal_group(&self, signal: Signal) {
        if let Err(e) = self.process.signal_group(signal) {
            tracing::warn!(session = %self.name, %signal, error = %e, "failed to signal process group");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(shutdown) = self.begin_close() {
            if let Err(e) = shutdown.run() {
                tracing::warn!(session = %self.config.name, error = %e, "close on drop failed");
            }
        }
    }
}
