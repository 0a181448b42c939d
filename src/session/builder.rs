//! Session builder for configuration

use crate::buffer::{Buffer, SharedBuffer};
use crate::process::{Command, ProcessHandle};
use crate::reader::{ReaderOptions, StreamReader, Transcript};
use crate::result::ExpectError;
use crate::session::{Session, SessionConfig, SessionState};
use portable_pty::PtySize;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default timeout for expect operations (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default limit on unconsumed output (in bytes)
const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// Default size of a single read from the PTY
const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default line terminator for `send_line`
const DEFAULT_EOL: &str = "\n";

/// Default time a process gets to exit on close before it is killed
const DEFAULT_CLOSE_GRACE_MS: u64 = 500;

/// Builder for configuring and spawning sessions.
///
/// Provides a fluent interface for configuring session options before spawning a process.
///
/// # Defaults
///
/// - Timeout: 30 seconds
/// - Max buffer size: 1 MiB of unconsumed output
/// - ANSI stripping: disabled
/// - PTY size: 24 rows × 80 columns
/// - Read chunk size: 4096 bytes
/// - End of line: `"\n"`
/// - Close grace period: 500 ms
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
///     .strip_ansi(true)
///     .pty_size(40, 120)
///     .env("TERM", "dumb")
///     .spawn("python3 -i")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionBuilder {
    name: Option<String>,
    timeout: Option<Duration>,
    max_buffer_size: usize,
    strip_ansi: bool,
    pty_size: PtySize,
    read_chunk_size: usize,
    eol: String,
    close_grace: Duration,
    transcript: Option<Transcript>,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    env_remove: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    ///
    /// See the [`SessionBuilder`] documentation for default values.
    pub fn new() -> Self {
        Self {
            name: None,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            strip_ansi: false,
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            eol: DEFAULT_EOL.to_string(),
            close_grace: Duration::from_millis(DEFAULT_CLOSE_GRACE_MS),
            transcript: None,
            args: Vec::new(),
            env: Vec::new(),
            env_remove: Vec::new(),
            cwd: None,
        }
    }

    /// Name the session in log records. Defaults to the program name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the default timeout for expect operations.
    ///
    /// If a pattern is not matched within this duration, `expect()` returns
    /// [`ExpectError::Timeout`]. Individual calls can override it with
    /// [`Session::expect_timeout`].
    ///
    /// # Arguments
    ///
    /// * `timeout` - The duration to wait before timing out
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
    ///     .spawn("python3 -i")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the default timeout (wait indefinitely).
    ///
    /// `expect()` then waits until the pattern matches or the output ends.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the limit on output that has not been consumed by a match.
    ///
    /// Output is never discarded silently. Once the limit is reached the
    /// session stops reading and pending and later `expect` calls fail with
    /// [`ExpectError::BufferOverflow`].
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum unconsumed bytes (default: 1 MiB)
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Enable or disable ANSI escape sequence stripping.
    ///
    /// When enabled, ANSI escape sequences (colors, cursor movements, etc.) are
    /// removed from the output before pattern matching.
    ///
    /// # Arguments
    ///
    /// * `strip` - `true` to strip ANSI sequences, `false` to keep them (default: `false`)
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Set PTY (terminal) size.
    ///
    /// This affects how the spawned process sees the terminal dimensions.
    ///
    /// # Arguments
    ///
    /// * `rows` - Number of rows (default: 24)
    /// * `cols` - Number of columns (default: 80)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .pty_size(40, 120)  // Larger terminal
    ///     .spawn("vi")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// Largest number of bytes taken from the PTY in one read (default: 4096)
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Line terminator appended by `send_line` (default: `"\n"`)
    pub fn eol(mut self, eol: impl Into<String>) -> Self {
        self.eol = eol.into();
        self
    }

    /// Time a running process gets to exit after SIGHUP on close, before it
    /// is killed (default: 500 ms)
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Mirror all process output to a [`Transcript`]
    pub fn transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Append an argument after those in the command string
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Append several arguments after those in the command string
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    /// Set an environment variable for the process
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Remove an inherited environment variable
    pub fn env_remove(mut self, key: impl AsRef<OsStr>) -> Self {
        self.env_remove.push(key.as_ref().to_owned());
        self
    }

    /// Working directory of the process
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Spawn a command and return a configured session.
    ///
    /// The command string is split on whitespace into the program and its
    /// first arguments; there is no shell quoting. Use [`SessionBuilder::arg`]
    /// or [`SessionBuilder::spawn_args`] for arguments containing spaces.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to spawn (e.g., "python3 -i", "ssh user@host")
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The command string is empty
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    /// use std::time::Duration;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .spawn("python3 -i")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(self, command: &str) -> Result<Session, ExpectError> {
        let command = Command::parse(command)?;
        self.spawn_command(command)
    }

    /// Spawn `program` with exactly the given arguments.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use expectrust::Session;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .spawn_args("sh", ["-c", "printf 'ready> '; cat"])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn_args<I, S>(self, program: impl AsRef<OsStr>, args: I) -> Result<Session, ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args);
        self.spawn_command(command)
    }

    /// Spawn a prepared [`Command`]. Arguments, environment and working
    /// directory set on the builder are applied on top of it.
    pub fn spawn_command(self, mut command: Command) -> Result<Session, ExpectError> {
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        for key in &self.env_remove {
            command.env_remove(key);
        }
        if let Some(dir) = &self.cwd {
            command.cwd(dir);
        }

        let name = self
            .name
            .unwrap_or_else(|| command.program().to_string_lossy().into_owned());

        let process = Arc::new(ProcessHandle::spawn(&command, self.pty_size)?);
        let shared = Arc::new(SharedBuffer::new(Buffer::new(
            self.max_buffer_size,
            self.strip_ansi,
        )));

        let output = process
            .take_output()
            .ok_or_else(|| ExpectError::PtyError("output stream already taken".to_string()))?;

        let reader = StreamReader::start(
            output,
            shared.clone(),
            ReaderOptions {
                name: name.clone(),
                chunk_size: self.read_chunk_size,
                transcript: self.transcript,
            },
        );
        let reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                let _ = process.reap(Duration::ZERO);
                return Err(e);
            }
        };

        tracing::debug!(session = %name, pid = ?process.pid(), "session started");

        Ok(Session {
            process,
            shared,
            reader: Mutex::new(Some(reader)),
            expecting: tokio::sync::Mutex::new(()),
            state: Mutex::new(SessionState::Idle),
            config: SessionConfig {
                name,
                timeout: self.timeout,
                eol: self.eol,
                close_grace: self.close_grace,
                max_buffer_size: self.max_buffer_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.timeout, Some(Duration::from_secs(30)));
        assert_eq!(builder.max_buffer_size, 1024 * 1024);
        assert_eq!(builder.pty_size.rows, 24);
        assert_eq!(builder.pty_size.cols, 80);
        assert_eq!(builder.read_chunk_size, 4096);
        assert_eq!(builder.eol, "\n");
        assert_eq!(builder.close_grace, Duration::from_millis(500));
        assert!(!builder.strip_ansi);
    }

    #[test]
    fn test_fluent_options() {
        let builder = SessionBuilder::new()
            .no_timeout()
            .eol("\r\n")
            .read_chunk_size(0)
            .arg("-x")
            .args(["a", "b"])
            .env("K", "V")
            .env_remove("HOME");
        assert_eq!(builder.timeout, None);
        assert_eq!(builder.eol, "\r\n");
        assert_eq!(builder.read_chunk_size, 1);
        assert_eq!(builder.args, ["-x", "a", "b"]);
        assert_eq!(builder.env, [(OsString::from("K"), OsString::from("V"))]);
        assert_eq!(builder.env_remove, ["HOME"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = SessionBuilder::new().spawn("   ").unwrap_err();
        assert!(matches!(err, ExpectError::SpawnError(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_name_defaults_to_program() {
        let session = SessionBuilder::new().spawn("sleep 5").expect("Failed to spawn");
        assert_eq!(session.name(), "sleep");
        session.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_builder_args_env_cwd_applied() {
        let session = SessionBuilder::new()
            .timeout(Duration::from_secs(5))
            .env("EXPECTRUST_GREETING", "hi")
            .cwd("/")
            .spawn_args("sh", ["-c", "printf '%s:%s:' \"$EXPECTRUST_GREETING\" \"$(pwd)\""])
            .expect("Failed to spawn");

        let result = session.expect("/:").await.unwrap();
        assert_eq!(result.before, "hi:");
    }
}
