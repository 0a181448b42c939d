//! Spawned child process on a pseudo-terminal

mod command;
mod signal;
mod stream;

pub use command::Command;
pub use signal::Signal;
pub use stream::{Chunk, OutputStream};

use crate::result::ExpectError;
use portable_pty::{native_pty_system, Child, ChildKiller, ExitStatus, MasterPty, PtySize};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How often blocking waits poll the child for an exit status
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the child to disappear after SIGKILL
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

struct ChildState {
    child: Box<dyn Child + Send + Sync>,
    status: Option<ExitStatus>,
    consumed: bool,
}

impl ChildState {
    fn poll(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status.clone())
    }
}

/// A child process attached to a PTY.
///
/// Owns the child, the write side of the PTY master (the child's input) and,
/// until [`ProcessHandle::take_output`] is called, the read side (the child's
/// output). All methods take `&self` so one handle can be shared between the
/// session and the blocking threads that write to and wait on the child.
///
/// Dropping the handle does not kill the child; [`Session`](crate::Session)
/// takes care of that on close.
pub struct ProcessHandle {
    pid: Option<u32>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    input: Mutex<Option<Box<dyn Write + Send>>>,
    output: Mutex<Option<OutputStream>>,
    child: Mutex<ChildState>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProcessHandle {
    /// Spawn `command` on a new PTY of the given size.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::PtyError`] if the PTY cannot be allocated
    /// - [`ExpectError::SpawnError`] if the program cannot be found or the OS
    ///   refuses to start it
    pub fn spawn(command: &Command, size: PtySize) -> Result<Self, ExpectError> {
        let pty_system = native_pty_system();

        let pty_pair = pty_system
            .openpty(size)
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let child = pty_pair
            .slave
            .spawn_command(command.to_builder())
            .map_err(|e| ExpectError::SpawnError(e.to_string()))?;

        // The child holds its own copy of the slave. Ours must go, otherwise
        // the master never reports end-of-stream after the child exits.
        drop(pty_pair.slave);

        let reader = pty_pair
            .master
            .try_clone_reader()
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let writer = pty_pair
            .master
            .take_writer()
            .map_err(|e| ExpectError::PtyError(e.to_string()))?;

        let pid = child.process_id();
        let killer = child.clone_killer();

        tracing::debug!(
            program = ?command.program(),
            args = ?command.get_args(),
            pid = ?pid,
            "spawned process"
        );

        Ok(Self {
            pid,
            master: Mutex::new(pty_pair.master),
            input: Mutex::new(Some(writer)),
            output: Mutex::new(Some(OutputStream::new(reader))),
            child: Mutex::new(ChildState {
                child,
                status: None,
                consumed: false,
            }),
            killer: Mutex::new(killer),
        })
    }

    /// OS process id of the child, if the platform exposes one
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the output stream. Returns `None` after the first call.
    pub fn take_output(&self) -> Option<OutputStream> {
        lock(&self.output).take()
    }

    /// Write all of `data` to the child's input and flush.
    ///
    /// May block while the PTY input queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::WriteError`] if the child has exited, the input
    /// was closed, or the write itself fails. Data is never dropped silently.
    pub fn write(&self, data: &[u8]) -> Result<(), ExpectError> {
        if !self.is_alive()? {
            return Err(ExpectError::WriteError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "process has exited",
            )));
        }

        let mut input = lock(&self.input);
        let writer = input.as_mut().ok_or_else(|| {
            ExpectError::WriteError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "input stream is closed",
            ))
        })?;

        writer
            .write_all(data)
            .and_then(|()| writer.flush())
            .map_err(ExpectError::WriteError)
    }

    /// Close the child's input.
    ///
    /// On unix the PTY delivers end-of-file (a newline followed by the
    /// terminal's EOF character) to the child. Later writes fail.
    pub fn close_input(&self) {
        lock(&self.input).take();
    }

    /// Non-blocking check for exit. Records the status the first time it is
    /// observed.
    pub fn try_wait(&self) -> Result<Option<ExitStatus>, ExpectError> {
        Ok(lock(&self.child).poll()?)
    }

    /// Whether the child is still running
    pub fn is_alive(&self) -> Result<bool, ExpectError> {
        Ok(self.try_wait()?.is_none())
    }

    /// Block until the child exits and return its status.
    ///
    /// The status can be taken once; a second call fails.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::AlreadyReaped`] if the status was already taken
    /// by an earlier call.
    pub fn wait(&self) -> Result<ExitStatus, ExpectError> {
        loop {
            {
                let mut state = lock(&self.child);
                if state.consumed {
                    return Err(ExpectError::AlreadyReaped);
                }
                if let Some(status) = state.poll()? {
                    state.consumed = true;
                    return Ok(status);
                }
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Send `signal` to the child and its process group.
    ///
    /// Does nothing once the child has exited, so it is safe to call at any
    /// time.
    pub fn terminate(&self, signal: Signal) -> Result<(), ExpectError> {
        // Holding the lock keeps the pid from being reaped, and so reused,
        // while the signal is in flight.
        let mut state = lock(&self.child);
        if state.poll()?.is_some() {
            return Ok(());
        }

        tracing::debug!(pid = ?self.pid, %signal, "signalling process");

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            return kill_process_group(pid, signal);
        }

        drop(state);
        match lock(&self.killer).kill() {
            Ok(()) => Ok(()),
            Err(_) if !self.is_alive()? => Ok(()),
            Err(e) => Err(ExpectError::IoError(e)),
        }
    }

    /// Send `signal` to whatever is left of the child's process group.
    ///
    /// Unlike [`ProcessHandle::terminate`] this also works after the child
    /// itself has exited, to reach background processes it left behind. The
    /// caller must know the group still exists (e.g. because the PTY is still
    /// open), since the group id is the child's pid. A missing group is not an
    /// error. Does nothing on platforms without process groups.
    pub fn signal_group(&self, signal: Signal) -> Result<(), ExpectError> {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            tracing::debug!(pgid = pid, %signal, "signalling process group");
            // SAFETY: kill(2) has no memory-safety preconditions.
            if unsafe { libc::kill(-(pid as libc::pid_t), signal.as_raw()) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(ExpectError::IoError(err));
            }
        }

        #[cfg(not(unix))]
        let _ = signal;

        Ok(())
    }

    /// Forcefully kill the child. Idempotent.
    pub fn kill(&self) -> Result<(), ExpectError> {
        self.terminate(Signal::Kill)
    }

    /// Make sure the child is gone and reaped.
    ///
    /// A running child gets SIGHUP, then `grace` to exit, then SIGKILL. The
    /// status is recorded but not consumed, so [`ProcessHandle::wait`] still
    /// returns it once.
    pub fn reap(&self, grace: Duration) -> Result<ExitStatus, ExpectError> {
        if let Some(status) = self.try_wait()? {
            return Ok(status);
        }

        self.terminate(Signal::Hangup)?;
        if let Some(status) = self.wait_until(Instant::now() + grace)? {
            return Ok(status);
        }

        tracing::debug!(pid = ?self.pid, "process ignored hangup, killing");
        self.kill()?;
        self.wait_until(Instant::now() + KILL_REAP_TIMEOUT)?
            .ok_or_else(|| {
                ExpectError::IoError(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "process did not exit after SIGKILL",
                ))
            })
    }

    fn wait_until(&self, deadline: Instant) -> Result<Option<ExitStatus>, ExpectError> {
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Change the terminal size seen by the child
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ExpectError> {
        lock(&self.master)
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ExpectError::PtyError(e.to_string()))
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32, signal: Signal) -> Result<(), ExpectError> {
    let pid = pid as libc::pid_t;

    // The child is a session leader, so its pid is also its process group.
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(-pid, signal.as_raw()) } == 0 {
        return Ok(());
    }
    // SAFETY: as above.
    if unsafe { libc::kill(pid, signal.as_raw()) } == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(ExpectError::IoError(err))
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
