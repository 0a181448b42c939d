//! Buffer shared between the reader thread and the session

use super::{Buffer, StreamStatus};
use crate::result::ExpectError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// [`Buffer`] behind a mutex, plus a signal fired whenever it changes.
///
/// The reader thread is the only appender; the session is the only consumer.
/// Waiters must create and `enable` a [`Notified`] before inspecting the
/// buffer, otherwise a change landing between the inspection and the wait
/// would be missed.
#[derive(Debug)]
pub(crate) struct SharedBuffer {
    inner: Mutex<Buffer>,
    changed: Notify,
    cancelled: AtomicBool,
}

impl SharedBuffer {
    pub(crate) fn new(buffer: Buffer) -> Self {
        Self {
            inner: Mutex::new(buffer),
            changed: Notify::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Lock the buffer. A panic on the other side never poisons the output.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk and wake waiters.
    pub(crate) fn append(&self, data: &[u8]) -> Result<(), ExpectError> {
        let result = self.lock().append(data);
        self.changed.notify_waiters();
        result
    }

    /// Record a terminal stream status and wake waiters.
    pub(crate) fn finish(&self, status: StreamStatus) {
        self.lock().close(status);
        self.changed.notify_waiters();
    }

    /// Abort all current and future waits; used when the session closes.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Future resolving on the next change.
    pub(crate) fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }
}
