//! Signals understood by [`ProcessHandle::terminate`](super::ProcessHandle::terminate)

use std::fmt;

/// Termination request sent to the child.
///
/// On non-unix platforms every signal is delivered as a forced kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGHUP: the terminal went away. Interactive shells exit on this.
    Hangup,
    /// SIGINT, as sent by Ctrl-C.
    Interrupt,
    /// SIGTERM: polite termination request.
    Terminate,
    /// SIGKILL: cannot be caught or ignored.
    Kill,
}

impl Signal {
    /// Raw signal number
    #[cfg(unix)]
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Hangup => libc::SIGHUP,
            Signal::Interrupt => libc::SIGINT,
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Hangup => "SIGHUP",
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
        };
        f.write_str(name)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_raw_numbers() {
        assert_eq!(Signal::Hangup.as_raw(), libc::SIGHUP);
        assert_eq!(Signal::Kill.as_raw(), libc::SIGKILL);
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
    }
}
