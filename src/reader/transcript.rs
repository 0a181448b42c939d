//! Mirror of process output to a caller-supplied sink

use std::fmt;
use std::io::{self, Write};

/// Copies everything the process prints to a writer, prefixing every line.
///
/// Useful to keep a readable log of several sessions side by side:
///
/// ```no_run
/// use expectrust::{Session, Transcript};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .transcript(Transcript::new(std::io::stderr(), "terminal1| "))
///     .spawn("bash --noediting")?;
/// # Ok(())
/// # }
/// ```
pub struct Transcript {
    sink: Box<dyn Write + Send>,
    prefix: String,
    at_line_start: bool,
}

impl Transcript {
    /// Transcript writing to `sink` with `prefix` at the start of every line
    pub fn new(sink: impl Write + Send + 'static, prefix: impl Into<String>) -> Self {
        Self {
            sink: Box::new(sink),
            prefix: prefix.into(),
            at_line_start: true,
        }
    }

    /// Record one chunk of output and flush the sink
    pub fn record(&mut self, data: &[u8]) -> io::Result<()> {
        for line in data.split_inclusive(|&b| b == b'\n') {
            if self.at_line_start {
                self.sink.write_all(self.prefix.as_bytes())?;
            }
            self.sink.write_all(line)?;
            self.at_line_start = line.ends_with(b"\n");
        }
        self.sink.flush()
    }

    /// Terminate a dangling last line
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.at_line_start {
            self.sink.write_all(b"\n")?;
            self.at_line_start = true;
        }
        self.sink.flush()
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
