//! Raw output stream of a spawned process

use std::fmt;
use std::io::{self, Read};

/// Result of one blocking read
#[derive(Debug, PartialEq, Eq)]
pub enum Chunk<'a> {
    /// Bytes read, never empty
    Data(&'a [u8]),
    /// The process closed its output
    Eof,
}

/// Read side of the PTY master, handed out once per process.
pub struct OutputStream {
    reader: Box<dyn Read + Send>,
    scratch: Vec<u8>,
}

impl OutputStream {
    pub(crate) fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            scratch: Vec::new(),
        }
    }

    /// Blocking read of up to `max` bytes.
    ///
    /// End of output is reported as [`Chunk::Eof`], not as an error.
    /// Interrupted reads are retried.
    pub fn read_chunk(&mut self, max: usize) -> io::Result<Chunk<'_>> {
        if self.scratch.len() < max {
            self.scratch.resize(max, 0);
        }

        let n = loop {
            match self.reader.read(&mut self.scratch[..max]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        if n == 0 {
            Ok(Chunk::Eof)
        } else {
            Ok(Chunk::Data(&self.scratch[..n]))
        }
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}
