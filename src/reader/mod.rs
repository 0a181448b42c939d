//! Background reader draining process output into the shared buffer

mod transcript;

pub use transcript::Transcript;

use crate::buffer::{SharedBuffer, StreamStatus};
use crate::process::{Chunk, OutputStream};
use crate::result::ExpectError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Poll interval while waiting for the reader thread to finish
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Settings for a reader thread
#[derive(Debug)]
pub(crate) struct ReaderOptions {
    pub(crate) name: String,
    pub(crate) chunk_size: usize,
    pub(crate) transcript: Option<Transcript>,
}

/// Dedicated thread moving bytes from the PTY into a [`SharedBuffer`].
///
/// Reads block in the OS, so they live on their own thread instead of the
/// async runtime. The thread exits on end-of-stream, on a read error, when
/// the buffer refuses more data, or after a stop request once the current
/// read returns. In every case the buffer is left with a terminal status and
/// all waiters are woken.
#[derive(Debug)]
pub(crate) struct StreamReader {
    thread: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl StreamReader {
    pub(crate) fn start(
        output: OutputStream,
        shared: Arc<SharedBuffer>,
        options: ReaderOptions,
    ) -> Result<Self, ExpectError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let thread = std::thread::Builder::new()
            .name(format!("expectrust-reader-{}", options.name))
            .spawn(move || run(output, &shared, &thread_stop, options))?;

        Ok(Self { thread, stop })
    }

    /// Ask the thread to exit after its current read.
    ///
    /// The read itself is not interrupted; killing the process is what makes
    /// it return.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait up to `timeout` for the thread to exit. Returns whether it did.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.thread.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
        true
    }

    /// Like [`StreamReader::wait`], then reap the thread. If it is still
    /// running after `timeout` it is left detached.
    pub(crate) fn join(self, timeout: Duration) -> bool {
        if !self.wait(timeout) {
            return false;
        }

        if self.thread.join().is_err() {
            tracing::warn!("reader thread panicked");
        }
        true
    }
}

fn run(
    mut output: OutputStream,
    shared: &SharedBuffer,
    stop: &AtomicBool,
    options: ReaderOptions,
) {
    let ReaderOptions {
        name,
        chunk_size,
        mut transcript,
    } = options;

    let status = loop {
        match output.read_chunk(chunk_size) {
            Ok(Chunk::Data(data)) => {
                tracing::trace!(session = %name, bytes = data.len(), "read chunk");

                if let Some(mut sink) = transcript.take() {
                    match sink.record(data) {
                        Ok(()) => transcript = Some(sink),
                        Err(e) => {
                            tracing::warn!(session = %name, error = %e, "transcript disabled")
                        }
                    }
                }

                if let Err(e) = shared.append(data) {
                    tracing::warn!(session = %name, error = %e, "output rejected, reader stopping");
                    break StreamStatus::Overflowed;
                }
            }
            Ok(Chunk::Eof) => break StreamStatus::Eof,
            // Errors caused by tearing the PTY down are not worth reporting.
            Err(_) if stop.load(Ordering::SeqCst) => break StreamStatus::Eof,
            Err(e) => {
                tracing::debug!(session = %name, error = %e, "read failed");
                break StreamStatus::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                };
            }
        }

        if stop.load(Ordering::SeqCst) {
            break StreamStatus::Eof;
        }
    };

    if let Some(mut sink) = transcript {
        if let Err(e) = sink.finish() {
            tracing::warn!(session = %name, error = %e, "transcript not finished");
        }
    }

    tracing::debug!(session = %name, ?status, "reader finished");
    shared.finish(status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use std::io::{self, Read};

    struct Scripted {
        chunks: Vec<io::Result<Vec<u8>>>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0)?;
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    fn start(chunks: Vec<io::Result<Vec<u8>>>, max: usize) -> Arc<SharedBuffer> {
        start_with_transcript(chunks, max, None)
    }

    fn start_with_transcript(
        chunks: Vec<io::Result<Vec<u8>>>,
        max: usize,
        transcript: Option<Transcript>,
    ) -> Arc<SharedBuffer> {
        let shared = Arc::new(SharedBuffer::new(Buffer::new(max, false)));
        let output = OutputStream::new(Box::new(Scripted { chunks }));
        let reader = StreamReader::start(
            output,
            shared.clone(),
            ReaderOptions {
                name: "test".into(),
                chunk_size: 64,
                transcript,
            },
        )
        .unwrap();
        assert!(reader.join(Duration::from_secs(5)));
        shared
    }

    #[test]
    fn test_chunks_appended_in_order_then_eof() {
        let shared = start(vec![Ok(b"hel".to_vec()), Ok(b"lo world".to_vec())], 1024);
        let buffer = shared.lock();
        assert_eq!(buffer.unconsumed(), b"hello world");
        assert_eq!(buffer.status(), &StreamStatus::Eof);
    }

    #[test]
    fn test_read_error_recorded() {
        let shared = start(
            vec![
                Ok(b"partial".to_vec()),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone")),
            ],
            1024,
        );
        let buffer = shared.lock();
        assert_eq!(buffer.unconsumed(), b"partial");
        assert!(matches!(
            buffer.status(),
            StreamStatus::Failed { kind: io::ErrorKind::ConnectionReset, .. }
        ));
    }

    /// Accepts writes, fails every flush after the first.
    struct FlushOnce {
        flushed: bool,
    }

    impl io::Write for FlushOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if std::mem::replace(&mut self.flushed, true) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_transcript_finish_error_does_not_stop_reader() {
        let transcript = Transcript::new(FlushOnce { flushed: false }, "> ");
        let shared = start_with_transcript(vec![Ok(b"no newline".to_vec())], 1024, Some(transcript));

        let buffer = shared.lock();
        assert_eq!(buffer.unconsumed(), b"no newline");
        assert_eq!(buffer.status(), &StreamStatus::Eof);
    }

    #[test]
    fn test_overflow_stops_reader() {
        let shared = start(vec![Ok(b"1234".to_vec()), Ok(b"5678".to_vec())], 6);
        let buffer = shared.lock();
        assert_eq!(buffer.unconsumed(), b"1234");
        assert_eq!(buffer.status(), &StreamStatus::Overflowed);
    }
}
