//! ExpectRust: Process automation library for Rust
//!
//! ExpectRust automates interactive programs in the style of the Unix
//! `expect` utility. A program runs on a pseudo-terminal; you send it input
//! and wait for patterns to appear in its output, with a deadline on every
//! wait.
//!
//! # Features
//!
//! - **Async/await**: Built on tokio; output is collected in the background
//!   from the moment the process starts
//! - **Pattern matching**: Literal strings (Boyer-Moore-Horspool), regular
//!   expressions with named captures, and regexes anchored at the read position
//! - **Chunk-safe**: Matches that straddle separate reads are found
//! - **Nothing lost**: Output is only discarded by a match; a timeout leaves
//!   it in place for the next `expect`
//! - **Bounded memory**: A hard limit on unconsumed output, reported as an error
//! - **Clean shutdown**: `close()` hangs up, kills if needed, and reaps the
//!   process group
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use expectrust::Session;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Spawn a process
//!     let session = Session::builder()
//!         .timeout(Duration::from_secs(30))
//!         .spawn("python3 -i")?;
//!
//!     // Wait for the Python prompt
//!     session.expect(">>> ").await?;
//!
//!     // Send a command
//!     session.send_line("print('Hello, World!')").await?;
//!
//!     // Wait for output
//!     let result = session.expect(">>> ").await?;
//!     println!("Output: {}", result.before);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Pattern Matching
//!
//! ```rust,no_run
//! use expectrust::{ExpectError, Pattern, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let session = Session::spawn("echo test")?;
//! // Literal string
//! session.expect("password: ").await?;
//!
//! // Regex with captures
//! let result = session.expect(Pattern::regex(r"(?P<count>\d+) files")?).await?;
//! println!("{:?}", result.name("count"));
//!
//! // Multiple patterns: the earliest match in the output wins
//! let patterns = [Pattern::literal("success"), Pattern::literal("error")];
//! match session.expect_any(&patterns).await {
//!     Ok(result) if result.pattern_index == 0 => println!("Success!"),
//!     Ok(_) => println!("Error occurred"),
//!     Err(ExpectError::Eof) => println!("Process ended"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Sending Control Characters
//!
//! ```rust,no_run
//! use expectrust::Session;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let session = Session::spawn("bash")?;
//! // Send Ctrl-C (interrupt)
//! session.send(&[0x03]).await?;
//!
//! // Send text with carriage return
//! session.send(b"password\r").await?;
//!
//! // Send arrow keys
//! session.send(b"\x1b[A").await?; // Up arrow
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The library emits [`tracing`](https://docs.rs/tracing) events and never
//! installs a subscriber. Each event carries the session name.

#![warn(missing_docs)]

pub mod buffer;
pub mod process;

mod pattern;
mod reader;
mod result;
mod session;

// Re-export main types
pub use pattern::{Match, Matcher, Pattern};
pub use process::{Command, ProcessHandle, Signal};
pub use reader::Transcript;
pub use result::{ExpectError, MatchResult, PatternError};
pub use session::{Session, SessionBuilder, SessionState};

// Re-export from portable_pty for convenience
pub use portable_pty::ExitStatus;
