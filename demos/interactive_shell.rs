//! Driving a shell line by line: custom prompt, carriage-return line endings
//! and a transcript of everything the shell printed.
//!
//! Run with `RUST_LOG=expectrust=debug` to see session events as well.

use expectrust::{ExpectError, Pattern, Session, Transcript};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "demo$ ";

/// Outcome of one command: its output, or the shell's complaint about it
enum Reply {
    Output(String),
    Failed(String),
}

async fn run(session: &Session, line: &str) -> Result<Reply, ExpectError> {
    let replies = [
        Pattern::literal(PROMPT),
        Pattern::regex(r"(?m)^.*: (?:not found|No such file or directory)\r?$")?,
    ];

    session.send_line(line).await?;
    let hit = session.expect_any(&replies).await?;
    if hit.pattern_index == 1 {
        let complaint = hit.matched.trim().to_string();
        session.expect(PROMPT).await?;
        return Ok(Reply::Failed(complaint));
    }

    // The terminal echoes the command back before its output.
    let output = hit
        .before
        .split_once('\n')
        .map_or("", |(_, rest)| rest)
        .trim_end()
        .to_string();
    Ok(Reply::Output(output))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let session = Session::builder()
        .name("sh")
        .timeout(Duration::from_secs(5))
        .eol("\r")
        .env("PS1", PROMPT)
        .env_remove("ENV")
        .transcript(Transcript::new(std::io::stderr(), "sh| "))
        .spawn_args("sh", ["-i"])?;

    session.expect(PROMPT).await?;

    for line in ["echo $((6 * 7))", "uname -s", "no-such-command-here", "cat /nonexistent"] {
        match run(&session, line).await? {
            Reply::Output(text) => println!("{line:<24} => {text}"),
            Reply::Failed(why) => println!("{line:<24} !! {why}"),
        }
    }

    // Output that never ends in a prompt stays pending after a timeout.
    session.send_line("printf 'half a line'; sleep 1").await?;
    if let Err(e) = session.expect_timeout("never", Some(Duration::from_millis(300))).await {
        println!("waiting gave up ({e}); still unread: {:?}", session.pending());
    }
    session.expect(PROMPT).await?;

    // Closing input sends end-of-file, which ends an interactive shell.
    session.send_eof();
    let status = session.wait().await?;
    println!("shell exited with code {}", status.exit_code());

    session.close().await?;
    Ok(())
}
