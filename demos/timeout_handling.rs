//! Timeout handling example
//!
//! Run with `RUST_LOG=expectrust=debug` to see the session lifecycle.

use expectrust::{ExpectError, Pattern, Session};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("ExpectRust - Timeout Handling Example");
    println!("{}", "=".repeat(50));

    // Example 1: Successful match within timeout
    println!("\n1. Match within timeout");
    let session = Session::builder()
        .timeout(Duration::from_secs(2))
        .spawn("echo Quick response")?;

    match session.expect("Quick").await {
        Ok(result) => println!("   ✓ Matched: '{}'", result.matched),
        Err(e) => println!("   ✗ Error: {}", e),
    }

    // Example 2: Timeout while waiting for pattern
    println!("\n2. Timeout waiting for pattern");
    let session = Session::builder()
        .timeout(Duration::from_millis(500))
        .spawn_args("sh", ["-c", "printf 'working...'; sleep 2"])?;

    match session.expect("NEVER_APPEARS").await {
        Ok(_) => println!("   ✗ Unexpectedly matched"),
        Err(ExpectError::Timeout { duration, pattern }) => {
            println!("   ✓ Timed out after {:?} waiting for {}", duration, pattern)
        }
        Err(e) => println!("   ✗ Unexpected error: {}", e),
    }

    // The output is still there after a timeout
    println!("   Still pending: {:?}", session.pending());
    let result = session.expect(Pattern::regex(r"work\w+")?).await?;
    println!("   ✓ Matched afterwards: '{}'", result.matched);

    // Example 3: Per-call timeout overriding the session default
    println!("\n3. Per-call timeout");
    let session = Session::builder()
        .no_timeout()
        .spawn_args("sh", ["-c", "sleep 1; printf 'slow answer'"])?;

    match session
        .expect_timeout("answer", Some(Duration::from_millis(200)))
        .await
    {
        Err(e) if e.is_timeout() => println!("   ✓ Short wait timed out"),
        other => println!("   ✗ Unexpected: {:?}", other),
    }

    let result = session
        .expect_timeout("answer", Some(Duration::from_secs(5)))
        .await?;
    println!("   ✓ Longer wait matched, before = {:?}", result.before);

    // Example 4: End of output
    println!("\n4. Process exits before the pattern shows up");
    let session = Session::spawn("echo bye")?;
    match session.expect("hello").await {
        Err(ExpectError::Eof) => println!("   ✓ EOF reported"),
        other => println!("   ✗ Unexpected: {:?}", other),
    }
    println!("   Exit status: {:?}", session.wait().await?);

    println!("\n✓ All timeout handling examples complete!");

    Ok(())
}
