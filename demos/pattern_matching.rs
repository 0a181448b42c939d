//! Pattern matching example demonstrating different pattern types

use expectrust::{Pattern, Session};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("ExpectRust - Pattern Matching Example");
    println!("{}", "=".repeat(50));

    // Example 1: Literal string matching
    println!("\n1. Literal String Matching");
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("echo Pattern: SUCCESS")?;

    let result = session.expect("SUCCESS").await?;
    println!("   ✓ Found literal match: '{}'", result.matched);
    println!("   Before: {:?}", result.before);

    // Example 2: Regex matching with captures
    println!("\n2. Regex Pattern Matching");
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("echo Number: 12345 of 67890")?;

    let result = session
        .expect(Pattern::regex(r"(?P<first>\d+) of (\d+)")?)
        .await?;
    println!("   ✓ Found regex match: '{}'", result.matched);
    println!("   first = {:?}", result.name("first"));
    println!("   group 2 = {:?}", result.capture(2));

    // Example 3: Multiple patterns (earliest match in the output wins)
    println!("\n3. Multiple Pattern Matching");
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn("echo Status: OK, no ERROR")?;

    let patterns = [
        Pattern::literal("ERROR"),
        Pattern::literal("OK"),
        Pattern::literal("FAIL"),
    ];

    let result = session.expect_any(&patterns).await?;
    println!(
        "   ✓ Matched pattern #{}: '{}' at {}..{}",
        result.pattern_index, result.matched, result.start, result.end
    );

    // Example 4: Anchored regex for strict sequencing
    println!("\n4. Anchored Regex");
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn_args("sh", ["-c", "printf 'step1 step2 '"])?;

    session.expect(Pattern::anchored_regex(r"step1 ")?).await?;
    let result = session
        .expect(Pattern::anchored_regex(r"step(\d) ")?)
        .await?;
    println!("   ✓ Next step: {:?}", result.capture(1));

    println!("\n✓ All pattern matching examples complete!");

    Ok(())
}
