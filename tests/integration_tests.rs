//! Integration tests for ExpectRust

use expectrust::{ExpectError, Pattern, Session, SessionState, Transcript};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_basic_command_execution() {
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn(if cfg!(windows) {
            "cmd /C echo Hello World"
        } else {
            "echo Hello World"
        })
        .expect("Failed to spawn command");

    let result = session
        .expect("Hello")
        .await
        .expect("Failed to find 'Hello'");

    assert_eq!(result.matched, "Hello");
    assert_eq!(result.pattern_index, 0);
}

#[tokio::test]
async fn test_regex_pattern_matching() {
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn(if cfg!(windows) {
            "cmd /C echo Number: 12345"
        } else {
            "echo Number: 12345"
        })
        .expect("Failed to spawn");

    let result = session
        .expect(Pattern::regex(r"Number: (?P<n>\d+)").expect("Invalid regex"))
        .await
        .expect("Pattern not found");

    assert_eq!(result.capture(0), Some("Number: 12345"));
    assert_eq!(result.capture(1), Some("12345"));
    assert_eq!(result.name("n"), Some("12345"));
}

#[tokio::test]
async fn test_multiple_patterns_earliest_wins() {
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn(if cfg!(windows) {
            "cmd /C echo SUCCESS then ERROR"
        } else {
            "echo SUCCESS then ERROR"
        })
        .expect("Failed to spawn");

    let patterns = [
        Pattern::literal("ERROR"),
        Pattern::literal("SUCCESS"),
        Pattern::literal("FAILURE"),
    ];

    let result = assert_ok!(session.expect_any(&patterns).await);
    assert_eq!(result.pattern_index, 1);
    assert_eq!(result.matched, "SUCCESS");

    let result = assert_ok!(session.expect_any(&patterns).await);
    assert_eq!(result.pattern_index, 0);
}

#[tokio::test]
async fn test_invalid_command() {
    let err = assert_err!(Session::spawn("expectrust-no-such-program-here"));
    assert!(matches!(err, ExpectError::SpawnError(_)));
}

#[tokio::test]
async fn test_wait_for_process() {
    let session = Session::spawn(if cfg!(windows) {
        "cmd /C echo done"
    } else {
        "echo done"
    })
    .expect("Failed to spawn");

    let status = assert_ok!(session.wait().await);
    assert!(status.success());

    let err = assert_err!(session.wait().await);
    assert!(matches!(err, ExpectError::AlreadyReaped));
}

#[cfg(unix)]
mod unix {
    use super::*;

    fn sh(script: &str) -> Session {
        Session::builder()
            .timeout(Duration::from_secs(5))
            .spawn_args("sh", ["-c", script])
            .expect("Failed to spawn")
    }

    #[tokio::test]
    async fn test_prompt_without_newline() {
        let session = sh("printf 'ready> '; sleep 5");

        let result = assert_ok!(session.expect("ready>").await);
        assert_eq!(result.start, 0);
        assert_eq!(result.end, 6);
    }

    #[tokio::test]
    async fn test_match_straddling_two_reads() {
        let session = sh("printf hel; sleep 0.3; printf 'lo world'; sleep 5");

        let result = assert_ok!(session.expect(Pattern::regex("hello").unwrap()).await);
        assert_eq!(result.matched, "hello");
        assert_eq!(session.pending(), " world");
    }

    #[tokio::test]
    async fn test_timeout_after_roughly_the_deadline() {
        let session = sh("printf 'something else'; sleep 5");
        let timeout = Duration::from_millis(300);

        let started = Instant::now();
        let err = assert_err!(session.expect_timeout("never", Some(timeout)).await);
        let elapsed = started.elapsed();

        match err {
            ExpectError::Timeout { duration, pattern } => {
                assert_eq!(duration, timeout);
                assert_eq!(pattern, "\"never\"");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(elapsed >= timeout, "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "returned late: {elapsed:?}");
        assert_eq!(session.pending(), "something else");
    }

    #[tokio::test]
    async fn test_cat_ping_without_pong_times_out() {
        let session = sh("exec cat");

        assert_ok!(session.send_line("ping").await);
        assert_ok!(session.expect("ping").await);

        let err = assert_err!(
            session
                .expect_timeout("pong", Some(Duration::from_secs(1)))
                .await
        );
        assert!(err.is_timeout());
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_consumed_offset_only_grows() {
        let session = sh("printf 'x x x'");

        let mut last_end = 0;
        for _ in 0..3 {
            let result = assert_ok!(session.expect("x").await);
            assert!(result.start >= last_end);
            assert!(result.end > last_end);
            last_end = result.end;
            assert_eq!(session.consumed(), last_end);
        }

        let err = assert_err!(session.expect("x").await);
        assert!(matches!(err, ExpectError::Eof));
    }

    #[tokio::test]
    async fn test_anchored_regex_requires_match_at_read_position() {
        let session = sh("printf 'noise: value=42'; sleep 5");

        let err = assert_err!(
            session
                .expect_timeout(
                    Pattern::anchored_regex(r"value=\d+").unwrap(),
                    Some(Duration::from_millis(300)),
                )
                .await
        );
        match err {
            ExpectError::Timeout { pattern, .. } => assert_eq!(pattern, r"anchored /value=\d+/"),
            other => panic!("expected timeout, got {other:?}"),
        }

        assert_ok!(session.expect("noise: ").await);
        let result = assert_ok!(session.expect(Pattern::anchored_regex(r"value=(\d+)").unwrap()).await);
        assert_eq!(result.capture(1), Some("42"));
    }

    #[tokio::test]
    async fn test_ansi_stripping() {
        let session = Session::builder()
            .timeout(Duration::from_secs(5))
            .strip_ansi(true)
            .spawn_args("sh", ["-c", "printf '\\033[31mred\\033[0m text'"])
            .expect("Failed to spawn");

        let result = assert_ok!(session.expect("red text").await);
        assert_eq!(result.before, "");
    }

    #[tokio::test]
    async fn test_send_while_expect_waits() {
        let session = Arc::new(sh("exec cat"));

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.expect("pong").await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.state(), SessionState::Waiting);
        assert_ok!(session.send_line("pong").await);

        let result = assert_ok!(waiter.await.unwrap());
        assert_eq!(result.matched, "pong");
    }

    #[tokio::test]
    async fn test_close_unblocks_expect() {
        let session = Arc::new(sh("sleep 30"));

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.expect_timeout("never", None).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_ok!(session.close().await);

        let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("expect did not return after close")
            .unwrap();
        assert!(matches!(outcome, Err(ExpectError::Closed)));
    }

    #[tokio::test]
    async fn test_close_twice_leaves_no_process() {
        let session = sh("sleep 30");
        let pid = session.pid().expect("no pid") as libc::pid_t;

        assert_ok!(session.close().await);
        assert_ok!(session.close().await);
        assert!(!assert_ok!(session.is_alive()));

        // SAFETY: signal 0 only checks for existence.
        let rc = unsafe { libc::kill(pid, 0) };
        assert_eq!(rc, -1);
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::ESRCH));
    }

    /// Whether `pid` is a live process. Zombies waiting for init to reap
    /// them count as gone.
    fn still_running(pid: libc::pid_t) -> bool {
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            return stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z'));
        }
        // SAFETY: signal 0 only checks for existence.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[tokio::test]
    async fn test_close_clears_background_children() {
        let session = sh("sleep 30 & echo PID=$!; exit 0");

        let result = assert_ok!(session.expect(Pattern::regex(r"PID=(\d+)").unwrap()).await);
        let background: libc::pid_t = result.capture(1).unwrap().parse().unwrap();
        assert!(still_running(background));

        assert_ok!(session.close().await);

        let deadline = Instant::now() + Duration::from_secs(2);
        while still_running(background) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!still_running(background), "background child {background} survived close");
        assert!(session.is_eof());
    }

    #[tokio::test]
    async fn test_close_after_exit_then_wait() {
        let session = sh("exit 3");

        let err = assert_err!(session.expect("anything").await);
        assert!(matches!(err, ExpectError::Eof));

        assert_ok!(session.close().await);
        let status = assert_ok!(session.wait().await);
        assert_eq!(status.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_close_kills_process_ignoring_hangup() {
        let session = Session::builder()
            .close_grace(Duration::from_millis(200))
            .spawn_args("sh", ["-c", "trap '' HUP; printf armed; sleep 30"])
            .expect("Failed to spawn");

        assert_ok!(session.expect("armed").await);

        let started = Instant::now();
        assert_ok!(session.close().await);
        assert!(started.elapsed() < Duration::from_secs(5));

        let status = assert_ok!(session.wait().await);
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_send_after_exit_fails() {
        let session = sh("exit 0");
        assert_ok!(session.wait().await);

        let err = assert_err!(session.send_line("hello").await);
        assert!(matches!(err, ExpectError::WriteError(_)));
    }

    #[tokio::test]
    async fn test_send_eof_ends_cat() {
        let session = sh("exec cat");
        assert_ok!(session.send(b"abc").await);
        session.send_eof();

        let status = assert_ok!(session.wait().await);
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_custom_eol() {
        let session = Session::builder()
            .timeout(Duration::from_secs(5))
            .eol("!\n")
            .spawn_args("sh", ["-c", "exec cat"])
            .expect("Failed to spawn");

        assert_ok!(session.send_line("hi").await);
        assert_ok!(session.expect("hi!").await);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_transcript_prefixes_lines() {
        let sink = Captured::default();
        let session = Session::builder()
            .timeout(Duration::from_secs(5))
            .transcript(Transcript::new(sink.clone(), "t1| "))
            .spawn_args("sh", ["-c", "printf 'a\\nb\\n'"])
            .expect("Failed to spawn");

        assert_err!(session.expect("never").await);
        assert_ok!(session.close().await);

        let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "t1| a\r\nt1| b\r\n");
    }
}
