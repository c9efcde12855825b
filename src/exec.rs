//! External command execution with a hard deadline.
//!
//! Used for the `reg.exe` round trips of live registry merges, where a hung
//! child process must not wedge the whole merge.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Captured outcome of a finished child process.
#[derive(Debug)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited successfully.
    pub success: bool,
    /// The exit code, when the platform reports one.
    pub code: Option<i32>,
}

/// Poll interval while waiting for the child.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run `program` with `args`, killing it after `timeout`.
///
/// Returns `Ok(None)` when the deadline expired and the child was killed.
///
/// # Errors
///
/// Propagates spawn and wait failures from the operating system.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> std::io::Result<Option<ExecResult>> {
    tracing::debug!(program, ?args, ?timeout, "running command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let deadline = Instant::now() + timeout;
    loop {
        if child.try_wait()?.is_some() {
            break;
        }
        if Instant::now() >= deadline {
            tracing::warn!(program, "command timed out, killing");
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let output = child.wait_with_output()?;
    let result = ExecResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        code: output.status.code(),
    };
    tracing::debug!(program, success = result.success, code = ?result.code, "command finished");
    Ok(Some(result))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn captures_output_and_status() {
        let result = run_with_timeout("echo", &["hello"], Duration::from_secs(5))
            .unwrap()
            .expect("echo should finish well within the deadline");
        assert!(result.success);
        assert_eq!(result.code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn reports_failure_exit_code() {
        let result = run_with_timeout("sh", &["-c", "exit 3"], Duration::from_secs(5))
            .unwrap()
            .expect("shell should finish well within the deadline");
        assert!(!result.success);
        assert_eq!(result.code, Some(3));
    }

    #[test]
    #[cfg(unix)]
    fn kills_child_on_timeout() {
        let result =
            run_with_timeout("sleep", &["30"], Duration::from_millis(100)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_with_timeout(
            "definitely-not-a-real-program",
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
