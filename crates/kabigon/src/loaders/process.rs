// ABOUTME: Helpers for loaders that drive external programs (browser, yt-dlp, whisper).
// ABOUTME: Locates executables and runs them under a deadline, killing the child on every exit path.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::LoadError;

/// Longest stderr excerpt kept in an error detail.
const STDERR_EXCERPT: usize = 400;

/// Find the first of `candidates` on PATH or fail with MissingDependency.
pub fn require_executable(
    candidates: &[&str],
    package: &str,
    install_command: &str,
) -> Result<PathBuf, LoadError> {
    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| LoadError::missing_dependency(package, install_command))
}

/// Run `cmd` to completion within `timeout`.
///
/// The child is killed when the deadline passes or the future is dropped.
/// A non-zero exit status becomes a ContentError carrying the stderr tail.
pub async fn run_with_timeout(
    mut cmd: Command,
    url: &str,
    timeout: Duration,
    what: &str,
) -> Result<Output, LoadError> {
    cmd.kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(url, what, timeout_ms = timeout.as_millis() as u64, "spawning");
    let child = cmd.spawn().map_err(|e| {
        LoadError::unexpected(anyhow::anyhow!("failed to start {}: {}", what, e))
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| {
            LoadError::unexpected(anyhow::anyhow!("failed waiting for {}: {}", what, e))
        })?,
        Err(_) => {
            return Err(LoadError::timeout(
                url,
                timeout,
                Some(format!("{} did not finish in time", what)),
            ))
        }
    };

    if !output.status.success() {
        return Err(LoadError::content(
            url,
            format!(
                "{} exited with {}: {}",
                what,
                output.status,
                stderr_excerpt(&output.stderr)
            ),
            None,
        ));
    }
    Ok(output)
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(STDERR_EXCERPT)
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn missing_executable_is_missing_dependency() {
        let err = require_executable(
            &["definitely-not-a-real-binary-4f1c"],
            "fake-tool",
            "cargo install fake-tool",
        )
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingDependency);
        assert!(err.to_string().contains("cargo install fake-tool"));
    }

    #[test]
    fn stderr_excerpt_keeps_tail() {
        let long = "x".repeat(1000) + "END";
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.ends_with("END"));
        assert!(excerpt.len() <= STDERR_EXCERPT + 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_child_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_with_timeout(cmd, "https://example.com", Duration::from_millis(100), "sleep")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_child_is_content_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = run_with_timeout(cmd, "https://example.com", Duration::from_secs(5), "sh")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ContentError);
        assert!(err.to_string().contains("broken"));
    }
}
