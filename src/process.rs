//! Child process plumbing shared by discovery and test runs

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{QtTestError, Result};

/// Receives the stdout/stderr of a running test, chunk by chunk.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Exit code reported when a process was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// Collected output of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Exit code, or [`SIGNALED_EXIT_CODE`] when the process did not exit normally.
pub fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALED_EXIT_CODE)
}

/// Whether the process was killed (abort, crash) instead of exiting.
pub fn terminated_abnormally(status: &ExitStatus) -> bool {
    status.code().is_none()
}

fn command<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(cwd) = cwd.filter(|c| !c.as_os_str().is_empty()) {
        cmd.current_dir(cwd);
    }
    cmd
}

/// Run `program` to completion and capture its output.
pub async fn capture<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<ProcessOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tracing::debug!(program = %program.display(), cwd = ?cwd, "spawning");
    let output = command(program, args, cwd)
        .output()
        .await
        .map_err(|source| QtTestError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    Ok(ProcessOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run `program`, forwarding its output to `sink` while it runs. Output is discarded without a sink.
pub async fn run_streaming<I, S>(
    program: &Path,
    args: I,
    cwd: Option<&Path>,
    sink: Option<OutputSink>,
) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tracing::debug!(program = %program.display(), cwd = ?cwd, "running");
    let mut cmd = command(program, args, cwd);
    let spawn_err = |source| QtTestError::Spawn {
        program: program.to_path_buf(),
        source,
    };

    let Some(sink) = sink else {
        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(spawn_err)?;
        return Ok(status);
    };

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out, err, status) = tokio::join!(
        forward(stdout, sink.clone()),
        forward(stderr, sink),
        child.wait()
    );
    if let Err(e) = out.and(err) {
        tracing::warn!("lost test output: {e}");
    }

    status.map_err(QtTestError::Io)
}

async fn forward<R: AsyncRead + Unpin>(reader: Option<R>, sink: OutputSink) -> std::io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut buf = vec![0u8; 8192];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if !pending.is_empty() {
                sink(&String::from_utf8_lossy(&pending));
            }
            return Ok(());
        }
        pending.extend_from_slice(&buf[..n]);

        // A character split across two reads is completed by the next one
        let complete = pending.len() - incomplete_utf8_tail(&pending);
        if complete > 0 {
            sink(&String::from_utf8_lossy(&pending[..complete]));
            pending.drain(..complete);
        }
    }
}

/// Number of trailing bytes that start a UTF-8 sequence but don't finish it.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_capture_collects_stdout_and_code() {
        let out = capture(Path::new("sh"), ["-c", "echo hello; exit 3"], None).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.code(), Some(3));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_spawn_failure_names_program() {
        let err = capture(Path::new("/nonexistent/qttest-probe"), ["-functions"], None)
            .await
            .unwrap_err();
        assert!(matches!(err, QtTestError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/qttest-probe"));
    }

    #[tokio::test]
    async fn test_streaming_forwards_both_streams() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink_seen = seen.clone();
        let sink: OutputSink = Arc::new(move |chunk| sink_seen.lock().unwrap().push_str(chunk));

        let status = run_streaming(Path::new("sh"), ["-c", "echo out; echo err >&2"], None, Some(sink))
            .await
            .unwrap();
        assert!(status.success());

        let seen = seen.lock().unwrap();
        assert!(seen.contains("out"));
        assert!(seen.contains("err"));
    }

    #[test]
    fn test_incomplete_utf8_tail() {
        let check = "\u{2713}".as_bytes();
        assert_eq!(incomplete_utf8_tail(b"plain"), 0);
        assert_eq!(incomplete_utf8_tail(check), 0);
        assert_eq!(incomplete_utf8_tail(&check[..1]), 1);
        assert_eq!(incomplete_utf8_tail(&check[..2]), 2);
        assert_eq!(incomplete_utf8_tail(b""), 0);
    }

    #[tokio::test]
    async fn test_streaming_keeps_split_characters() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink_seen = seen.clone();
        let sink: OutputSink = Arc::new(move |chunk| sink_seen.lock().unwrap().push_str(chunk));

        // U+2713 written in two halves
        let script = "printf '\\342\\234'; sleep 0.2; printf '\\223 done\\n'";
        run_streaming(Path::new("sh"), ["-c", script], None, Some(sink)).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_str(), "\u{2713} done\n");
    }

    #[tokio::test]
    async fn test_signal_is_abnormal_termination() {
        let status = run_streaming(Path::new("sh"), ["-c", "kill -ABRT $$"], None, None)
            .await
            .unwrap();
        assert!(terminated_abnormally(&status));
        assert_eq!(exit_code(&status), SIGNALED_EXIT_CODE);
    }
}
