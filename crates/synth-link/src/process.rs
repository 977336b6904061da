use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

use crate::error::LinkError;

/// Most recent stderr lines kept for exit diagnostics.
const STDERR_TAIL_LINES: usize = 50;
/// Byte cap across the kept stderr lines.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

// ─── StderrTail ───────────────────────────────────────────────────────────

/// The last lines of a helper's stderr, capped by line count and bytes.
#[derive(Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push(&mut self, mut line: String) {
        if line.len() > STDERR_TAIL_BYTES {
            let mut cut = STDERR_TAIL_BYTES;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }
        self.bytes += line.len();
        self.lines.push_back(line);
        while self.lines.len() > STDERR_TAIL_LINES || self.bytes > STDERR_TAIL_BYTES {
            match self.lines.pop_front() {
                Some(old) => self.bytes -= old.len(),
                None => break,
            }
        }
    }

    fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

// ─── FeedProcess ──────────────────────────────────────────────────────────

/// A running subscription helper: one feed message per stdout line.
///
/// The tail of stderr is captured in a background task and surfaced when the
/// process exits unsuccessfully. The child is killed when this value is dropped.
pub(crate) struct FeedProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr_tail: Arc<Mutex<StderrTail>>,
}

impl FeedProcess {
    pub(crate) fn spawn(program: &str, args: &[String]) -> Result<Self, LinkError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self, LinkError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LinkError::Process("stdout not captured".into()))?;

        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut t) = tail.lock() {
                        t.push(line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr_tail,
        })
    }

    /// Next non-blank stdout line, trimmed. `Ok(None)` on EOF.
    pub(crate) async fn next_line(&mut self) -> Result<Option<String>, LinkError> {
        loop {
            match self.lines.next_line().await? {
                None => return Ok(None),
                Some(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Ok(Some(trimmed.to_owned()));
                }
            }
        }
    }

    /// Wait for exit; `Some` if the exit code was non-zero or the process was
    /// killed by a signal.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<LinkError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(LinkError::Io(e)),
        };

        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_tail
            .lock()
            .ok()
            .map(|t| t.joined())
            .unwrap_or_default();

        let what = match status.code() {
            Some(code) => format!("subscription process exited with code {code}"),
            None => "subscription process terminated by signal".to_string(),
        };
        let msg = if stderr.is_empty() {
            what
        } else {
            format!("{what}\nstderr: {stderr}")
        };
        Some(LinkError::Process(msg))
    }

    /// Kill the subprocess (best-effort; errors are silently ignored).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> FeedProcess {
        FeedProcess::spawn("sh", &["-c".to_string(), script.to_string()]).unwrap()
    }

    #[tokio::test]
    async fn reads_lines_and_skips_blanks() {
        let mut p = sh(r#"printf '{"a":1}\n\n   \n{"a":2}\n'"#);
        assert_eq!(p.next_line().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(p.next_line().await.unwrap().as_deref(), Some(r#"{"a":2}"#));
        assert_eq!(p.next_line().await.unwrap(), None);
        assert!(p.wait_exit_error().await.is_none());
    }

    #[tokio::test]
    async fn non_zero_exit_surfaces_stderr() {
        let mut p = sh("echo 'auth expired' >&2; exit 3");
        assert_eq!(p.next_line().await.unwrap(), None);
        // Give the stderr reader a moment to drain.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let err = p.wait_exit_error().await.unwrap();
        let msg = err.to_string();
        assert!(msg.contains("code 3"));
        assert!(msg.contains("auth expired"));
    }

    #[test]
    fn stderr_tail_keeps_recent_lines_within_cap() {
        let mut tail = StderrTail::default();
        for i in 0..20_000 {
            tail.push(format!("warning: reconnecting to broker, attempt {i}"));
        }
        assert!(tail.bytes <= STDERR_TAIL_BYTES);
        assert!(tail.lines.len() <= STDERR_TAIL_LINES);
        assert!(tail.joined().ends_with("attempt 19999"));

        tail.push("x".repeat(3 * STDERR_TAIL_BYTES));
        assert_eq!(tail.lines.len(), 1);
        assert_eq!(tail.bytes, STDERR_TAIL_BYTES);
    }

    #[tokio::test]
    async fn noisy_helper_stderr_stays_bounded() {
        let mut p = sh(
            r#"i=0; while [ $i -lt 20000 ]; do echo "noise $i" >&2; i=$((i+1)); done; echo '{"a":1}'; sleep 5"#,
        );
        assert_eq!(p.next_line().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        {
            let tail = p.stderr_tail.lock().unwrap();
            assert!(tail.bytes <= STDERR_TAIL_BYTES);
            assert!(tail.lines.len() <= STDERR_TAIL_LINES);
            assert!(!tail.lines.is_empty());
        }
        p.kill().await;
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let result = FeedProcess::spawn("/nonexistent/feed-follow", &[]);
        assert!(matches!(result, Err(LinkError::Io(_))));
    }
}
