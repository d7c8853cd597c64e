use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::types::{Message, QueryOptions};
use crate::{ClaudeBackendError, Result};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude --print --output-format stream-json` subprocess.
///
/// The prompt is written to stdin as plain text, then stdin is closed
/// (single-turn operation). Responses are read as JSONL from stdout. Stderr
/// is captured in a background task and surfaced on process exit errors.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    /// Stderr output collected by a background reader task.
    stderr_buf: Arc<Mutex<String>>,
}

impl ClaudeProcess {
    /// Spawn the `claude` binary (or the configured override) with the given
    /// prompt and options.
    ///
    /// `CLAUDECODE` is removed from the environment so this works both from
    /// a terminal and from inside a running Claude session.
    pub(crate) async fn spawn(prompt: &str, opts: &QueryOptions) -> Result<Self> {
        let mut cmd = build_command(opts);
        cmd.env_remove("CLAUDECODE");

        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let mut process = Self::from_command(cmd)?;
        process.send_prompt(prompt).await?;
        process.close_stdin();
        Ok(process)
    }

    /// Spawn an arbitrary command as a mock Claude process.
    /// Used in unit tests to inject a command that emits fixed JSON lines.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self> {
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(ClaudeBackendError::Io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeBackendError::Process("stdout not captured".into()))?;

        let stdin = child.stdin.take();

        // Drain stderr into a buffer so it can be surfaced when the process
        // exits with an error.
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        let lines = BufReader::new(stdout).lines();
        Ok(Self {
            child,
            lines,
            stdin,
            stderr_buf,
        })
    }

    async fn send_prompt(&mut self, prompt: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClaudeBackendError::Process("stdin already closed".into()))?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(ClaudeBackendError::Io)?;
        stdin.flush().await.map_err(ClaudeBackendError::Io)?;
        Ok(())
    }

    /// Close stdin, signalling no more input (single-turn mode).
    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Read the next non-empty JSONL line from stdout and deserialize it.
    ///
    /// Unknown message types (e.g. `tool_progress`) are silently skipped.
    /// Returns `Ok(None)` on EOF (process exited normally).
    pub(crate) async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            match self.lines.next_line().await {
                Err(e) => return Err(ClaudeBackendError::Io(e)),
                Ok(None) => return Ok(None),
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Message>(trimmed) {
                        Ok(msg) => return Ok(Some(msg)),
                        Err(e) => {
                            // Valid JSON with an unrecognised "type" is an
                            // unknown message type, not a stream failure.
                            if is_unknown_message_type(trimmed) {
                                continue;
                            }
                            return Err(ClaudeBackendError::Parse {
                                line: trimmed.to_owned(),
                                source: e,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Wait for the child to exit and return an error if the exit code is
    /// non-zero or the process was killed by a signal. Captured stderr is
    /// included in the error message.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<ClaudeBackendError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(ClaudeBackendError::Io(e)),
        };

        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let msg = match (status.code(), stderr.is_empty()) {
            (Some(code), true) => format!("claude exited with code {code}"),
            (Some(code), false) => format!("claude exited with code {code}\nstderr: {stderr}"),
            (None, true) => "claude terminated by signal".to_string(),
            (None, false) => format!("claude terminated by signal\nstderr: {stderr}"),
        };

        Some(ClaudeBackendError::Process(msg))
    }

    /// Kill the subprocess (best-effort; errors are silently ignored).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// Check if a JSON line has a `"type"` field with a value we don't
/// recognise. Valid JSON with a type field is an unknown message type and
/// gets skipped; anything else is a genuine parse error.
fn is_unknown_message_type(line: &str) -> bool {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(line) {
        v.get("type").is_some()
    } else {
        false
    }
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(opts: &QueryOptions) -> Command {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    let mut cmd = Command::new(exe);

    cmd.arg("--print")
        .arg("--output-format")
        .arg("stream-json")
        .arg("--verbose");

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(max_turns) = opts.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }

    if !opts.allowed_tools.is_empty() {
        cmd.arg("--allowed-tools").args(&opts.allowed_tools);
    }

    if let Some(mode) = &opts.permission_mode {
        cmd.arg("--permission-mode").arg(mode);
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    // NOTE: prompt is NOT a positional arg — it's sent via stdin

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cat_process(lines: &[&str]) -> ClaudeProcess {
        let mut f = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        let path = f.path().to_owned();
        // Keep the file alive for the duration of the test
        std::mem::forget(f);

        let mut cmd = Command::new("cat");
        cmd.arg(&path);
        ClaudeProcess::spawn_command(cmd).unwrap()
    }

    #[tokio::test]
    async fn unknown_message_types_are_skipped() {
        let mut process = cat_process(&[
            r#"{"type":"rate_limit_event","info":"ignored"}"#,
            r#"{"type":"result","subtype":"success","session_id":"s1","result":"ok"}"#,
        ]);

        let msg = process.next_message().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Result(_)));
        process.kill().await;
    }

    #[tokio::test]
    async fn garbage_line_is_a_parse_error() {
        let mut process = cat_process(&["this is not json"]);
        let err = process.next_message().await.unwrap_err();
        assert!(matches!(err, ClaudeBackendError::Parse { .. }));
        process.kill().await;
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let mut process = cat_process(&[]);
        assert!(process.next_message().await.unwrap().is_none());
        process.kill().await;
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        let mut process = ClaudeProcess::spawn_command(cmd).unwrap();

        // Drain stdout to EOF, then give the stderr reader task a moment.
        while process.next_message().await.unwrap().is_some() {}
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let err = process.wait_exit_error().await.unwrap();
        let text = err.to_string();
        assert!(text.contains("code 3"));
        assert!(text.contains("boom"));
    }
}
