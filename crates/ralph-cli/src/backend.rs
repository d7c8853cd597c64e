use async_trait::async_trait;
use claude_backend::{QueryOptions, RunConfig};
use ralph_core::backend::{Backend, BackendError, GenOutput, GenRequest};
use std::path::{Path, PathBuf};

/// Env var overriding the `claude` executable (used by integration tests to
/// substitute a stub).
pub const CLAUDE_BIN_ENV: &str = "RALPH_CLAUDE_BIN";

/// Concrete [`Backend`] that drives the `claude` CLI via `claude-backend`.
pub struct ClaudeBackend {
    executable: String,
    model: String,
    max_turns: u32,
    cwd: PathBuf,
}

impl ClaudeBackend {
    /// Resolve the backend binary up front so a missing external dependency
    /// fails before any artifact is touched.
    pub fn new(root: &Path, model: String, max_turns: u32) -> anyhow::Result<Self> {
        let executable = std::env::var(CLAUDE_BIN_ENV).unwrap_or_else(|_| "claude".to_string());
        which::which(&executable)
            .map_err(|_| anyhow::anyhow!("required binary not found: {executable}"))?;
        Ok(Self {
            executable,
            model,
            max_turns,
            cwd: root.to_path_buf(),
        })
    }
}

#[async_trait]
impl Backend for ClaudeBackend {
    async fn generate(&self, req: GenRequest) -> Result<GenOutput, BackendError> {
        let opts = QueryOptions {
            model: Some(self.model.clone()),
            max_turns: Some(self.max_turns),
            allowed_tools: if req.agent {
                ["Read", "Write", "Edit", "Bash", "Glob", "Grep"]
                    .map(String::from)
                    .to_vec()
            } else {
                ["Read", "Glob", "Grep"].map(String::from).to_vec()
            },
            permission_mode: req.agent.then(|| "acceptEdits".to_string()),
            cwd: Some(self.cwd.clone()),
            path_to_executable: Some(self.executable.clone()),
            ..Default::default()
        };

        let result = claude_backend::run(RunConfig {
            prompt: req.prompt,
            opts,
        })
        .await
        .map_err(|e| BackendError::Call(e.to_string()))?;

        if result.is_error {
            return Err(BackendError::Call(format!(
                "run ended with an error result after {} turn(s)",
                result.num_turns
            )));
        }

        Ok(GenOutput {
            text: result.result_text,
            num_turns: result.num_turns,
            cost_usd: result.total_cost_usd,
        })
    }
}

/// Bridge a future onto a fresh runtime; the CLI itself is synchronous.
pub fn block_on<F: std::future::Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(fut))
}
