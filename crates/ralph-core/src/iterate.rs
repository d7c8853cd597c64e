use crate::backend::{Backend, GenMode, GenRequest};
use crate::error::{RalphError, Result};
use crate::prompt;
use std::path::Path;

/// Outcome of one iteration of the code-editing loop.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: usize,
    pub summary: String,
    pub num_turns: u32,
    pub cost_usd: f64,
    /// The agent reported the task list exhausted; the loop stops early.
    pub done: bool,
}

/// Drive up to `iterations` one-task-per-iteration agent runs against the
/// task list at `tasks_path`. No stage is persisted: the loop count is
/// caller-supplied, and the working tree itself is the record of progress.
///
/// Stops early when the agent replies with the completion sentinel. Any
/// backend error aborts the whole loop.
pub async fn run_loop<B: Backend>(
    backend: &B,
    tasks_path: &Path,
    iterations: usize,
) -> Result<Vec<IterationReport>> {
    if !tasks_path.exists() {
        return Err(RalphError::TaskListNotFound(
            tasks_path.display().to_string(),
        ));
    }

    let mut reports = Vec::new();
    for iteration in 1..=iterations {
        tracing::info!(iteration, tasks = %tasks_path.display(), "starting iteration");
        let output = backend
            .generate(GenRequest {
                prompt: prompt::iterate_prompt(tasks_path, iteration),
                mode: GenMode::Text,
                agent: true,
            })
            .await
            .map_err(|e| RalphError::Backend {
                stage: format!("iteration {iteration}"),
                message: e.to_string(),
            })?;

        let done = output.text.trim() == prompt::DONE_SENTINEL;
        tracing::info!(
            iteration,
            turns = output.num_turns,
            cost_usd = output.cost_usd,
            done,
            "iteration finished"
        );
        reports.push(IterationReport {
            iteration,
            summary: output.text,
            num_turns: output.num_turns,
            cost_usd: output.cost_usd,
            done,
        });
        if done {
            break;
        }
    }
    Ok(reports)
}
