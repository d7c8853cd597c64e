use crate::backend::{block_on, ClaudeBackend};
use crate::output::print_json;
use anyhow::Context;
use ralph_core::config::Config;
use ralph_core::iterate::run_loop;
use ralph_core::paths;
use std::path::{Path, PathBuf};

pub fn run(
    root: &Path,
    out_dir: &Path,
    tasks: Option<PathBuf>,
    iterations: usize,
    model: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(out_dir).context("failed to load config")?;
    let model = model.unwrap_or(config.generation.model);

    let tasks_path = tasks.unwrap_or_else(|| out_dir.join(paths::PLAN_FILE));

    let backend = ClaudeBackend::new(root, model, config.generation.max_turns)?;
    let reports = block_on(run_loop(&backend, &tasks_path, iterations))??;

    if json {
        print_json(
            &reports
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "iteration": r.iteration,
                        "summary": r.summary,
                        "turns": r.num_turns,
                        "cost_usd": r.cost_usd,
                        "done": r.done,
                    })
                })
                .collect::<Vec<_>>(),
        )?;
        return Ok(());
    }

    for report in &reports {
        println!("--- iteration {} ---", report.iteration);
        println!("{}", report.summary.trim_end());
        println!("Turns: {}  Cost: ${:.4}", report.num_turns, report.cost_usd);
    }
    if reports.last().is_some_and(|r| r.done) {
        println!("Task list complete.");
    }
    Ok(())
}
