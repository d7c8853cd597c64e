use crate::backend::{block_on, ClaudeBackend};
use crate::output::print_json;
use anyhow::Context;
use ralph_core::config::Config;
use ralph_core::pipeline::{stage_count, Pipeline};
use ralph_core::state::RunState;
use ralph_core::ticket::TicketSource;
use ralph_core::{context, io, paths, ticket};
use std::path::Path;

pub struct PlanArgs {
    pub source: TicketSource,
    pub stages: usize,
    pub no_source: bool,
    pub force: bool,
    pub model: Option<String>,
}

pub fn run(root: &Path, out_dir: &Path, args: PlanArgs, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load(out_dir).context("failed to load config")?;
    if args.no_source {
        config.collector.include_source = false;
    }
    let model = args.model.unwrap_or(config.generation.model);

    // Resolve the backend before touching anything: a missing binary is a
    // usage error with no side effects.
    let backend = ClaudeBackend::new(root, model, config.generation.max_turns)?;

    io::ensure_dir(out_dir)?;

    // Inputs are always rebuilt; only stage artifacts are cached.
    let ticket_path =
        ticket::write_normalized(&args.source, out_dir).context("failed to read ticket")?;
    let ticket_text = std::fs::read_to_string(&ticket_path)?;
    context::write_bundle(root, out_dir, &ticket_text, &config.collector)
        .context("failed to build context bundle")?;

    let mut state = RunState::load_or_default(out_dir)?;
    let pipeline = Pipeline::new(out_dir, &backend);

    if args.force {
        pipeline.regenerate(&mut state, 0)?;
    }

    let outcomes = block_on(pipeline.run(&mut state, args.stages))??;

    if json {
        print_json(&serde_json::json!({
            "outcomes": outcomes.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "stage": state.stage,
            "stages_total": stage_count(),
            "complete": state.stage == stage_count(),
        }))?;
        return Ok(());
    }

    for outcome in &outcomes {
        println!("{outcome}");
    }
    if state.stage == stage_count() {
        println!(
            "Pipeline complete: {}",
            out_dir.join(paths::PLAN_FILE).display()
        );
    } else {
        println!(
            "Stage {}/{} — run `ralph plan` again to continue.",
            state.stage,
            stage_count()
        );
    }
    Ok(())
}
