use crate::output::print_json;
use ralph_core::pipeline::{stage_count, STAGES};
use ralph_core::state::RunState;
use std::path::Path;

pub fn run(out_dir: &Path, json: bool) -> anyhow::Result<()> {
    let state = RunState::load_or_default(out_dir)?;

    if json {
        print_json(&serde_json::json!({
            "stage": state.stage,
            "stages_total": stage_count(),
            "complete": state.stage == stage_count(),
            "last_updated": state.last_updated,
        }))?;
        return Ok(());
    }

    println!("Stage {}/{}", state.stage, stage_count());
    for (i, stage) in STAGES.iter().enumerate() {
        let artifact = out_dir.join(stage.artifact);
        let marker = if i < state.stage { "done" } else { "pending" };
        let on_disk = if artifact.exists() { "present" } else { "absent" };
        println!("  {} — {marker} (artifact {on_disk}: {})", stage.name, artifact.display());
    }
    if state.stage == stage_count() {
        println!("Pipeline complete.");
    }
    Ok(())
}
