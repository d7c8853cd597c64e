use crate::plan::{MAX_STEPS, MIN_STEPS};
use std::path::Path;

/// Prompt for the analysis stage. Upstream artifacts are consumed by
/// reference so a later stage can never run against stale inline copies.
pub fn analysis_prompt(ticket_path: &Path, context_path: &Path) -> String {
    format!(
        "Read the ticket at @{ticket} and the repository context bundle at \
         @{context}.\n\n\
         Produce a markdown analysis of the ticket against this codebase:\n\
         - restate the problem in your own words\n\
         - identify the areas of the repository the change will touch\n\
         - list constraints, unknowns, and risks you can see in the context\n\
         - sketch the shape of a solution without writing code\n\n\
         Reply with the markdown document only, no preamble.",
        ticket = ticket_path.display(),
        context = context_path.display(),
    )
}

/// Prompt for the plan stage. References the analysis artifact and spells
/// out the exact JSON schema the reply must satisfy.
pub fn plan_prompt(analysis_path: &Path, context_path: &Path) -> String {
    format!(
        "Read the analysis at @{analysis} and the repository context bundle \
         at @{context}.\n\n\
         Produce an implementation plan as a single JSON object with exactly \
         these fields:\n\
         - \"title\": string\n\
         - \"source\": one of \"ticket\" | \"issue\" | \"document\"\n\
         - \"summary\": string\n\
         - \"assumptions\": list of strings\n\
         - \"open_questions\": list of strings\n\
         - \"risks\": list of strings\n\
         - \"steps\": list of {min} to {max} objects, each with string \
         \"id\", \"title\", \"details\" and list-of-strings \
         \"acceptance_criteria\", \"touched_areas\"\n\n\
         Reply with the JSON object only, no markdown fences, no preamble.",
        analysis = analysis_path.display(),
        context = context_path.display(),
        min = MIN_STEPS,
        max = MAX_STEPS,
    )
}

/// Sentinel the iteration agent must emit when the task list is exhausted.
pub const DONE_SENTINEL: &str = "ALL TASKS COMPLETE";

/// Prompt for one iteration of the code-editing loop: exactly one task per
/// invocation, completion reported via the sentinel.
pub fn iterate_prompt(tasks_path: &Path, iteration: usize) -> String {
    format!(
        "This is iteration {iteration} of an incremental implementation loop.\n\n\
         Read the task list at @{tasks}. Pick the single highest-priority task \
         that is not yet implemented in the working tree and implement it \
         completely, including its acceptance criteria. Do not start a second \
         task.\n\n\
         When you finish, summarize what you changed and which task you \
         completed. If every task in the list is already implemented, make no \
         changes and reply with exactly: {DONE_SENTINEL}",
        tasks = tasks_path.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stage_prompts_reference_upstream_artifacts_by_path() {
        let out = PathBuf::from(".ralph");
        let p = analysis_prompt(&out.join("ticket.md"), &out.join("context.md"));
        assert!(p.contains(".ralph/ticket.md"));
        assert!(p.contains(".ralph/context.md"));

        let p = plan_prompt(&out.join("analysis.md"), &out.join("context.md"));
        assert!(p.contains(".ralph/analysis.md"));
        assert!(p.contains("5 to 30 objects"));
    }

    #[test]
    fn iterate_prompt_carries_sentinel() {
        let p = iterate_prompt(&PathBuf::from(".ralph/plan.json"), 1);
        assert!(p.contains(DONE_SENTINEL));
        assert!(p.contains(".ralph/plan.json"));
    }
}
