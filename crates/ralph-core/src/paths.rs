use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory and file constants
// ---------------------------------------------------------------------------

pub const RALPH_DIR: &str = ".ralph";

pub const TICKET_FILE: &str = "ticket.md";
pub const CONTEXT_FILE: &str = "context.md";
pub const ANALYSIS_FILE: &str = "analysis.md";
pub const PLAN_FILE: &str = "plan.json";
pub const RAW_PLAN_FILE: &str = "plan.raw.json";
pub const STATE_FILE: &str = "state.json";
pub const CONFIG_FILE: &str = "config.yaml";

pub const IGNORE_FILE: &str = ".ralphignore";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn out_dir(root: &Path) -> PathBuf {
    root.join(RALPH_DIR)
}

pub fn ticket_path(out_dir: &Path) -> PathBuf {
    out_dir.join(TICKET_FILE)
}

pub fn context_path(out_dir: &Path) -> PathBuf {
    out_dir.join(CONTEXT_FILE)
}

pub fn state_path(out_dir: &Path) -> PathBuf {
    out_dir.join(STATE_FILE)
}

pub fn raw_plan_path(out_dir: &Path) -> PathBuf {
    out_dir.join(RAW_PLAN_FILE)
}

pub fn config_path(out_dir: &Path) -> PathBuf {
    out_dir.join(CONFIG_FILE)
}

pub fn ignore_file_path(root: &Path) -> PathBuf {
    root.join(IGNORE_FILE)
}
