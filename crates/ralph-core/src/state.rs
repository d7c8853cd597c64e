use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted pipeline progress: all stages before `stage` are done.
///
/// Loaded once at process start and handed to the pipeline as an explicit
/// value; saved after every stage via atomic write. `stage` equal to the
/// stage count means the pipeline is complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default = "default_version")]
    pub version: u32,
    pub stage: usize,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl RunState {
    pub fn new() -> Self {
        Self {
            version: 1,
            stage: 0,
            last_updated: Utc::now(),
        }
    }

    /// Load from `out_dir/state.json`, or a fresh state when no file exists.
    pub fn load_or_default(out_dir: &Path) -> Result<Self> {
        let path = paths::state_path(out_dir);
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(&path)?;
        let state: RunState = serde_json::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, out_dir: &Path) -> Result<()> {
        let path = paths::state_path(out_dir);
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn set_stage(&mut self, stage: usize) {
        self.stage = stage;
        self.last_updated = Utc::now();
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
