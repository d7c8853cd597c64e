use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// CollectorConfig
// ---------------------------------------------------------------------------

/// Caps for the context collector, per file category. Exceeding a byte cap
/// truncates the excerpt with a visible marker; exceeding a file cap stops
/// collection for that category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_max_doc_files")]
    pub max_doc_files: usize,
    #[serde(default = "default_max_doc_bytes")]
    pub max_doc_bytes: usize,
    #[serde(default = "default_max_source_files")]
    pub max_source_files: usize,
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
    #[serde(default = "default_max_image_files")]
    pub max_image_files: usize,
    #[serde(default = "default_include_source")]
    pub include_source: bool,
}

fn default_max_doc_files() -> usize {
    40
}

fn default_max_doc_bytes() -> usize {
    16 * 1024
}

fn default_max_source_files() -> usize {
    60
}

fn default_max_source_bytes() -> usize {
    8 * 1024
}

fn default_max_image_files() -> usize {
    20
}

fn default_include_source() -> bool {
    true
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_doc_files: default_max_doc_files(),
            max_doc_bytes: default_max_doc_bytes(),
            max_source_files: default_max_source_files(),
            max_source_bytes: default_max_source_bytes(),
            max_image_files: default_max_image_files(),
            include_source: default_include_source(),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}

fn default_max_turns() -> u32 {
    50
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_turns: default_max_turns(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Config {
    /// Load `.ralph/config.yaml` under `out_dir`, falling back to defaults
    /// when the file does not exist.
    pub fn load(out_dir: &Path) -> Result<Self> {
        let path = paths::config_path(out_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.collector.max_doc_files, 40);
        assert!(config.collector.include_source);
        assert_eq!(config.generation.max_turns, 50);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "collector:\n  max_doc_files: 5\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.collector.max_doc_files, 5);
        assert_eq!(config.collector.max_doc_bytes, 16 * 1024);
    }
}
