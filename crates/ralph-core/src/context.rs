use crate::config::CollectorConfig;
use crate::error::{RalphError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Ignore rules
// ---------------------------------------------------------------------------

/// Directory names never descended into, regardless of ignore rules.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".ralph",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    "dist",
    "build",
    "vendor",
    ".venv",
    "__pycache__",
    ".idea",
    ".vscode",
];

const DOC_EXTS: &[&str] = &["md", "txt", "toml", "yaml", "yml", "json", "cfg", "ini"];
const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp"];
const SOURCE_EXTS: &[&str] = &[
    "rs", "py", "ts", "tsx", "js", "jsx", "go", "java", "c", "h", "cpp", "hpp", "rb", "sh", "sql",
    "css", "html",
];

/// Path-prefix ignore rules from `.ralphignore`: one rule per line, relative
/// to the context root. Blank lines and `#` comments are skipped.
#[derive(Debug, Default)]
pub struct IgnoreRules {
    prefixes: Vec<String>,
}

impl IgnoreRules {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::ignore_file_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Self::parse(&data))
    }

    pub fn parse(data: &str) -> Self {
        let prefixes = data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.trim_start_matches("./").trim_end_matches('/').to_string())
            .collect();
        Self { prefixes }
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            rel_path == prefix
                || rel_path.starts_with(&format!("{prefix}/"))
        })
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FoundFile {
    rel_path: String,
    abs_path: PathBuf,
}

#[derive(Debug, Default)]
struct Categorized {
    docs: Vec<FoundFile>,
    images: Vec<FoundFile>,
    source: Vec<FoundFile>,
}

fn walk(root: &Path, rules: &IgnoreRules) -> Result<Categorized> {
    let mut found = Categorized::default();
    walk_dir(root, root, rules, &mut found)?;
    // Deterministic bundle ordering regardless of directory iteration order.
    found.docs.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    found.images.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    found.source.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(found)
}

fn walk_dir(root: &Path, dir: &Path, rules: &IgnoreRules, found: &mut Categorized) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel_path = match path.strip_prefix(root) {
            Ok(p) => p.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        if rules.matches(&rel_path) {
            continue;
        }

        if path.is_dir() {
            if EXCLUDED_DIRS.contains(&name.as_str()) || name.starts_with('.') {
                continue;
            }
            walk_dir(root, &path, rules, found)?;
            continue;
        }

        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        let file = FoundFile {
            rel_path,
            abs_path: path,
        };
        if DOC_EXTS.contains(&ext.as_str()) {
            found.docs.push(file);
        } else if IMAGE_EXTS.contains(&ext.as_str()) {
            found.images.push(file);
        } else if SOURCE_EXTS.contains(&ext.as_str()) {
            found.source.push(file);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Excerpting
// ---------------------------------------------------------------------------

/// Read `path` and cap it at `max_bytes`, appending a visible truncation
/// marker when content was cut. Returns `None` for unreadable or non-UTF-8
/// files (skipped, never fatal).
fn excerpt(path: &Path, max_bytes: usize) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    if content.len() <= max_bytes {
        return Some(content);
    }
    let mut cut = max_bytes;
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(format!(
        "{}\n… [truncated: showing first {} of {} bytes]\n",
        &content[..cut],
        cut,
        content.len()
    ))
}

fn modified_utc(path: &Path) -> Option<DateTime<Utc>> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    Some(DateTime::<Utc>::from(mtime))
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Build the single aggregated context document and write it to
/// `out_dir/context.md`. The bundle is always rewritten: inputs are fresh on
/// every run, only derived stage artifacts are cached.
pub fn write_bundle(
    root: &Path,
    out_dir: &Path,
    ticket: &str,
    config: &CollectorConfig,
) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(RalphError::RootNotADirectory(root.display().to_string()));
    }

    let rules = IgnoreRules::load(root)?;
    let found = walk(root, &rules)?;

    let mut bundle = String::new();
    bundle.push_str("# Context bundle\n\n## Ticket\n\n");
    bundle.push_str(ticket);

    bundle.push_str("\n## Documentation\n");
    let mut doc_count = 0;
    for file in &found.docs {
        if doc_count >= config.max_doc_files {
            bundle.push_str(&format!(
                "\n… [file cap reached: {} documentation files omitted]\n",
                found.docs.len() - doc_count
            ));
            break;
        }
        let Some(text) = excerpt(&file.abs_path, config.max_doc_bytes) else {
            continue;
        };
        bundle.push_str(&format!("\n### `{}`\n\n```\n{text}```\n", file.rel_path));
        doc_count += 1;
    }

    bundle.push_str("\n## Images\n\n");
    for (i, file) in found.images.iter().enumerate() {
        if i >= config.max_image_files {
            bundle.push_str(&format!(
                "… [file cap reached: {} images omitted]\n",
                found.images.len() - i
            ));
            break;
        }
        let size = std::fs::metadata(&file.abs_path).map(|m| m.len()).unwrap_or(0);
        match modified_utc(&file.abs_path) {
            Some(mtime) => bundle.push_str(&format!(
                "- `{}` — {size} bytes, modified {}\n",
                file.rel_path,
                mtime.to_rfc3339()
            )),
            None => bundle.push_str(&format!("- `{}` — {size} bytes\n", file.rel_path)),
        }
    }

    if config.include_source {
        bundle.push_str("\n## Source\n");
        let mut source_count = 0;
        for file in &found.source {
            if source_count >= config.max_source_files {
                bundle.push_str(&format!(
                    "\n… [file cap reached: {} source files omitted]\n",
                    found.source.len() - source_count
                ));
                break;
            }
            let Some(text) = excerpt(&file.abs_path, config.max_source_bytes) else {
                continue;
            };
            bundle.push_str(&format!("\n### `{}`\n\n```\n{text}```\n", file.rel_path));
            source_count += 1;
        }
    }

    tracing::debug!(
        docs = found.docs.len(),
        images = found.images.len(),
        source = found.source.len(),
        "context bundle assembled"
    );

    let path = paths::context_path(out_dir);
    crate::io::atomic_write(&path, bundle.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn collect(root: &Path, config: &CollectorConfig) -> String {
        let out = TempDir::new().unwrap();
        let path = write_bundle(root, out.path(), "the ticket\n", config).unwrap();
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn bundle_contains_ticket_and_doc_excerpts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Hello\n").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let bundle = collect(dir.path(), &CollectorConfig::default());
        assert!(bundle.contains("the ticket"));
        assert!(bundle.contains("### `README.md`"));
        assert!(bundle.contains("# Hello"));
        assert!(bundle.contains("### `main.rs`"));
    }

    #[test]
    fn byte_cap_truncates_with_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.md"), "x".repeat(500)).unwrap();

        let config = CollectorConfig {
            max_doc_bytes: 100,
            ..Default::default()
        };
        let bundle = collect(dir.path(), &config);
        assert!(bundle.contains("… [truncated: showing first 100 of 500 bytes]"));
    }

    #[test]
    fn file_cap_stops_category_with_marker() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("doc{i}.md")), "text\n").unwrap();
        }

        let config = CollectorConfig {
            max_doc_files: 2,
            ..Default::default()
        };
        let bundle = collect(dir.path(), &config);
        assert!(bundle.contains("### `doc0.md`"));
        assert!(bundle.contains("### `doc1.md`"));
        assert!(!bundle.contains("### `doc2.md`"));
        assert!(bundle.contains("3 documentation files omitted"));
    }

    #[test]
    fn no_source_flag_omits_source_section() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "pub fn f() {}\n").unwrap();

        let config = CollectorConfig {
            include_source: false,
            ..Default::default()
        };
        let bundle = collect(dir.path(), &config);
        assert!(!bundle.contains("## Source"));
        assert!(!bundle.contains("lib.rs"));
    }

    #[test]
    fn ignore_rules_and_builtin_dirs_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("secrets")).unwrap();
        std::fs::write(dir.path().join("secrets/keys.md"), "nope\n").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x\n").unwrap();
        std::fs::write(dir.path().join(".ralphignore"), "# comment\nsecrets\n").unwrap();
        std::fs::write(dir.path().join("kept.md"), "kept\n").unwrap();

        let bundle = collect(dir.path(), &CollectorConfig::default());
        assert!(!bundle.contains("keys.md"));
        assert!(!bundle.contains("index.js"));
        assert!(bundle.contains("### `kept.md`"));
    }

    #[test]
    fn images_listed_with_metadata_not_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.png"), [0u8, 1, 2, 3]).unwrap();

        let bundle = collect(dir.path(), &CollectorConfig::default());
        assert!(bundle.contains("- `logo.png` — 4 bytes"));
    }
}
