use crate::error::{RalphError, Result};
use crate::paths;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where the ticket description comes from. Exactly one source per run;
/// the CLI enforces mutual exclusion before constructing this.
#[derive(Debug, Clone)]
pub enum TicketSource {
    File(PathBuf),
    Inline(String),
    Stdin,
}

impl TicketSource {
    /// Read the raw ticket text from this source.
    pub fn read(&self) -> Result<String> {
        match self {
            TicketSource::File(path) => {
                if !path.exists() {
                    return Err(RalphError::TicketNotFound(path.display().to_string()));
                }
                Ok(std::fs::read_to_string(path)?)
            }
            TicketSource::Inline(text) => Ok(text.clone()),
            TicketSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

/// Normalize ticket text: CRLF to LF, trailing blank lines stripped, exactly
/// one trailing newline. Empty input (after normalization) is rejected.
pub fn normalize(raw: &str) -> Result<String> {
    let unified = raw.replace("\r\n", "\n");
    let trimmed = unified.trim_end_matches('\n').trim_end();
    if trimmed.trim().is_empty() {
        return Err(RalphError::EmptyTicket);
    }
    Ok(format!("{trimmed}\n"))
}

/// Resolve, normalize, and persist the ticket under `out_dir`.
///
/// The normalized copy is an input, not a pipeline stage: it is rewritten
/// unconditionally on every run.
pub fn write_normalized(source: &TicketSource, out_dir: &Path) -> Result<PathBuf> {
    let raw = source.read()?;
    let normalized = normalize(&raw)?;
    let path = paths::ticket_path(out_dir);
    crate::io::atomic_write(&path, normalized.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_unifies_line_endings_and_trailing_newlines() {
        let out = normalize("fix the bug\r\ndetails here\n\n\n").unwrap();
        assert_eq!(out, "fix the bug\ndetails here\n");
    }

    #[test]
    fn normalize_rejects_whitespace_only_input() {
        assert!(matches!(normalize("  \n\t\n"), Err(RalphError::EmptyTicket)));
    }

    #[test]
    fn missing_ticket_file_is_an_error() {
        let source = TicketSource::File(PathBuf::from("/nonexistent/ticket.md"));
        assert!(matches!(
            source.read(),
            Err(RalphError::TicketNotFound(_))
        ));
    }

    #[test]
    fn write_normalized_always_rewrites() {
        let dir = TempDir::new().unwrap();
        let source = TicketSource::Inline("first".into());
        write_normalized(&source, dir.path()).unwrap();

        let source = TicketSource::Inline("second".into());
        let path = write_normalized(&source, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second\n");
    }
}
