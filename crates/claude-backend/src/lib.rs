//! `claude-backend` — driver for the `claude` CLI subprocess.
//!
//! Speaks the `--output-format stream-json` protocol: the prompt goes in on
//! stdin, typed JSONL messages come back on stdout, and the terminal
//! `result` message carries the generated text.
//!
//! ```text
//! QueryOptions
//!     │
//!     ▼
//! ClaudeProcess   ← spawns `claude --print --output-format stream-json …`
//!     │              reads JSONL from stdout
//!     ▼
//! QueryStream     ← implements futures::Stream<Item = Result<Message>>
//!     │              background task + mpsc channel
//!     ▼
//! Message enum    ← the subset of the protocol this tool consumes
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;
pub mod stream;

pub use error::ClaudeBackendError;
pub use runner::{run, RunConfig, RunResult};
pub use stream::QueryStream;
pub use types::{Message, QueryOptions, ResultMessage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeBackendError>;

/// Start a single query against the Claude CLI.
///
/// Returns a [`QueryStream`] that yields [`Message`] values as they arrive
/// from the subprocess. The stream terminates after the first
/// [`Message::Result`] or on process exit.
pub fn query(prompt: impl Into<String>, opts: QueryOptions) -> QueryStream {
    QueryStream::new(prompt.into(), opts)
}
