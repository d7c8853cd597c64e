use futures::StreamExt;

use crate::stream::QueryStream;
use crate::{query, ClaudeBackendError, Message, QueryOptions, Result};

// ─── RunConfig / RunResult ────────────────────────────────────────────────

/// Configuration for a single run of the Claude subprocess.
#[derive(Debug)]
pub struct RunConfig {
    pub prompt: String,
    pub opts: QueryOptions,
}

/// The terminal result of a completed run.
#[derive(Debug)]
pub struct RunResult {
    pub session_id: String,
    /// The final text produced (empty string for error subtypes). For
    /// JSON-mode prompts this is the wrapper's extracted structured field,
    /// validated independently by the caller.
    pub result_text: String,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    /// `true` if the run ended with any error subtype (max_turns, budget…).
    pub is_error: bool,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Drive a single Claude query to completion.
///
/// Starts a [`QueryStream`], consumes all messages, and returns the terminal
/// result message as a [`RunResult`]. Returns `Err` if the stream ends
/// without a `Result` message (e.g., process crashed) or if any message
/// fails to parse.
pub async fn run(config: RunConfig) -> Result<RunResult> {
    collect(query(config.prompt, config.opts)).await
}

// ─── Internal ─────────────────────────────────────────────────────────────

/// Consume a [`QueryStream`] and extract the terminal [`RunResult`].
///
/// Exposed as `pub(crate)` so tests can inject mock streams directly without
/// spawning a real Claude subprocess.
pub(crate) async fn collect(stream: QueryStream) -> Result<RunResult> {
    let mut stream = stream;
    let mut run_result: Option<RunResult> = None;

    while let Some(msg) = stream.next().await {
        match msg? {
            Message::Result(r) => {
                run_result = Some(RunResult {
                    session_id: r.session_id().to_string(),
                    result_text: r.result_text().unwrap_or("").to_string(),
                    total_cost_usd: r.total_cost_usd(),
                    num_turns: r.num_turns(),
                    is_error: r.is_error(),
                });
                // Result is the terminal message — no need to consume further.
                break;
            }
            other => {
                tracing::trace!(session_id = other.session_id(), "intermediate message");
            }
        }
    }

    run_result
        .ok_or_else(|| ClaudeBackendError::Process("stream ended without a result message".into()))
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::types::{ResultError, ResultMessage, ResultSuccess, SystemMessage};

    fn success_msg(text: &str) -> Message {
        Message::Result(ResultMessage::Success(ResultSuccess {
            session_id: "s1".into(),
            result: text.to_string(),
            is_error: false,
            num_turns: 3,
            total_cost_usd: 0.012,
        }))
    }

    fn error_msg() -> Message {
        Message::Result(ResultMessage::ErrorMaxTurns(ResultError {
            session_id: "s2".into(),
            is_error: true,
            num_turns: 10,
            total_cost_usd: 0.005,
            errors: vec![],
        }))
    }

    fn init_msg() -> Message {
        Message::System(SystemMessage {
            session_id: "s1".into(),
            subtype: Some("init".into()),
        })
    }

    async fn collect_from(messages: Vec<Message>) -> Result<RunResult> {
        let (tx, rx) = mpsc::channel(32);
        for msg in messages {
            tx.send(Ok(msg)).await.unwrap();
        }
        drop(tx);
        collect(QueryStream::from_channel(rx)).await
    }

    #[tokio::test]
    async fn collect_extracts_terminal_result() {
        let result = collect_from(vec![init_msg(), success_msg("done")])
            .await
            .unwrap();
        assert_eq!(result.result_text, "done");
        assert_eq!(result.num_turns, 3);
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn error_subtype_yields_empty_text_and_error_flag() {
        let result = collect_from(vec![init_msg(), error_msg()]).await.unwrap();
        assert_eq!(result.result_text, "");
        assert!(result.is_error);
        assert_eq!(result.session_id, "s2");
    }

    #[tokio::test]
    async fn stream_without_result_is_an_error() {
        let err = collect_from(vec![init_msg()]).await.unwrap_err();
        assert!(matches!(err, ClaudeBackendError::Process(_)));
    }
}
