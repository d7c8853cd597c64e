use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ─── Message ──────────────────────────────────────────────────────────────

/// The subset of `claude --output-format stream-json` messages this tool
/// consumes. Discriminated by the JSON `"type"` field; unknown types are
/// skipped at the process layer rather than failing the stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn session_id(&self) -> &str {
        match self {
            Message::System(m) => &m.session_id,
            Message::Assistant(m) => &m.session_id,
            Message::User(m) => &m.session_id,
            Message::Result(m) => m.session_id(),
        }
    }
}

// ─── System / conversation messages ───────────────────────────────────────

/// `type = "system"` — init and status updates. Only the identifying fields
/// are kept; the rest of the payload is ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMessage {
    pub session_id: String,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub session_id: String,
    pub message: AssistantBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantBody {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    /// Tool calls and anything else — present in agent-mode streams,
    /// irrelevant to the terminal result.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserMessage {
    pub session_id: String,
}

// ─── Result messages ──────────────────────────────────────────────────────

/// `type = "result"` — the terminal message in every query stream.
/// `subtype` distinguishes success from the error conditions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultMessage {
    Success(ResultSuccess),
    ErrorDuringExecution(ResultError),
    ErrorMaxTurns(ResultError),
    ErrorMaxBudgetUsd(ResultError),
}

impl ResultMessage {
    pub fn session_id(&self) -> &str {
        match self {
            ResultMessage::Success(r) => &r.session_id,
            ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => &r.session_id,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, ResultMessage::Success(_))
    }

    /// The final generated text. `None` for error subtypes.
    pub fn result_text(&self) -> Option<&str> {
        if let ResultMessage::Success(r) = self {
            Some(&r.result)
        } else {
            None
        }
    }

    pub fn total_cost_usd(&self) -> f64 {
        match self {
            ResultMessage::Success(r) => r.total_cost_usd,
            ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => r.total_cost_usd,
        }
    }

    pub fn num_turns(&self) -> u32 {
        match self {
            ResultMessage::Success(r) => r.num_turns,
            ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => r.num_turns,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultSuccess {
    pub session_id: String,
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultError {
    pub session_id: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

/// Options for one Claude CLI invocation.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    /// Tools the subprocess may use without prompting (agent mode).
    pub allowed_tools: Vec<String>,
    pub permission_mode: Option<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Executable override (tests and stubs); defaults to `claude`.
    pub path_to_executable: Option<String>,
}
