use thiserror::Error;

#[derive(Debug, Error)]
pub enum RalphError {
    #[error("no input: ticket text is empty")]
    EmptyTicket,

    #[error("ticket file not found: {0}")]
    TicketNotFound(String),

    #[error("context root is not a directory: {0}")]
    RootNotADirectory(String),

    #[error("stage index {index} out of range (pipeline has {count} stages)")]
    StageOutOfRange { index: usize, count: usize },

    #[error("generation backend failed during stage '{stage}': {message}")]
    Backend { stage: String, message: String },

    #[error("backend returned output that is not valid JSON: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("plan failed shape validation ({} issue(s)); raw payload kept at {raw_path}", issues.len())]
    PlanShape {
        issues: Vec<String>,
        raw_path: String,
    },

    #[error("task list not found: {0}")]
    TaskListNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RalphError>;
