use async_trait::async_trait;
use thiserror::Error;

/// What shape of output a generation call must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenMode {
    /// Free-form text (markdown analysis, iteration summaries).
    Text,
    /// A single JSON object; the caller validates it against a schema
    /// before trusting it as an artifact.
    Json,
}

/// One generation request against the backend.
#[derive(Debug, Clone)]
pub struct GenRequest {
    pub prompt: String,
    pub mode: GenMode,
    /// When set, the backend may use editing tools against the working tree
    /// (iteration loop); otherwise it is read-only (planning pipeline).
    pub agent: bool,
}

/// The backend's terminal output for one request.
#[derive(Debug, Clone)]
pub struct GenOutput {
    pub text: String,
    pub num_turns: u32,
    pub cost_usd: f64,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("required binary not found: {0}")]
    MissingBinary(String),

    #[error("generation call failed: {0}")]
    Call(String),
}

/// Narrow seam over the opaque generation backend. The concrete
/// implementation drives the `claude` subprocess; tests swap in a fake
/// returning canned, schema-valid payloads.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate(&self, req: GenRequest) -> std::result::Result<GenOutput, BackendError>;
}
