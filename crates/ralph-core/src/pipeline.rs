use crate::backend::{Backend, GenMode, GenRequest};
use crate::error::{RalphError, Result};
use crate::state::RunState;
use crate::{io, paths, plan, prompt};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Stage table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Markdown,
    PlanJson,
}

/// One named step in the linear pipeline. Defined statically; never
/// created or destroyed at runtime.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub artifact: &'static str,
    pub output: OutputKind,
}

pub const STAGES: &[Stage] = &[
    Stage {
        name: "analysis",
        artifact: paths::ANALYSIS_FILE,
        output: OutputKind::Markdown,
    },
    Stage {
        name: "plan",
        artifact: paths::PLAN_FILE,
        output: OutputKind::PlanJson,
    },
];

pub fn stage_count() -> usize {
    STAGES.len()
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage's generation step ran and its artifact was written.
    Ran { stage: &'static str },
    /// The stage's artifact already existed; the backend was not called.
    Skipped { stage: &'static str },
    /// State was already at the terminal value. Nothing changed.
    Complete,
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutcome::Ran { stage } => write!(f, "stage '{stage}' generated"),
            StageOutcome::Skipped { stage } => {
                write!(f, "stage '{stage}' skipped (artifact exists)")
            }
            StageOutcome::Complete => write!(f, "pipeline complete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The stage runner: advances the linear pipeline by one stage per
/// [`Pipeline::advance`] call, skipping stages whose artifact already
/// exists, persisting [`RunState`] after every advance.
///
/// A stage is atomic from the state machine's point of view: it either did
/// not start, or fully completed (artifact written, counter advanced). A
/// failing generation or validation step leaves state and artifacts exactly
/// as they were.
pub struct Pipeline<'a, B: Backend> {
    out_dir: PathBuf,
    backend: &'a B,
}

impl<'a, B: Backend> Pipeline<'a, B> {
    pub fn new(out_dir: impl Into<PathBuf>, backend: &'a B) -> Self {
        Self {
            out_dir: out_dir.into(),
            backend,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn artifact_path(&self, stage: &Stage) -> PathBuf {
        self.out_dir.join(stage.artifact)
    }

    fn stage_prompt(&self, index: usize) -> String {
        let ticket = paths::ticket_path(&self.out_dir);
        let context = paths::context_path(&self.out_dir);
        match STAGES[index].output {
            OutputKind::Markdown => prompt::analysis_prompt(&ticket, &context),
            OutputKind::PlanJson => {
                let analysis = self.out_dir.join(STAGES[0].artifact);
                prompt::plan_prompt(&analysis, &context)
            }
        }
    }

    /// Advance the pipeline by one stage. Idempotent at the terminal state.
    pub async fn advance(&self, state: &mut RunState) -> Result<StageOutcome> {
        let s = state.stage;
        if s >= STAGES.len() {
            return Ok(StageOutcome::Complete);
        }

        let stage = &STAGES[s];
        let artifact = self.artifact_path(stage);

        if artifact.exists() {
            tracing::info!(stage = stage.name, "artifact exists, skipping generation");
            state.set_stage(s + 1);
            state.save(&self.out_dir)?;
            return Ok(StageOutcome::Skipped { stage: stage.name });
        }

        let mode = match stage.output {
            OutputKind::Markdown => GenMode::Text,
            OutputKind::PlanJson => GenMode::Json,
        };
        tracing::info!(stage = stage.name, "running generation step");
        let output = self
            .backend
            .generate(GenRequest {
                prompt: self.stage_prompt(s),
                mode,
                agent: false,
            })
            .await
            .map_err(|e| RalphError::Backend {
                stage: stage.name.to_string(),
                message: e.to_string(),
            })?;

        match stage.output {
            OutputKind::Markdown => {
                let mut text = output.text;
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                io::atomic_write(&artifact, text.as_bytes())?;
            }
            OutputKind::PlanJson => {
                let validated = self.validate_plan_payload(&output.text)?;
                let data = serde_json::to_string_pretty(&validated)?;
                io::atomic_write(&artifact, data.as_bytes())?;
            }
        }

        state.set_stage(s + 1);
        state.save(&self.out_dir)?;
        Ok(StageOutcome::Ran { stage: stage.name })
    }

    /// Call [`Pipeline::advance`] exactly `n` times, persisting state after
    /// each, so a crash mid-run leaves state consistent with the last
    /// completed stage.
    pub async fn run(&self, state: &mut RunState, n: usize) -> Result<Vec<StageOutcome>> {
        let mut outcomes = Vec::with_capacity(n);
        for _ in 0..n {
            outcomes.push(self.advance(state).await?);
        }
        Ok(outcomes)
    }

    /// Delete the artifacts for all stages at or after `from` and rewind
    /// persisted state to `from`. Upstream artifacts are untouched.
    pub fn regenerate(&self, state: &mut RunState, from: usize) -> Result<()> {
        if from > STAGES.len() {
            return Err(RalphError::StageOutOfRange {
                index: from,
                count: STAGES.len(),
            });
        }
        for stage in &STAGES[from..] {
            io::remove_if_exists(&self.out_dir.join(stage.artifact))?;
            if stage.output == OutputKind::PlanJson {
                io::remove_if_exists(&paths::raw_plan_path(&self.out_dir))?;
            }
        }
        state.set_stage(from);
        state.save(&self.out_dir)?;
        tracing::info!(from, "rewound pipeline state");
        Ok(())
    }

    /// Parse and shape-check a plan payload. A payload that fails is written
    /// to the raw-plan path for human inspection and never reaches the plan
    /// artifact path.
    fn validate_plan_payload(&self, text: &str) -> Result<plan::Plan> {
        let raw_path = paths::raw_plan_path(&self.out_dir);
        let value: serde_json::Value = match serde_json::from_str(text.trim()) {
            Ok(v) => v,
            Err(e) => {
                io::atomic_write(&raw_path, text.as_bytes())?;
                return Err(RalphError::MalformedPayload(e));
            }
        };
        match plan::validate(&value) {
            Ok(plan) => Ok(plan),
            Err(issues) => {
                io::atomic_write(&raw_path, text.as_bytes())?;
                Err(RalphError::PlanShape {
                    issues: issues.iter().map(ToString::to_string).collect(),
                    raw_path: raw_path.display().to_string(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, GenOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counting fake backend returning canned, schema-valid payloads.
    struct FakeBackend {
        calls: AtomicUsize,
        plan_steps: usize,
        fail: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                plan_steps: 5,
                fail: false,
            }
        }

        fn with_plan_steps(plan_steps: usize) -> Self {
            Self {
                plan_steps,
                ..Self::new()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl crate::backend::Backend for FakeBackend {
        async fn generate(&self, req: GenRequest) -> std::result::Result<GenOutput, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::Call("injected failure".into()));
            }
            let text = match req.mode {
                GenMode::Text => "## Analysis\n\nLooks straightforward.".to_string(),
                GenMode::Json => plan::sample_plan_value(self.plan_steps).to_string(),
            };
            Ok(GenOutput {
                text,
                num_turns: 1,
                cost_usd: 0.0,
            })
        }
    }

    #[tokio::test]
    async fn run_one_stage_at_a_time_to_completion() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();

        // run(1): analysis created, plan absent, state = 1
        let outcomes = pipeline.run(&mut state, 1).await.unwrap();
        assert_eq!(outcomes, vec![StageOutcome::Ran { stage: "analysis" }]);
        assert!(dir.path().join("analysis.md").exists());
        assert!(!dir.path().join("plan.json").exists());
        assert_eq!(RunState::load_or_default(dir.path()).unwrap().stage, 1);

        // run(1): plan created, state terminal
        let outcomes = pipeline.run(&mut state, 1).await.unwrap();
        assert_eq!(outcomes, vec![StageOutcome::Ran { stage: "plan" }]);
        assert!(dir.path().join("plan.json").exists());
        assert_eq!(RunState::load_or_default(dir.path()).unwrap().stage, 2);

        // run(1): no-op, reported complete
        let outcomes = pipeline.run(&mut state, 1).await.unwrap();
        assert_eq!(outcomes, vec![StageOutcome::Complete]);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn advance_at_terminal_state_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();
        pipeline.run(&mut state, 2).await.unwrap();

        let analysis_before = std::fs::read_to_string(dir.path().join("analysis.md")).unwrap();
        let plan_before = std::fs::read_to_string(dir.path().join("plan.json")).unwrap();

        for _ in 0..3 {
            assert_eq!(
                pipeline.advance(&mut state).await.unwrap(),
                StageOutcome::Complete
            );
        }

        assert_eq!(backend.calls(), 2);
        assert_eq!(state.stage, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("analysis.md")).unwrap(),
            analysis_before
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plan.json")).unwrap(),
            plan_before
        );
    }

    #[tokio::test]
    async fn existing_artifact_never_calls_the_backend() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("analysis.md"), "pre-existing\n").unwrap();

        let backend = FakeBackend::new();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();

        let outcome = pipeline.advance(&mut state).await.unwrap();
        assert_eq!(outcome, StageOutcome::Skipped { stage: "analysis" });
        assert_eq!(backend.calls(), 0);
        assert_eq!(state.stage, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("analysis.md")).unwrap(),
            "pre-existing\n"
        );
    }

    #[tokio::test]
    async fn regenerate_removes_downstream_artifacts_only() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();
        pipeline.run(&mut state, 2).await.unwrap();

        pipeline.regenerate(&mut state, 1).unwrap();

        assert!(dir.path().join("analysis.md").exists());
        assert!(!dir.path().join("plan.json").exists());
        assert_eq!(state.stage, 1);
        assert_eq!(RunState::load_or_default(dir.path()).unwrap().stage, 1);
    }

    #[tokio::test]
    async fn regenerate_past_stage_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();

        assert!(matches!(
            pipeline.regenerate(&mut state, 3),
            Err(RalphError::StageOutOfRange { index: 3, count: 2 })
        ));
    }

    #[tokio::test]
    async fn undersized_plan_is_never_written_to_the_artifact_path() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::with_plan_steps(3);
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();
        pipeline.run(&mut state, 1).await.unwrap();

        let err = pipeline.advance(&mut state).await.unwrap_err();
        assert!(matches!(err, RalphError::PlanShape { .. }));
        assert!(!dir.path().join("plan.json").exists());
        // Raw payload is kept for human inspection.
        assert!(dir.path().join("plan.raw.json").exists());
        // State did not advance past the failed stage.
        assert_eq!(state.stage, 1);
        assert_eq!(RunState::load_or_default(dir.path()).unwrap().stage, 1);
    }

    #[tokio::test]
    async fn non_json_payload_is_surfaced_raw() {
        let dir = TempDir::new().unwrap();

        struct GarbageBackend;
        #[async_trait]
        impl crate::backend::Backend for GarbageBackend {
            async fn generate(
                &self,
                _req: GenRequest,
            ) -> std::result::Result<GenOutput, BackendError> {
                Ok(GenOutput {
                    text: "sorry, here is prose instead of JSON".into(),
                    num_turns: 1,
                    cost_usd: 0.0,
                })
            }
        }

        let backend = GarbageBackend;
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::new();
        state.set_stage(1);

        let err = pipeline.advance(&mut state).await.unwrap_err();
        assert!(matches!(err, RalphError::MalformedPayload(_)));
        assert!(!dir.path().join("plan.json").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plan.raw.json")).unwrap(),
            "sorry, here is prose instead of JSON"
        );
    }

    #[tokio::test]
    async fn backend_failure_aborts_without_advancing() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::failing();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();

        let err = pipeline.advance(&mut state).await.unwrap_err();
        assert!(matches!(err, RalphError::Backend { .. }));
        assert_eq!(state.stage, 0);
        assert!(!dir.path().join("analysis.md").exists());
        // Nothing was persisted either.
        assert!(!dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn force_regenerating_twice_yields_two_independently_valid_plans() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend::new();
        let pipeline = Pipeline::new(dir.path(), &backend);
        let mut state = RunState::load_or_default(dir.path()).unwrap();

        for _ in 0..2 {
            pipeline.regenerate(&mut state, 0).unwrap();
            pipeline.run(&mut state, 2).await.unwrap();

            let raw = std::fs::read_to_string(dir.path().join("plan.json")).unwrap();
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert!(plan::validate(&value).is_ok());
        }
        assert_eq!(backend.calls(), 4);
    }
}
