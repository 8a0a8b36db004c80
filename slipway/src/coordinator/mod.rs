//! End-to-end orchestration of lifecycle stages.
//!
//! The coordinator ties the engine together for one stage invocation:
//! validate inputs, select the target environment, re-read the workflow
//! file, run pre-stage checks through the caller's gate, execute the
//! stage, persist whatever environment state came back (partial progress
//! included), and convert the outcome into a caller-facing report.
//!
//! Only one stage may execute per project and environment at a time; this
//! core takes no cross-process lock, callers serialize invocations.

mod summary;

#[cfg(test)]
mod integration_tests;

pub use summary::SummaryReporter;

use crate::context::{DriverContext, Platform};
use crate::driver::DriverRegistry;
use crate::environment::{mask_secret_values, EnvMap, EnvStore};
use crate::errors::{LifecycleError, PreconditionError};
use crate::executor::{ExecutionError, LifecycleExecutor};
use crate::model::{self, StageName, WORKFLOW_FILE};
use crate::progress::{NoOpProgressReporter, ProgressReporter};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Caller-supplied inputs for one stage invocation.
#[derive(Debug, Clone)]
pub struct StageInputs {
    /// The project root.
    pub project_path: PathBuf,
    /// The target environment name, if already chosen.
    pub env: Option<String>,
    /// The invoking platform.
    pub platform: Platform,
}

impl StageInputs {
    /// Creates inputs for a project.
    #[must_use]
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            env: None,
            platform: Platform::default(),
        }
    }

    /// Sets the target environment.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Sets the invoking platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// Classification of a finished stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Every step completed.
    Succeeded,
    /// A strict prefix of steps completed before a stopping condition.
    PartiallyFailed,
    /// Nothing ran, or the stage failed before producing output.
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::PartiallyFailed => write!(f, "partially failed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The caller-facing result of one stage invocation.
#[derive(Debug)]
pub struct StageReport {
    /// The stage that was invoked.
    pub stage: StageName,
    /// The environment the stage ran against, once selected.
    pub env_name: Option<String>,
    /// The output environment snapshot (partial on partial failure).
    pub output: EnvMap,
    /// The outcome classification, used to drive exit codes.
    pub status: StageStatus,
    /// The originating error for anything but full success.
    pub error: Option<LifecycleError>,
    /// The step descriptions shown for consent, when they were built.
    pub steps: Vec<String>,
}

impl StageReport {
    /// Returns true for a fully successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Succeeded
    }
}

/// Pre-stage checks and consent, delegated to the caller.
///
/// Implementations perform whatever their stage requires (account and
/// tenant consistency, resource selection, a consent prompt over the step
/// descriptions). Any error aborts the stage before the executor starts.
#[async_trait]
pub trait StageGate: Send + Sync {
    /// Reviews a stage before it executes.
    async fn review(
        &self,
        stage: StageName,
        ctx: &DriverContext,
        steps: &[String],
    ) -> Result<(), PreconditionError>;
}

/// A gate that approves every stage. Used when the caller supplies none.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

#[async_trait]
impl StageGate for ApproveAll {
    async fn review(
        &self,
        _stage: StageName,
        _ctx: &DriverContext,
        _steps: &[String],
    ) -> Result<(), PreconditionError> {
        Ok(())
    }
}

/// Environment selection, delegated to the caller (e.g. a picker dialog).
#[async_trait]
pub trait EnvSelector: Send + Sync {
    /// Picks an environment from the available names.
    async fn select(&self, available: &[String]) -> Result<String, PreconditionError>;
}

/// Orchestrates the provision, deploy, and publish stages for a project.
pub struct Coordinator {
    registry: Arc<DriverRegistry>,
    store: EnvStore,
    gate: Arc<dyn StageGate>,
    selector: Option<Arc<dyn EnvSelector>>,
    progress: Arc<dyn ProgressReporter>,
}

impl Coordinator {
    /// Creates a coordinator over a driver registry and environment store.
    #[must_use]
    pub fn new(registry: Arc<DriverRegistry>, store: EnvStore) -> Self {
        Self {
            registry,
            store,
            gate: Arc::new(ApproveAll),
            selector: None,
            progress: Arc::new(NoOpProgressReporter),
        }
    }

    /// Sets the pre-stage gate.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn StageGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Sets the environment selector.
    #[must_use]
    pub fn with_selector(mut self, selector: Arc<dyn EnvSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Sets the progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the `provision` stage.
    pub async fn provision(&self, inputs: &StageInputs) -> StageReport {
        self.run_stage(StageName::Provision, inputs).await
    }

    /// Runs the `deploy` stage.
    pub async fn deploy(&self, inputs: &StageInputs) -> StageReport {
        self.run_stage(StageName::Deploy, inputs).await
    }

    /// Runs the `publish` stage.
    pub async fn publish(&self, inputs: &StageInputs) -> StageReport {
        self.run_stage(StageName::Publish, inputs).await
    }

    /// Returns the environment a stage invocation would run against,
    /// without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when no environment is given, none can
    /// be selected, or the project cannot be inspected.
    pub async fn selected_env(&self, inputs: &StageInputs) -> Result<String, LifecycleError> {
        validate_inputs(inputs)?;
        self.resolve_env_name(inputs).await
    }

    /// Runs one stage end to end and reports the outcome.
    ///
    /// Never fails as a call: every error becomes part of the report. The
    /// progress reporter is closed with `end(false)` on every failure
    /// path, including aborts before the executor starts.
    async fn run_stage(&self, stage: StageName, inputs: &StageInputs) -> StageReport {
        match self.run_stage_inner(stage, inputs).await {
            Ok(report) => report,
            Err((env_name, error)) => {
                self.progress.end(false).await;
                warn!(stage = %stage, error = %error, kind = error.name(), "stage aborted");
                StageReport {
                    stage,
                    env_name,
                    output: EnvMap::new(),
                    status: StageStatus::Failed,
                    error: Some(error),
                    steps: Vec::new(),
                }
            }
        }
    }

    async fn run_stage_inner(
        &self,
        stage: StageName,
        inputs: &StageInputs,
    ) -> Result<StageReport, (Option<String>, LifecycleError)> {
        validate_inputs(inputs).map_err(|e| (None, e))?;

        let env_name = self.resolve_env_name(inputs).await.map_err(|e| (None, e))?;
        let fail = |e: LifecycleError| (Some(env_name.clone()), e);

        // The workflow file is re-read on every invocation; a partial run
        // never leaves a stale model behind.
        let yml_path = model::workflow_path(&inputs.project_path, &env_name);
        let project_model = model::parse(&yml_path).map_err(fail)?;

        let Some(lifecycle) = project_model.lifecycle(stage) else {
            return Err(fail(LifecycleError::LifecycleUndefined {
                stage: stage.as_str().to_string(),
            }));
        };

        let steps =
            SummaryReporter::lifecycle_descriptions(lifecycle, &self.registry).map_err(fail)?;

        let ctx = DriverContext::new(&inputs.project_path, env_name.clone())
            .with_platform(inputs.platform)
            .with_progress(self.progress.clone());

        self.gate
            .review(stage, &ctx, &steps)
            .await
            .map_err(|e| fail(LifecycleError::Precondition(e)))?;

        let env_folder = project_model.env_folder();
        let initial_env = self
            .store
            .read_env(&inputs.project_path, &env_folder, &env_name)
            .map_err(|e| fail(LifecycleError::Environment(e)))?;

        self.progress
            .start(&SummaryReporter::render_preview(stage, &steps))
            .await;

        let executor = LifecycleExecutor::new(self.registry.clone());
        let result = executor.execute(lifecycle, &ctx, &initial_env).await;

        let report = match result {
            Ok(output) => {
                let persist =
                    self.store
                        .write_env(&inputs.project_path, &env_folder, &env_name, &output);
                match persist {
                    Ok(()) => {
                        self.progress.end(true).await;
                        info!(stage = %stage, env = %env_name, "stage succeeded");
                        StageReport {
                            stage,
                            env_name: Some(env_name),
                            output,
                            status: StageStatus::Succeeded,
                            error: None,
                            steps,
                        }
                    }
                    Err(persist_err) => {
                        self.progress.end(false).await;
                        StageReport {
                            stage,
                            env_name: Some(env_name),
                            output,
                            status: StageStatus::Failed,
                            error: Some(LifecycleError::Environment(persist_err)),
                            steps,
                        }
                    }
                }
            }
            Err(exec_error) => {
                let partial = matches!(exec_error, ExecutionError::PartialSuccess { .. });
                let (output, error) = exec_error.into_parts(stage.as_str());

                // Partial progress must survive the failure so a re-run
                // resumes instead of repeating completed steps.
                if !output.is_empty() {
                    if let Err(persist_err) = self.store.write_env(
                        &inputs.project_path,
                        &env_folder,
                        &env_name,
                        &output,
                    ) {
                        warn!(stage = %stage, error = %persist_err, "failed to persist partial output");
                    }
                }

                self.progress.end(false).await;
                warn!(
                    stage = %stage,
                    env = %env_name,
                    kind = error.name(),
                    error = %mask_secret_values(&error.to_string(), &output),
                    "stage did not complete"
                );
                StageReport {
                    stage,
                    env_name: Some(env_name),
                    output,
                    status: if partial {
                        StageStatus::PartiallyFailed
                    } else {
                        StageStatus::Failed
                    },
                    error: Some(error),
                    steps,
                }
            }
        };
        Ok(report)
    }

    async fn resolve_env_name(&self, inputs: &StageInputs) -> Result<String, LifecycleError> {
        if let Some(env) = &inputs.env {
            if !env.is_empty() {
                return Ok(env.clone());
            }
        }

        let Some(selector) = &self.selector else {
            return Err(LifecycleError::MissingInput {
                name: "env".to_string(),
            });
        };

        // The environment folder may be overridden by the workflow file,
        // so the cloud variant is consulted before listing.
        let project_model = model::parse(&inputs.project_path.join(WORKFLOW_FILE))?;
        let available = self
            .store
            .list_env(&inputs.project_path, &project_model.env_folder())?;

        let selected = selector
            .select(&available)
            .await
            .map_err(LifecycleError::Precondition)?;
        if selected.is_empty() {
            return Err(LifecycleError::Precondition(
                PreconditionError::selection_failed("environment", "empty selection"),
            ));
        }
        Ok(selected)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("has_selector", &self.selector.is_some())
            .finish_non_exhaustive()
    }
}

fn validate_inputs(inputs: &StageInputs) -> Result<(), LifecycleError> {
    if inputs.project_path.as_os_str().is_empty() {
        return Err(LifecycleError::MissingInput {
            name: "projectPath".to_string(),
        });
    }
    Ok(())
}
