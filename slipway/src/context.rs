//! Execution context passed explicitly into the executor and drivers.
//!
//! There is no ambient/global state: everything a driver may need from the
//! host (project location, selected environment, progress handle) travels
//! in a [`DriverContext`] constructed per stage invocation.

use crate::progress::{NoOpProgressReporter, ProgressReporter};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// The host surface a stage was invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    /// A command-line invocation.
    #[default]
    Cli,
    /// An IDE extension invocation.
    Ide,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Ide => write!(f, "ide"),
        }
    }
}

/// The context for one stage invocation.
///
/// Constructed fresh per run; drivers receive it by reference and must not
/// retain it across invocations.
#[derive(Clone)]
pub struct DriverContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    project_path: PathBuf,
    env_name: String,
    platform: Platform,
    progress: Arc<dyn ProgressReporter>,
}

impl DriverContext {
    /// Creates a new context for a project and environment.
    #[must_use]
    pub fn new(project_path: impl Into<PathBuf>, env_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            project_path: project_path.into(),
            env_name: env_name.into(),
            platform: Platform::default(),
            progress: Arc::new(NoOpProgressReporter),
        }
    }

    /// Sets the invoking platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Sets the progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns when this run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the project root path.
    #[must_use]
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Returns the selected environment name.
    #[must_use]
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Returns the invoking platform.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns the progress reporter for this run.
    #[must_use]
    pub fn progress(&self) -> &Arc<dyn ProgressReporter> {
        &self.progress
    }
}

impl std::fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("run_id", &self.run_id)
            .field("started_at", &self.started_at)
            .field("project_path", &self.project_path)
            .field("env_name", &self.env_name)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = DriverContext::new(".", "dev");
        assert_eq!(ctx.env_name(), "dev");
        assert_eq!(ctx.platform(), Platform::Cli);
        assert_eq!(ctx.project_path(), Path::new("."));
    }

    #[test]
    fn test_context_builder() {
        let ctx = DriverContext::new("/tmp/app", "prod").with_platform(Platform::Ide);
        assert_eq!(ctx.platform(), Platform::Ide);
        assert_eq!(ctx.env_name(), "prod");
    }

    #[test]
    fn test_run_ids_are_unique_per_context() {
        let a = DriverContext::new(".", "dev");
        let b = DriverContext::new(".", "dev");
        assert_ne!(a.run_id(), b.run_id());
    }
}
