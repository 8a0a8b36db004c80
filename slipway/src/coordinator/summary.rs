//! Human-readable stage summaries.
//!
//! Before a stage runs, callers show the user what it will do and ask for
//! consent; after it runs, they show what happened. Both texts derive from
//! the same ordered step descriptions. A failure to build the descriptions
//! aborts the stage before execution: the user cannot give informed
//! consent to steps that cannot be described.

use super::{StageReport, StageStatus};
use crate::driver::DriverRegistry;
use crate::errors::LifecycleError;
use crate::model::{Lifecycle, StageName};
use std::fmt::Write as _;

/// Derives step descriptions and renders stage summaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryReporter;

impl SummaryReporter {
    /// Returns one description per declared step, in order.
    ///
    /// A step's declared `name` wins; otherwise the registered driver's
    /// own description; otherwise the bare `uses` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::DriverResolution`] if any step's driver
    /// is not registered.
    pub fn lifecycle_descriptions(
        lifecycle: &Lifecycle,
        registry: &DriverRegistry,
    ) -> Result<Vec<String>, LifecycleError> {
        lifecycle
            .driver_defs()
            .iter()
            .map(|def| {
                let driver = registry.resolve(&def.uses)?;
                let description = match &def.name {
                    Some(name) => name.clone(),
                    None if !driver.description().is_empty() => driver.description().to_string(),
                    None => def.uses.clone(),
                };
                Ok(description)
            })
            .collect()
    }

    /// Renders the consent preview shown before a stage runs.
    #[must_use]
    pub fn render_preview(stage: StageName, descriptions: &[String]) -> String {
        let mut text = format!(
            "The '{stage}' stage will run {} step(s):\n",
            descriptions.len()
        );
        for (index, description) in descriptions.iter().enumerate() {
            let _ = writeln!(text, "  {}. {description}", index + 1);
        }
        text
    }

    /// Renders the post-run summary for a stage report.
    #[must_use]
    pub fn render_outcome(report: &StageReport) -> String {
        let env_name = report.env_name.as_deref().unwrap_or("<unselected>");
        let mut text = match report.status {
            StageStatus::Succeeded => format!(
                "Stage '{}' succeeded for environment '{env_name}'.\n",
                report.stage
            ),
            StageStatus::PartiallyFailed => format!(
                "Stage '{}' partially failed for environment '{env_name}'.\n",
                report.stage
            ),
            StageStatus::Failed => format!(
                "Stage '{}' failed for environment '{env_name}'.\n",
                report.stage
            ),
        };
        let _ = writeln!(text, "  output variables: {}", report.output.len());
        if let Some(error) = &report.error {
            let _ = writeln!(text, "  error: {error}");
        }
        text
    }
}
