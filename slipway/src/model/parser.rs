//! Workflow document parsing.
//!
//! The workflow file is YAML keyed by stage name, each stage an ordered
//! list of step records. Parsing validates the document shape only;
//! whether a step's `uses` identifier is actually registered is checked at
//! resolution time, so a malformed file and an unknown driver stay
//! distinguishable error kinds.

use super::{DriverDefinition, Lifecycle, ProjectModel, StageName};
use crate::errors::{LifecycleError, ParseError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The workflow file for cloud environments.
pub const WORKFLOW_FILE: &str = "slipway.yml";

/// The workflow file variant for the local debug environment.
pub const LOCAL_WORKFLOW_FILE: &str = "slipway.local.yml";

/// Returns the workflow file path for a project and environment.
///
/// The `local` environment uses its own file variant; every other
/// environment shares the cloud workflow file.
#[must_use]
pub fn workflow_path(project_path: &Path, env_name: &str) -> PathBuf {
    if env_name == "local" {
        project_path.join(LOCAL_WORKFLOW_FILE)
    } else {
        project_path.join(WORKFLOW_FILE)
    }
}

/// The on-disk document shape. Unknown top-level keys are ignored: the
/// file format carries sections this engine does not own.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    provision: Option<Vec<DriverDefinition>>,
    #[serde(default)]
    deploy: Option<Vec<DriverDefinition>>,
    #[serde(default)]
    publish: Option<Vec<DriverDefinition>>,
    #[serde(default, rename = "registerApp")]
    register_app: Option<Vec<DriverDefinition>>,
    #[serde(default, rename = "environmentFolderPath")]
    environment_folder_path: Option<PathBuf>,
}

/// Parses a workflow file into a [`ProjectModel`].
///
/// # Errors
///
/// Returns [`LifecycleError::Parse`] if the file cannot be read or the
/// document is malformed.
pub fn parse(yml_path: &Path) -> Result<ProjectModel, LifecycleError> {
    let content = fs::read_to_string(yml_path).map_err(|cause| ParseError::Io {
        path: yml_path.to_path_buf(),
        cause,
    })?;
    parse_str(&content)
}

/// Parses an in-memory workflow document.
///
/// # Errors
///
/// Returns [`LifecycleError::Parse`] if the document is malformed.
pub fn parse_str(content: &str) -> Result<ProjectModel, LifecycleError> {
    let raw: RawDocument = serde_yaml::from_str(content).map_err(ParseError::from)?;

    let version = match raw.version {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            return Err(ParseError::invalid("the workflow file must declare a version").into());
        }
    };

    let model = ProjectModel {
        version,
        provision: build_lifecycle(StageName::Provision, raw.provision)?,
        deploy: build_lifecycle(StageName::Deploy, raw.deploy)?,
        publish: build_lifecycle(StageName::Publish, raw.publish)?,
        register_app: build_lifecycle(StageName::RegisterApp, raw.register_app)?,
        environment_folder_path: raw.environment_folder_path,
    };
    Ok(model)
}

fn build_lifecycle(
    stage: StageName,
    defs: Option<Vec<DriverDefinition>>,
) -> Result<Option<Lifecycle>, ParseError> {
    let Some(defs) = defs else {
        return Ok(None);
    };

    for (index, def) in defs.iter().enumerate() {
        if def.uses.trim().is_empty() {
            return Err(ParseError::invalid(format!(
                "step {} of '{stage}' has an empty 'uses' identifier",
                index + 1
            )));
        }
    }

    Ok(Some(Lifecycle::new(stage.as_str(), defs)))
}
