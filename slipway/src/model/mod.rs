//! The parsed workflow document model.
//!
//! A workflow file declares, per lifecycle stage, an ordered list of driver
//! steps. The model is immutable once parsed and rebuilt from disk on every
//! stage invocation; nothing here caches across runs.

mod parser;
pub mod placeholders;

pub use parser::{parse, parse_str, workflow_path, LOCAL_WORKFLOW_FILE, WORKFLOW_FILE};

use crate::driver::{Driver, DriverRegistry};
use crate::environment::{EnvMap, DEFAULT_ENV_FOLDER};
use crate::errors::LifecycleError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A lifecycle stage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    /// Create cloud resources for the project.
    Provision,
    /// Push built artifacts onto provisioned resources.
    Deploy,
    /// Publish the application for distribution.
    Publish,
    /// Register the application with its hosting catalog.
    RegisterApp,
}

impl StageName {
    /// Returns the stage key as it appears in the workflow document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Deploy => "deploy",
            Self::Publish => "publish",
            Self::RegisterApp => "registerApp",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared step of a lifecycle.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverDefinition {
    /// The namespaced driver identifier (e.g. `"arm/deploy"`).
    pub uses: String,
    /// An optional display name for the step.
    #[serde(default)]
    pub name: Option<String>,
    /// The driver's input configuration, possibly containing placeholders.
    #[serde(default, rename = "with")]
    pub args: Option<serde_json::Value>,
    /// Extra variables visible from this step onward, lowest precedence.
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
}

impl DriverDefinition {
    /// Returns the name shown for this step in summaries and errors.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uses)
    }
}

/// A step bound to its executable driver, built fresh per execution.
#[derive(Debug, Clone)]
pub struct DriverInstance {
    /// The declared step.
    pub definition: DriverDefinition,
    /// The resolved driver.
    pub instance: Arc<dyn Driver>,
}

impl DriverInstance {
    /// Returns the step's `uses` identifier.
    #[must_use]
    pub fn uses(&self) -> &str {
        &self.definition.uses
    }

    /// Returns the name shown for this step.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.definition.display_name()
    }
}

/// One lifecycle stage: a named, ordered sequence of driver steps.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    name: String,
    driver_defs: Vec<DriverDefinition>,
}

impl Lifecycle {
    /// Creates a lifecycle from its stage key and declared steps.
    #[must_use]
    pub fn new(name: impl Into<String>, driver_defs: Vec<DriverDefinition>) -> Self {
        Self {
            name: name.into(),
            driver_defs,
        }
    }

    /// Returns the stage key this lifecycle was declared under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared steps in order.
    #[must_use]
    pub fn driver_defs(&self) -> &[DriverDefinition] {
        &self.driver_defs
    }

    /// Returns every placeholder name referenced by any step's
    /// configuration, in first-occurrence order, de-duplicated.
    #[must_use]
    pub fn resolve_placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        for def in &self.driver_defs {
            if let Some(args) = &def.args {
                for name in placeholders::referenced(args) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    /// Returns the referenced placeholder names with no binding in `env`.
    #[must_use]
    pub fn unresolved_placeholders(&self, env: &EnvMap) -> Vec<String> {
        self.resolve_placeholders()
            .into_iter()
            .filter(|name| !env.contains_key(name))
            .collect()
    }

    /// Looks up a literal string argument of the first step using `uses`.
    ///
    /// An empty string and a value containing placeholders both count as
    /// "not yet resolved" and return `None`, so callers fall back to
    /// environment resolution instead of trusting a blank value.
    #[must_use]
    pub fn static_arg(&self, uses: &str, key: &str) -> Option<&str> {
        self.driver_defs
            .iter()
            .find(|def| def.uses == uses)
            .and_then(|def| def.args.as_ref())
            .and_then(|args| args.get(key))
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty() && !value.contains("${{"))
    }

    /// Binds every step to its registered driver, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::DriverResolution`] on the first step whose
    /// `uses` identifier is not registered.
    pub fn resolve_driver_instances(
        &self,
        registry: &DriverRegistry,
    ) -> Result<Vec<DriverInstance>, LifecycleError> {
        self.driver_defs
            .iter()
            .map(|def| {
                let instance = registry.resolve(&def.uses)?;
                Ok(DriverInstance {
                    definition: def.clone(),
                    instance,
                })
            })
            .collect()
    }
}

/// The parsed workflow document.
#[derive(Debug, Clone)]
pub struct ProjectModel {
    /// The document format version.
    pub version: String,
    /// The `provision` lifecycle, if declared.
    pub provision: Option<Lifecycle>,
    /// The `deploy` lifecycle, if declared.
    pub deploy: Option<Lifecycle>,
    /// The `publish` lifecycle, if declared.
    pub publish: Option<Lifecycle>,
    /// The `registerApp` lifecycle, if declared.
    pub register_app: Option<Lifecycle>,
    /// Project-relative override of the environment folder.
    pub environment_folder_path: Option<PathBuf>,
}

impl ProjectModel {
    /// Returns the lifecycle declared under a stage key, if any.
    #[must_use]
    pub fn lifecycle(&self, stage: StageName) -> Option<&Lifecycle> {
        match stage {
            StageName::Provision => self.provision.as_ref(),
            StageName::Deploy => self.deploy.as_ref(),
            StageName::Publish => self.publish.as_ref(),
            StageName::RegisterApp => self.register_app.as_ref(),
        }
    }

    /// Returns the environment folder, applying the default when the
    /// document declares no override.
    #[must_use]
    pub fn env_folder(&self) -> PathBuf {
        self.environment_folder_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FOLDER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NoOpDriver;
    use serde_json::json;

    fn def(uses: &str, args: Option<serde_json::Value>) -> DriverDefinition {
        DriverDefinition {
            uses: uses.to_string(),
            name: None,
            args,
            env: None,
        }
    }

    #[test]
    fn test_stage_name_round_trip() {
        assert_eq!(StageName::Provision.as_str(), "provision");
        assert_eq!(StageName::RegisterApp.as_str(), "registerApp");
        assert_eq!(StageName::Deploy.to_string(), "deploy");
    }

    #[test]
    fn test_resolve_placeholders_across_steps() {
        let lifecycle = Lifecycle::new(
            "provision",
            vec![
                def("arm/deploy", Some(json!({"sub": "${{SUB_ID}}"}))),
                def(
                    "app/create",
                    Some(json!({"sub": "${{SUB_ID}}", "name": "${{APP_NAME}}"})),
                ),
            ],
        );
        assert_eq!(lifecycle.resolve_placeholders(), vec!["SUB_ID", "APP_NAME"]);
    }

    #[test]
    fn test_unresolved_placeholders() {
        let lifecycle = Lifecycle::new(
            "provision",
            vec![def("arm/deploy", Some(json!({"sub": "${{SUB_ID}}"})))],
        );
        let mut env = EnvMap::new();
        assert_eq!(lifecycle.unresolved_placeholders(&env), vec!["SUB_ID"]);

        env.insert("SUB_ID".to_string(), "abc".to_string());
        assert!(lifecycle.unresolved_placeholders(&env).is_empty());
    }

    #[test]
    fn test_static_arg_literal() {
        let lifecycle = Lifecycle::new(
            "provision",
            vec![def("arm/deploy", Some(json!({"subscriptionId": "sub-123"})))],
        );
        assert_eq!(
            lifecycle.static_arg("arm/deploy", "subscriptionId"),
            Some("sub-123")
        );
    }

    #[test]
    fn test_static_arg_empty_string_is_unset() {
        let lifecycle = Lifecycle::new(
            "provision",
            vec![def("arm/deploy", Some(json!({"subscriptionId": ""})))],
        );
        assert_eq!(lifecycle.static_arg("arm/deploy", "subscriptionId"), None);
    }

    #[test]
    fn test_static_arg_placeholder_is_unset() {
        let lifecycle = Lifecycle::new(
            "provision",
            vec![def(
                "arm/deploy",
                Some(json!({"subscriptionId": "${{AZURE_SUBSCRIPTION_ID}}"})),
            )],
        );
        assert_eq!(lifecycle.static_arg("arm/deploy", "subscriptionId"), None);
    }

    #[test]
    fn test_resolve_driver_instances_in_order() {
        let registry = DriverRegistry::new();
        registry.register("arm/deploy", Arc::new(NoOpDriver));
        registry.register("app/create", Arc::new(NoOpDriver));

        let lifecycle = Lifecycle::new(
            "provision",
            vec![def("arm/deploy", None), def("app/create", None)],
        );

        let instances = lifecycle.resolve_driver_instances(&registry).unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].uses(), "arm/deploy");
        assert_eq!(instances[1].uses(), "app/create");
    }

    #[test]
    fn test_resolve_driver_instances_unknown_uses() {
        let registry = DriverRegistry::new();
        let lifecycle = Lifecycle::new("provision", vec![def("never/registered", None)]);

        let err = lifecycle.resolve_driver_instances(&registry).unwrap_err();
        assert_eq!(err.name(), "DriverResolutionError");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = DriverRegistry::new();
        registry.register("arm/deploy", Arc::new(NoOpDriver));
        let lifecycle = Lifecycle::new("provision", vec![def("arm/deploy", None)]);

        let first: Vec<String> = lifecycle
            .resolve_driver_instances(&registry)
            .unwrap()
            .iter()
            .map(|i| i.uses().to_string())
            .collect();
        let second: Vec<String> = lifecycle
            .resolve_driver_instances(&registry)
            .unwrap()
            .iter()
            .map(|i| i.uses().to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_project_model_env_folder_default() {
        let model = ProjectModel {
            version: "1.0.0".to_string(),
            provision: None,
            deploy: None,
            publish: None,
            register_app: None,
            environment_folder_path: None,
        };
        assert_eq!(model.env_folder(), PathBuf::from("env"));
        assert!(model.lifecycle(StageName::Provision).is_none());
    }
}
