//! Sequential execution of one lifecycle stage.
//!
//! Steps run strictly in declaration order, one at a time: later steps
//! consume the outputs of earlier ones, and drivers mutate shared cloud
//! resources, so ordering is a correctness requirement. The first
//! unresolved placeholder or driver failure stops the stage; there is no
//! retry and no skip-ahead.

mod result;

pub use result::{ExecutionError, ExecutionResult, StopReason};

use crate::context::DriverContext;
use crate::driver::DriverRegistry;
use crate::environment::EnvMap;
use crate::errors::LifecycleError;
use crate::model::{placeholders, Lifecycle};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes lifecycle stages against a driver registry.
#[derive(Debug, Clone)]
pub struct LifecycleExecutor {
    registry: Arc<DriverRegistry>,
}

impl LifecycleExecutor {
    /// Creates an executor backed by a registry.
    #[must_use]
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    /// Runs every step of a stage in order.
    ///
    /// `initial_env` seeds placeholder resolution (typically the persisted
    /// snapshot of the selected environment). The returned environment
    /// contains only the variables produced by completed steps, with later
    /// steps overriding earlier outputs of the same key.
    pub async fn execute(
        &self,
        lifecycle: &Lifecycle,
        ctx: &DriverContext,
        initial_env: &EnvMap,
    ) -> ExecutionResult {
        let instances = match lifecycle.resolve_driver_instances(&self.registry) {
            Ok(instances) => instances,
            Err(error) => {
                warn!(stage = lifecycle.name(), error = %error, "driver resolution failed");
                return Err(ExecutionError::Failure { error });
            }
        };

        info!(
            stage = lifecycle.name(),
            steps = instances.len(),
            env = ctx.env_name(),
            "executing lifecycle"
        );

        // Placeholders resolve against everything visible so far; the
        // returned snapshot carries step outputs only.
        let mut resolution_env = initial_env.clone();
        let mut output_env = EnvMap::new();

        for instance in &instances {
            let step = instance.display_name();

            if let Some(step_env) = &instance.definition.env {
                for (key, value) in step_env {
                    resolution_env
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
            }

            let args = instance
                .definition
                .args
                .clone()
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

            let unresolved = placeholders::unresolved(&args, &resolution_env);
            if !unresolved.is_empty() {
                warn!(
                    stage = lifecycle.name(),
                    step,
                    ?unresolved,
                    "stopping: unresolved placeholders"
                );
                return Err(ExecutionError::PartialSuccess {
                    env: output_env,
                    reason: StopReason::UnresolvedPlaceholders {
                        failed_driver: step.to_string(),
                        unresolved,
                    },
                });
            }

            let resolved_args = placeholders::substitute(&args, &resolution_env);
            debug!(stage = lifecycle.name(), step, "running driver");

            match instance.instance.run(&resolved_args, ctx).await {
                Ok(outputs) => {
                    info!(
                        stage = lifecycle.name(),
                        step,
                        outputs = outputs.len(),
                        "driver completed"
                    );
                    for (key, value) in outputs {
                        resolution_env.insert(key.clone(), value.clone());
                        output_env.insert(key, value);
                    }
                }
                Err(cause) => {
                    warn!(stage = lifecycle.name(), step, error = %cause, "driver failed");
                    return Err(ExecutionError::PartialSuccess {
                        env: output_env,
                        reason: StopReason::DriverError {
                            failed_driver: step.to_string(),
                            error: LifecycleError::DriverExecution {
                                driver: step.to_string(),
                                cause,
                            },
                        },
                    });
                }
            }
        }

        info!(
            stage = lifecycle.name(),
            outputs = output_env.len(),
            "lifecycle completed"
        );
        Ok(output_env)
    }
}
