//! Driver trait and test implementations.
//!
//! Drivers are the units of work a lifecycle stage is made of. Each one
//! performs a single concrete operation against some external system and
//! reports the environment variables it produced. The engine never knows
//! what a driver does; it only consumes this contract.

mod registry;

pub use registry::DriverRegistry;

use crate::context::DriverContext;
use crate::environment::EnvMap;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for lifecycle drivers.
///
/// Implementations own their retries and timeouts; the engine stops the
/// stage at the first returned error and never re-invokes a driver.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// A short human-readable description of what this driver does, used
    /// for consent prompts and run summaries.
    fn description(&self) -> &str {
        ""
    }

    /// Executes the driver.
    ///
    /// # Arguments
    ///
    /// * `args` - The step's `with` configuration, placeholders already
    ///   substituted
    /// * `ctx` - The invocation context
    ///
    /// # Returns
    ///
    /// The environment variables this driver produced.
    async fn run(&self, args: &serde_json::Value, ctx: &DriverContext)
        -> anyhow::Result<EnvMap>;
}

/// A driver backed by a plain function, for composing small drivers and
/// for tests.
pub struct FnDriver<F>
where
    F: Fn(&serde_json::Value) -> anyhow::Result<EnvMap> + Send + Sync,
{
    description: String,
    func: F,
}

impl<F> FnDriver<F>
where
    F: Fn(&serde_json::Value) -> anyhow::Result<EnvMap> + Send + Sync,
{
    /// Creates a new function-backed driver.
    pub fn new(description: impl Into<String>, func: F) -> Self {
        Self {
            description: description.into(),
            func,
        }
    }
}

impl<F> Debug for FnDriver<F>
where
    F: Fn(&serde_json::Value) -> anyhow::Result<EnvMap> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDriver")
            .field("description", &self.description)
            .finish()
    }
}

#[async_trait]
impl<F> Driver for FnDriver<F>
where
    F: Fn(&serde_json::Value) -> anyhow::Result<EnvMap> + Send + Sync,
{
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(
        &self,
        args: &serde_json::Value,
        _ctx: &DriverContext,
    ) -> anyhow::Result<EnvMap> {
        (self.func)(args)
    }
}

/// A driver that does nothing and produces no variables.
#[derive(Debug, Clone, Default)]
pub struct NoOpDriver;

#[async_trait]
impl Driver for NoOpDriver {
    fn description(&self) -> &str {
        "do nothing"
    }

    async fn run(
        &self,
        _args: &serde_json::Value,
        _ctx: &DriverContext,
    ) -> anyhow::Result<EnvMap> {
        Ok(EnvMap::new())
    }
}

/// A driver that returns a fixed set of output variables.
#[derive(Debug, Clone, Default)]
pub struct StaticDriver {
    description: String,
    outputs: EnvMap,
}

impl StaticDriver {
    /// Creates a driver producing the given outputs on every run.
    #[must_use]
    pub fn new(outputs: EnvMap) -> Self {
        Self {
            description: String::new(),
            outputs,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Driver for StaticDriver {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(
        &self,
        _args: &serde_json::Value,
        _ctx: &DriverContext,
    ) -> anyhow::Result<EnvMap> {
        Ok(self.outputs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DriverContext;

    fn test_context() -> DriverContext {
        DriverContext::new(".", "dev")
    }

    #[tokio::test]
    async fn test_fn_driver() {
        let driver = FnDriver::new("echo the input", |args| {
            let mut out = EnvMap::new();
            if let Some(value) = args.get("value").and_then(|v| v.as_str()) {
                out.insert("ECHOED".to_string(), value.to_string());
            }
            Ok(out)
        });

        assert_eq!(driver.description(), "echo the input");

        let out = driver
            .run(&serde_json::json!({"value": "hello"}), &test_context())
            .await
            .unwrap();
        assert_eq!(out.get("ECHOED"), Some(&"hello".to_string()));
    }

    #[tokio::test]
    async fn test_noop_driver_produces_nothing() {
        let driver = NoOpDriver;
        let out = driver
            .run(&serde_json::json!({}), &test_context())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_static_driver_outputs() {
        let mut outputs = EnvMap::new();
        outputs.insert("APP_ID".to_string(), "abc123".to_string());
        let driver = StaticDriver::new(outputs).with_description("create the app");

        let out = driver
            .run(&serde_json::json!({}), &test_context())
            .await
            .unwrap();
        assert_eq!(out.get("APP_ID"), Some(&"abc123".to_string()));
        assert_eq!(driver.description(), "create the app");
    }
}
