//! # Slipway
//!
//! A declarative lifecycle engine for provisioning, deploying, and
//! publishing multi-component application projects.
//!
//! A versioned YAML workflow file declares, per lifecycle stage, an
//! ordered list of driver steps. Slipway provides:
//!
//! - **Workflow parsing**: the file becomes an immutable [`model::ProjectModel`]
//! - **Driver dispatch**: steps resolve against a [`driver::DriverRegistry`]
//! - **Sequential execution**: placeholders resolve from the accumulated
//!   environment, the first failure stops the stage, and partial progress
//!   is reported exactly
//! - **Environment persistence**: outputs merge into per-environment
//!   dotenv files, secrets encrypted in a `.user` sibling
//! - **Coordination**: pre-stage checks, consent, progress reporting, and
//!   caller-facing stage reports
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use slipway::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(DriverRegistry::new());
//! registry.register("arm/deploy", Arc::new(MyArmDriver::new()));
//!
//! let coordinator = Coordinator::new(registry, EnvStore::new(project_key));
//! let report = coordinator
//!     .provision(&StageInputs::new(project_path).with_env("dev"))
//!     .await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod coordinator;
pub mod driver;
pub mod environment;
pub mod errors;
pub mod executor;
pub mod model;
pub mod observability;
pub mod progress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{DriverContext, Platform};
    pub use crate::coordinator::{
        ApproveAll, Coordinator, EnvSelector, StageGate, StageInputs, StageReport, StageStatus,
        SummaryReporter,
    };
    pub use crate::driver::{Driver, DriverRegistry, FnDriver, NoOpDriver, StaticDriver};
    pub use crate::environment::{mask_secret_values, EnvMap, EnvStore, SECRET_PREFIX};
    pub use crate::errors::{
        CryptoError, EnvError, LifecycleError, ParseError, PreconditionError,
    };
    pub use crate::executor::{ExecutionError, ExecutionResult, LifecycleExecutor, StopReason};
    pub use crate::model::{
        DriverDefinition, DriverInstance, Lifecycle, ProjectModel, StageName,
    };
    pub use crate::progress::{
        CollectingProgressReporter, LoggingProgressReporter, NoOpProgressReporter,
        ProgressReporter,
    };
}
