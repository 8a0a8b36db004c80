//! End-to-end stage scenarios over real workflow and environment files.

use super::*;
use crate::driver::{FnDriver, NoOpDriver, StaticDriver};
use crate::environment::{EnvStore, CRYPTO_PREFIX, DEFAULT_ENV_FOLDER};
use crate::progress::{CollectingProgressReporter, ProgressEvent};
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

const PROJECT_KEY: &str = "integration-test-project";

fn outputs(pairs: &[(&str, &str)]) -> EnvMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn write_workflow(project: &Path, content: &str) {
    fs::write(project.join(WORKFLOW_FILE), content).unwrap();
}

fn env_folder() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_ENV_FOLDER)
}

fn coordinator(registry: Arc<DriverRegistry>) -> Coordinator {
    Coordinator::new(registry, EnvStore::new(PROJECT_KEY))
}

/// A gate that records the step descriptions it reviewed.
#[derive(Debug, Default)]
struct RecordingGate {
    reviewed: RwLock<Vec<String>>,
}

#[async_trait]
impl StageGate for RecordingGate {
    async fn review(
        &self,
        _stage: StageName,
        _ctx: &DriverContext,
        steps: &[String],
    ) -> Result<(), PreconditionError> {
        *self.reviewed.write() = steps.to_vec();
        Ok(())
    }
}

/// A gate that declines every stage.
#[derive(Debug, Default)]
struct DeclineGate;

#[async_trait]
impl StageGate for DeclineGate {
    async fn review(
        &self,
        stage: StageName,
        _ctx: &DriverContext,
        _steps: &[String],
    ) -> Result<(), PreconditionError> {
        Err(PreconditionError::consent_declined(stage.as_str()))
    }
}

/// A selector that always picks the first available environment.
#[derive(Debug, Default)]
struct FirstEnvSelector;

#[async_trait]
impl EnvSelector for FirstEnvSelector {
    async fn select(&self, available: &[String]) -> Result<String, PreconditionError> {
        available
            .first()
            .cloned()
            .ok_or_else(|| PreconditionError::selection_failed("environment", "none available"))
    }
}

#[tokio::test]
async fn test_provision_happy_path_persists_and_reports() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: res/create
    name: Create cloud resources
  - uses: pkg/zip
",
    );

    let registry = Arc::new(DriverRegistry::new());
    registry.register(
        "res/create",
        Arc::new(StaticDriver::new(outputs(&[
            ("APP_ID", "abc123"),
            ("SECRET_TOKEN", "hunter2"),
        ]))),
    );
    registry.register("pkg/zip", Arc::new(NoOpDriver));

    let progress = Arc::new(CollectingProgressReporter::new());
    let gate = Arc::new(RecordingGate::default());
    let coordinator = coordinator(registry)
        .with_gate(gate.clone())
        .with_progress(progress.clone());

    let inputs = StageInputs::new(dir.path()).with_env("dev");
    let report = coordinator.provision(&inputs).await;

    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    assert_eq!(report.status, StageStatus::Succeeded);
    assert_eq!(report.env_name.as_deref(), Some("dev"));
    assert_eq!(report.output.get("APP_ID"), Some(&"abc123".to_string()));

    // The gate reviewed the declared step name and the bare identifier.
    assert_eq!(
        gate.reviewed.read().clone(),
        vec!["Create cloud resources".to_string(), "pkg/zip".to_string()]
    );

    // Progress: one start, one successful end.
    let events = progress.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ProgressEvent::Started(_)));
    assert_eq!(events[1], ProgressEvent::Ended(true));

    // Non-secret values in the plain file, secrets encrypted in the
    // sibling, never in plain text.
    let plain =
        fs::read_to_string(EnvStore::env_file(dir.path(), &env_folder(), "dev")).unwrap();
    assert!(plain.contains("APP_ID=abc123"));
    assert!(!plain.contains("hunter2"));

    let user =
        fs::read_to_string(EnvStore::user_file(dir.path(), &env_folder(), "dev")).unwrap();
    assert!(user.contains(CRYPTO_PREFIX));
    assert!(!user.contains("hunter2"));

    // Round-trip through the store recovers the plaintext.
    let read = EnvStore::new(PROJECT_KEY)
        .read_env(dir.path(), &env_folder(), "dev")
        .unwrap();
    assert_eq!(read.get("SECRET_TOKEN"), Some(&"hunter2".to_string()));
}

#[tokio::test]
async fn test_unresolved_placeholder_partial_then_resume() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: a
  - uses: b
    with:
      value: ${{X}}
",
    );

    let registry = Arc::new(DriverRegistry::new());
    registry.register("a", Arc::new(StaticDriver::new(outputs(&[("K1", "V1")]))));
    registry.register(
        "b",
        Arc::new(FnDriver::new("echo the value", |args| {
            let value = args.get("value").and_then(|v| v.as_str()).unwrap_or("");
            let mut out = EnvMap::new();
            out.insert("SEEN_X".to_string(), value.to_string());
            Ok(out)
        })),
    );

    let coordinator = coordinator(registry);
    let inputs = StageInputs::new(dir.path()).with_env("dev");

    // First run stops at step b: X has no binding anywhere.
    let report = coordinator.provision(&inputs).await;
    assert_eq!(report.status, StageStatus::PartiallyFailed);
    assert_eq!(report.output, outputs(&[("K1", "V1")]));
    let error = report.error.unwrap();
    assert_eq!(error.name(), "UnresolvedPlaceholdersError");
    assert!(error.to_string().contains('X'));

    // The completed prefix was persisted.
    let store = EnvStore::new(PROJECT_KEY);
    let persisted = store.read_env(dir.path(), &env_folder(), "dev").unwrap();
    assert_eq!(persisted.get("K1"), Some(&"V1".to_string()));

    // Once X is supplied, a fresh run completes.
    store
        .write_env(dir.path(), &env_folder(), "dev", &outputs(&[("X", "42")]))
        .unwrap();
    let report = coordinator.provision(&inputs).await;
    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    assert_eq!(report.output.get("SEEN_X"), Some(&"42".to_string()));
}

#[tokio::test]
async fn test_driver_error_partial_success() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: a
  - uses: b
",
    );

    let registry = Arc::new(DriverRegistry::new());
    registry.register("a", Arc::new(StaticDriver::new(outputs(&[("K1", "V1")]))));
    registry.register(
        "b",
        Arc::new(FnDriver::new("always fails", |_args| {
            anyhow::bail!("quota exceeded")
        })),
    );

    let progress = Arc::new(CollectingProgressReporter::new());
    let coordinator = coordinator(registry).with_progress(progress.clone());
    let inputs = StageInputs::new(dir.path()).with_env("dev");

    let report = coordinator.provision(&inputs).await;
    assert_eq!(report.status, StageStatus::PartiallyFailed);
    assert_eq!(report.output, outputs(&[("K1", "V1")]));

    let error = report.error.unwrap();
    assert_eq!(error.name(), "DriverExecutionError");
    assert!(error.to_string().contains("quota exceeded"));

    assert_eq!(progress.last_outcome(), Some(false));
}

#[tokio::test]
async fn test_partial_persist_is_superset_of_previous_state() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: a
  - uses: b
    with:
      value: ${{NEVER_SET}}
",
    );

    let store = EnvStore::new(PROJECT_KEY);
    store
        .write_env(
            dir.path(),
            &env_folder(),
            "dev",
            &outputs(&[("EXISTING", "old"), ("SECRET_KEEP", "kept")]),
        )
        .unwrap();

    let registry = Arc::new(DriverRegistry::new());
    registry.register("a", Arc::new(StaticDriver::new(outputs(&[("K1", "V1")]))));
    registry.register("b", Arc::new(NoOpDriver));

    let coordinator = coordinator(registry);
    let report = coordinator
        .provision(&StageInputs::new(dir.path()).with_env("dev"))
        .await;
    assert_eq!(report.status, StageStatus::PartiallyFailed);

    // Nothing previously persisted was lost.
    let persisted = store.read_env(dir.path(), &env_folder(), "dev").unwrap();
    assert_eq!(persisted.get("EXISTING"), Some(&"old".to_string()));
    assert_eq!(persisted.get("SECRET_KEEP"), Some(&"kept".to_string()));
    assert_eq!(persisted.get("K1"), Some(&"V1".to_string()));
}

#[tokio::test]
async fn test_lifecycle_undefined() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: a
",
    );

    let registry = Arc::new(DriverRegistry::new());
    registry.register("a", Arc::new(NoOpDriver));

    let progress = Arc::new(CollectingProgressReporter::new());
    let coordinator = coordinator(registry).with_progress(progress.clone());

    let report = coordinator
        .deploy(&StageInputs::new(dir.path()).with_env("dev"))
        .await;

    assert_eq!(report.status, StageStatus::Failed);
    assert!(report.output.is_empty());
    assert_eq!(report.error.unwrap().name(), "LifecycleUndefinedError");

    // Closed without ever starting.
    assert_eq!(progress.events(), vec![ProgressEvent::Ended(false)]);
}

#[tokio::test]
async fn test_gate_decline_aborts_before_execution() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: tracked
",
    );

    let ran = Arc::new(AtomicBool::new(false));
    let ran_flag = ran.clone();
    let registry = Arc::new(DriverRegistry::new());
    registry.register(
        "tracked",
        Arc::new(FnDriver::new("record that it ran", move |_args| {
            ran_flag.store(true, Ordering::SeqCst);
            Ok(EnvMap::new())
        })),
    );

    let progress = Arc::new(CollectingProgressReporter::new());
    let coordinator = coordinator(registry)
        .with_gate(Arc::new(DeclineGate))
        .with_progress(progress.clone());

    let report = coordinator
        .provision(&StageInputs::new(dir.path()).with_env("dev"))
        .await;

    assert_eq!(report.status, StageStatus::Failed);
    let error = report.error.unwrap();
    assert_eq!(error.name(), "PreconditionError");
    assert!(error.to_string().contains("provision"));

    // The executor never started and no driver ran.
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(progress.events(), vec![ProgressEvent::Ended(false)]);
}

#[tokio::test]
async fn test_env_selector_used_when_env_not_given() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: a
",
    );

    let store = EnvStore::new(PROJECT_KEY);
    store
        .write_env(dir.path(), &env_folder(), "dev", &outputs(&[("SEED", "1")]))
        .unwrap();

    let registry = Arc::new(DriverRegistry::new());
    registry.register("a", Arc::new(NoOpDriver));

    let coordinator = coordinator(registry).with_selector(Arc::new(FirstEnvSelector));
    let inputs = StageInputs::new(dir.path());

    assert_eq!(coordinator.selected_env(&inputs).await.unwrap(), "dev");

    let report = coordinator.provision(&inputs).await;
    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    assert_eq!(report.env_name.as_deref(), Some("dev"));
}

#[tokio::test]
async fn test_missing_env_without_selector() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: a
",
    );

    let registry = Arc::new(DriverRegistry::new());
    registry.register("a", Arc::new(NoOpDriver));

    let coordinator = coordinator(registry);
    let report = coordinator.provision(&StageInputs::new(dir.path())).await;

    assert_eq!(report.status, StageStatus::Failed);
    assert_eq!(report.error.unwrap().name(), "MissingInputError");
}

#[tokio::test]
async fn test_missing_project_path() {
    let registry = Arc::new(DriverRegistry::new());
    let coordinator = coordinator(registry);

    let report = coordinator
        .provision(&StageInputs::new("").with_env("dev"))
        .await;
    assert_eq!(report.status, StageStatus::Failed);
    assert_eq!(report.error.unwrap().name(), "MissingInputError");
}

#[tokio::test]
async fn test_local_env_uses_local_workflow_variant() {
    let dir = TempDir::new().unwrap();
    write_workflow(
        dir.path(),
        r"
version: 1.0.0
provision:
  - uses: cloud/only
",
    );
    fs::write(
        dir.path().join(crate::model::LOCAL_WORKFLOW_FILE),
        r"
version: 1.0.0
provision:
  - uses: local/marker
",
    )
    .unwrap();

    let registry = Arc::new(DriverRegistry::new());
    registry.register("cloud/only", Arc::new(NoOpDriver));
    registry.register(
        "local/marker",
        Arc::new(StaticDriver::new(outputs(&[("LOCAL_MARKER", "yes")]))),
    );

    let coordinator = coordinator(registry);
    let report = coordinator
        .provision(&StageInputs::new(dir.path()).with_env("local"))
        .await;

    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    assert_eq!(report.output.get("LOCAL_MARKER"), Some(&"yes".to_string()));
}

#[tokio::test]
async fn test_parse_failure_reported_as_parse_error() {
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path(), "provision: [unclosed");

    let registry = Arc::new(DriverRegistry::new());
    let coordinator = coordinator(registry);

    let report = coordinator
        .provision(&StageInputs::new(dir.path()).with_env("dev"))
        .await;
    assert_eq!(report.status, StageStatus::Failed);
    assert_eq!(report.error.unwrap().name(), "ParseError");
}
