//! Behaviour tests for the function reconciler and its retry loop.

#[path = "common/test_config.rs"]
mod test_config;

use std::time::Duration;

use liftoff::test_support::{FakeProvider, RecordingProgress};
use liftoff::{FunctionError, FunctionReconciler, ProviderError};

use test_config::{APP_NAME, ENVIRONMENT, test_config};

const ARCHIVE: &[u8] = b"zip-bytes";

#[tokio::test]
async fn missing_function_is_created_with_its_execution_role() {
    let provider = FakeProvider::new();
    let progress = RecordingProgress::new();
    let reconciler = FunctionReconciler::new(&provider, &progress);

    let record = reconciler
        .create_or_update(&test_config(), ARCHIVE)
        .await
        .expect("creation succeeds");

    assert_eq!(record.version, "1");
    assert_eq!(provider.role_names(), [format!("{APP_NAME}-lambda-role")]);
    assert_eq!(
        provider.alias_target(APP_NAME, ENVIRONMENT),
        Some(String::from("1"))
    );
    let lines = progress.lines();
    assert!(lines.iter().any(|line| line.contains("Creating function")));
    assert!(lines.iter().any(|line| line.contains("Creating alias")));
}

#[tokio::test]
async fn existing_function_gets_its_code_updated_in_place() {
    let provider = FakeProvider::new();
    provider.seed_function(APP_NAME);
    let progress = RecordingProgress::new();
    let reconciler = FunctionReconciler::new(&provider, &progress);

    let record = reconciler
        .create_or_update(&test_config(), ARCHIVE)
        .await
        .expect("update succeeds");

    assert_eq!(record.version, "2");
    // The update path never touches the execution role.
    assert!(provider.role_names().is_empty());
    assert!(provider.create_function_instants().is_empty());
}

#[tokio::test]
async fn alias_is_moved_to_the_newly_published_version() {
    let provider = FakeProvider::new();
    let config = test_config();
    let progress = RecordingProgress::new();

    FunctionReconciler::new(&provider, &progress)
        .create_or_update(&config, ARCHIVE)
        .await
        .expect("first pass succeeds");
    FunctionReconciler::new(&provider, &progress)
        .create_or_update(&config, ARCHIVE)
        .await
        .expect("second pass succeeds");

    assert_eq!(
        provider.alias_target(APP_NAME, ENVIRONMENT),
        Some(String::from("2"))
    );
    let lines = progress.lines();
    assert!(
        lines
            .iter()
            .any(|line| line.contains("Updating alias") && line.contains("version 2")),
        "expected an alias update note: {lines:?}"
    );
}

#[tokio::test]
async fn creation_retries_until_the_role_propagates() {
    let provider = FakeProvider::new();
    provider.fail_role_propagation(2);
    let progress = RecordingProgress::new();
    let delay = Duration::from_millis(20);
    let reconciler = FunctionReconciler::new(&provider, &progress).with_propagation_delay(delay);

    let record = reconciler
        .create_or_update(&test_config(), ARCHIVE)
        .await
        .expect("creation eventually succeeds");

    assert_eq!(record.version, "1");
    let instants = provider.create_function_instants();
    assert_eq!(instants.len(), 3);
    for pair in instants.windows(2) {
        let [earlier, later] = pair else {
            panic!("windows(2) yields pairs");
        };
        assert!(
            later.duration_since(*earlier) >= delay,
            "retries must respect the fixed delay"
        );
    }
}

#[tokio::test]
async fn retries_stop_at_the_attempt_ceiling() {
    let provider = FakeProvider::new();
    provider.fail_role_propagation(10);
    let progress = RecordingProgress::new();
    let reconciler = FunctionReconciler::new(&provider, &progress)
        .with_propagation_delay(Duration::from_millis(1))
        .with_propagation_attempts(3);

    let error = reconciler
        .create_or_update(&test_config(), ARCHIVE)
        .await
        .expect_err("retries must be bounded");

    assert!(matches!(
        error,
        FunctionError::RolePropagationTimeout { attempts: 3, .. }
    ));
    assert_eq!(provider.create_function_instants().len(), 3);
}

#[tokio::test]
async fn non_propagation_failures_abort_immediately() {
    let provider = FakeProvider::new();
    provider.fail_operation(
        "create_function",
        ProviderError::Api {
            operation: String::from("lambda.CreateFunction"),
            message: String::from("code storage limit exceeded"),
        },
    );
    let progress = RecordingProgress::new();
    let reconciler = FunctionReconciler::new(&provider, &progress)
        .with_propagation_delay(Duration::from_millis(1));

    let error = reconciler
        .create_or_update(&test_config(), ARCHIVE)
        .await
        .expect_err("provider failures propagate");

    assert!(matches!(error, FunctionError::Provider(ProviderError::Api { .. })));
}
