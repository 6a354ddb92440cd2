//! Behaviour tests for the API Gateway reconciler.

#[path = "common/test_config.rs"]
mod test_config;

use std::collections::BTreeMap;

use liftoff::test_support::{FakeProvider, RecordingProgress};
use liftoff::{FunctionRecord, GatewayError, GatewayReconciler, naming};

use test_config::{APP_NAME, ENVIRONMENT, REGION, test_config};

fn function() -> FunctionRecord {
    FunctionRecord {
        arn: format!("arn:aws:lambda:{REGION}:123456789012:function:{APP_NAME}:1"),
        version: String::from("1"),
    }
}

#[tokio::test]
async fn first_pass_wires_root_and_proxy_to_the_function() {
    let provider = FakeProvider::new();
    let progress = RecordingProgress::new();
    let reconciler = GatewayReconciler::new(&provider, &progress);

    reconciler
        .ensure(&function(), &test_config())
        .await
        .expect("gateway converges");

    let mut paths = provider.resource_paths();
    paths.sort();
    assert_eq!(paths, ["/", "/{proxy+}"]);
    assert_eq!(provider.method_count(), 2);

    let integrations = provider.integrations();
    assert_eq!(integrations.len(), 2);
    let root_arn = format!("arn:aws:lambda:{REGION}:123456789012:function:{APP_NAME}");
    let expected_uri = naming::integration_uri(REGION, &root_arn);
    for integration in &integrations {
        assert_eq!(integration.uri, expected_uri);
        assert!(integration.credentials.contains(&format!("{APP_NAME}-api-role")));
    }
    assert!(expected_uri.contains("${stageVariables.environment}"));
}

#[tokio::test]
async fn second_pass_reuses_everything_but_publishes_a_new_deployment() {
    let provider = FakeProvider::new();
    let progress = RecordingProgress::new();
    let config = test_config();

    GatewayReconciler::new(&provider, &progress)
        .ensure(&function(), &config)
        .await
        .expect("first pass converges");

    let second_progress = RecordingProgress::new();
    GatewayReconciler::new(&provider, &second_progress)
        .ensure(&function(), &config)
        .await
        .expect("second pass converges");

    assert_eq!(provider.api_names().len(), 1);
    assert_eq!(provider.resource_paths().len(), 2);
    assert_eq!(provider.method_count(), 2);
    assert_eq!(provider.integrations().len(), 2);
    assert_eq!(provider.deployments().len(), 2);

    let lines = second_progress.lines();
    assert!(
        lines.iter().all(|line| !line.starts_with("Creating")),
        "second pass should reuse resources: {lines:?}"
    );
}

#[tokio::test]
async fn deployment_carries_the_environment_and_overrides() {
    let provider = FakeProvider::new();
    let progress = RecordingProgress::new();

    let mut overrides = BTreeMap::new();
    overrides.insert(String::from("database"), String::from("staging-db"));
    let mut config = test_config();
    config
        .variables
        .insert(String::from(ENVIRONMENT), overrides);

    GatewayReconciler::new(&provider, &progress)
        .ensure(&function(), &config)
        .await
        .expect("gateway converges");

    let deployments = provider.deployments();
    let deployment = deployments.first().expect("one deployment");
    assert_eq!(deployment.stage, ENVIRONMENT);
    assert_eq!(
        deployment.variables.get("environment").map(String::as_str),
        Some(ENVIRONMENT)
    );
    assert_eq!(
        deployment.variables.get("database").map(String::as_str),
        Some("staging-db")
    );
    assert!(!deployment.description.is_empty());
}

#[tokio::test]
async fn an_api_without_a_root_resource_is_fatal() {
    let provider = FakeProvider::new();
    provider.omit_root_resource();
    let progress = RecordingProgress::new();

    let error = GatewayReconciler::new(&provider, &progress)
        .ensure(&function(), &test_config())
        .await
        .expect_err("missing root must fail");

    assert!(matches!(error, GatewayError::MissingRootResource { .. }));
}

#[tokio::test]
async fn invoke_url_names_the_api_and_stage() {
    let provider = FakeProvider::new();
    let progress = RecordingProgress::new();
    let config = test_config();
    let reconciler = GatewayReconciler::new(&provider, &progress);

    reconciler
        .ensure(&function(), &config)
        .await
        .expect("gateway converges");
    let url = reconciler
        .invoke_url(&config)
        .await
        .expect("invoke URL resolves");

    assert_eq!(
        url,
        format!("https://api-1.execute-api.{REGION}.amazonaws.com/{ENVIRONMENT}")
    );
}

#[tokio::test]
async fn invoke_url_requires_the_api_to_exist() {
    let provider = FakeProvider::new();
    let progress = RecordingProgress::new();

    let error = GatewayReconciler::new(&provider, &progress)
        .invoke_url(&test_config())
        .await
        .expect_err("missing API must fail");

    assert!(matches!(error, GatewayError::MissingApi { .. }));
}
