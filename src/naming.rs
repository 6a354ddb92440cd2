//! Deterministic resource names and reference rewriting.
//!
//! Every AWS resource liftoff manages derives its name from the deployment
//! name (and environment), so reconciliation can match existing resources by
//! exact name and never has to guess. The rewriting helpers convert the
//! version-qualified function ARN into the forms expected by the services
//! that reference it.

/// IAM path under which both trust roles are created.
pub const SERVICE_ROLE_PATH: &str = "/service-role/";

/// Name of the REST API fronting the function.
#[must_use]
pub fn api_name(name: &str) -> String {
    format!("{name}-api")
}

/// Name of the role the function assumes while executing.
#[must_use]
pub fn execution_role_name(name: &str) -> String {
    format!("{name}-lambda-role")
}

/// Name of the role the gateway assumes to invoke the function.
#[must_use]
pub fn invocation_role_name(name: &str) -> String {
    format!("{name}-api-role")
}

/// Name of the inline policy granting the execution role log access.
#[must_use]
pub fn log_policy_name(name: &str) -> String {
    format!("{name}-log-access")
}

/// Name of the inline policy granting the invocation role invoke access.
#[must_use]
pub fn invoke_policy_name(name: &str) -> String {
    format!("{name}-api-lambda-invoke-access")
}

/// Name of the scheduled warm-up rule for one environment.
#[must_use]
pub fn warmer_rule_name(name: &str, environment: &str) -> String {
    format!("{name}-{environment}-warmer")
}

/// Strips the trailing version segment from a function ARN.
///
/// ARNs returned after publishing end in `:<name>:<version>`; services that
/// resolve versions through an alias need the unversioned form. The ARN is
/// truncated after the last occurrence of the deployment name, so a name
/// that also appears earlier in the ARN is handled correctly. An ARN without
/// a version suffix is returned unchanged.
#[must_use]
pub fn function_root_arn(arn: &str, name: &str) -> String {
    let mut root = arn.to_owned();
    if let Some(index) = arn.rfind(name) {
        root.truncate(index + name.len());
    }
    root
}

/// Alias-qualified ARN, used where the alias itself is the invocation target.
#[must_use]
pub fn alias_arn(root_arn: &str, environment: &str) -> String {
    format!("{root_arn}:{environment}")
}

/// Integration URI wiring an API Gateway method to the function.
///
/// The `${stageVariables.environment}` placeholder must be emitted
/// literally; the stage resolves it to the alias at invocation time.
#[must_use]
pub fn integration_uri(region: &str, root_arn: &str) -> String {
    format!(
        "arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{root_arn}:${{stageVariables.environment}}/invocations"
    )
}

/// Public URL of the deployed stage.
#[must_use]
pub fn invoke_url(api_id: &str, region: &str, environment: &str) -> String {
    format!("https://{api_id}.execute-api.{region}.amazonaws.com/{environment}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const VERSIONED_ARN: &str = "arn:aws:lambda:eu-central-1:123456789012:function:orbit:7";

    #[test]
    fn root_arn_strips_the_version_suffix() {
        let root = function_root_arn(VERSIONED_ARN, "orbit");
        assert_eq!(
            root,
            "arn:aws:lambda:eu-central-1:123456789012:function:orbit"
        );
    }

    #[test]
    fn root_arn_is_identity_without_a_version_suffix() {
        let unversioned = "arn:aws:lambda:eu-central-1:123456789012:function:orbit";
        assert_eq!(function_root_arn(unversioned, "orbit"), unversioned);
    }

    #[test]
    fn root_arn_truncates_after_the_last_occurrence() {
        // A deployment named after the service itself appears twice in the
        // ARN; only the function segment may anchor the truncation.
        let arn = "arn:aws:lambda:eu-central-1:123456789012:function:lambda:3";
        assert_eq!(
            function_root_arn(arn, "lambda"),
            "arn:aws:lambda:eu-central-1:123456789012:function:lambda"
        );
    }

    #[test]
    fn root_arn_leaves_foreign_arns_alone() {
        let arn = "arn:aws:lambda:eu-central-1:123456789012:function:other:1";
        assert_eq!(function_root_arn(arn, "orbit"), arn);
    }

    #[test]
    fn integration_uri_keeps_the_stage_variable_placeholder_literal() {
        let uri = integration_uri(
            "eu-central-1",
            "arn:aws:lambda:eu-central-1:123456789012:function:orbit",
        );
        assert_eq!(
            uri,
            "arn:aws:apigateway:eu-central-1:lambda:path/2015-03-31/functions/arn:aws:lambda:eu-central-1:123456789012:function:orbit:${stageVariables.environment}/invocations"
        );
    }

    #[test]
    fn alias_arn_appends_the_environment() {
        let root = "arn:aws:lambda:eu-central-1:123456789012:function:orbit";
        assert_eq!(alias_arn(root, "staging"), format!("{root}:staging"));
    }

    #[test]
    fn invoke_url_names_the_stage() {
        assert_eq!(
            invoke_url("abc123", "eu-central-1", "staging"),
            "https://abc123.execute-api.eu-central-1.amazonaws.com/staging"
        );
    }

    #[rstest]
    #[case(api_name("orbit"), "orbit-api")]
    #[case(execution_role_name("orbit"), "orbit-lambda-role")]
    #[case(invocation_role_name("orbit"), "orbit-api-role")]
    #[case(log_policy_name("orbit"), "orbit-log-access")]
    #[case(invoke_policy_name("orbit"), "orbit-api-lambda-invoke-access")]
    #[case(warmer_rule_name("orbit", "staging"), "orbit-staging-warmer")]
    fn derived_names_follow_the_conventions(#[case] actual: String, #[case] expected: &str) {
        assert_eq!(actual, expected);
    }
}
