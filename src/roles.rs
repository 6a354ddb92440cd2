//! Idempotent reconciliation of the IAM trust roles.
//!
//! Two roles back every deployment: the execution role the function assumes
//! while running, and the invocation role the gateway assumes to call the
//! function. Roles are matched by deterministic name; an existing role is
//! returned untouched, and policies are only attached when the role is first
//! created.

use serde_json::json;

use crate::config::DeployConfig;
use crate::naming;
use crate::progress::Progress;
use crate::provider::{ProviderError, RoleClient, RoleRecord};

/// Ensures the execution and invocation roles exist with their policies.
pub struct RoleReconciler<'a, C, P> {
    client: &'a C,
    progress: &'a P,
}

impl<'a, C, P> RoleReconciler<'a, C, P>
where
    C: RoleClient,
    P: Progress,
{
    /// Creates a reconciler borrowing the provider client and progress sink.
    #[must_use]
    pub const fn new(client: &'a C, progress: &'a P) -> Self {
        Self { client, progress }
    }

    /// Returns the function execution role, creating it together with its
    /// logging policy when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when a lookup or create call fails.
    pub async fn ensure_execution_role(
        &self,
        config: &DeployConfig,
    ) -> Result<RoleRecord, ProviderError> {
        let name = naming::execution_role_name(&config.name);
        if let Some(role) = self.client.get_role(&name).await? {
            return Ok(role);
        }

        self.progress.note(&format!("Creating service role '{name}'"));
        let role = self.client.create_role(&name, &execution_trust_policy()).await?;
        self.client
            .put_role_policy(
                &role.name,
                &naming::log_policy_name(&config.name),
                &log_access_policy(&config.region, &config.name),
            )
            .await?;
        Ok(role)
    }

    /// Returns the gateway invocation role, creating it scoped to the given
    /// function when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when a lookup or create call fails.
    pub async fn ensure_invocation_role(
        &self,
        config: &DeployConfig,
        function_root_arn: &str,
    ) -> Result<RoleRecord, ProviderError> {
        let name = naming::invocation_role_name(&config.name);
        if let Some(role) = self.client.get_role(&name).await? {
            return Ok(role);
        }

        self.progress.note(&format!("Creating service role '{name}'"));
        let role = self.client.create_role(&name, &invocation_trust_policy()).await?;
        self.client
            .put_role_policy(
                &role.name,
                &naming::invoke_policy_name(&config.name),
                &invoke_access_policy(function_root_arn),
            )
            .await?;
        Ok(role)
    }
}

fn trust_policy(service: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Service": service },
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}

fn execution_trust_policy() -> String {
    trust_policy("lambda.amazonaws.com")
}

fn invocation_trust_policy() -> String {
    trust_policy("apigateway.amazonaws.com")
}

/// Grants log-group creation in the region and write access to the log
/// streams under the function's log group.
fn log_access_policy(region: &str, name: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": "logs:CreateLogGroup",
                "Resource": format!("arn:aws:logs:{region}:*:*")
            },
            {
                "Effect": "Allow",
                "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                "Resource": [format!("arn:aws:logs:{region}:*:log-group:/aws/lambda/{name}:*")]
            }
        ]
    })
    .to_string()
}

/// Grants invocation of every version and alias of the function.
fn invoke_access_policy(function_root_arn: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Resource": [format!("{function_root_arn}:*")],
                "Action": ["lambda:InvokeFunction"]
            }
        ]
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(document: &str) -> Value {
        serde_json::from_str(document).expect("policy documents must be valid JSON")
    }

    #[test]
    fn execution_trust_policy_names_the_lambda_principal() {
        let policy = parse(&execution_trust_policy());
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }

    #[test]
    fn invocation_trust_policy_names_the_gateway_principal() {
        let policy = parse(&invocation_trust_policy());
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "apigateway.amazonaws.com"
        );
    }

    #[test]
    fn log_policy_scopes_streams_to_the_function_log_group() {
        let policy = parse(&log_access_policy("eu-central-1", "orbit"));
        assert_eq!(
            policy["Statement"][0]["Resource"],
            "arn:aws:logs:eu-central-1:*:*"
        );
        assert_eq!(
            policy["Statement"][1]["Resource"][0],
            "arn:aws:logs:eu-central-1:*:log-group:/aws/lambda/orbit:*"
        );
    }

    #[test]
    fn invoke_policy_covers_every_version_of_the_function() {
        let arn = "arn:aws:lambda:eu-central-1:123456789012:function:orbit";
        let policy = parse(&invoke_access_policy(arn));
        assert_eq!(policy["Statement"][0]["Resource"][0], format!("{arn}:*"));
        assert_eq!(policy["Statement"][0]["Action"][0], "lambda:InvokeFunction");
    }
}
