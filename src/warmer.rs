//! Idempotent reconciliation of the scheduled warm-up trigger.
//!
//! A once-per-minute rule fires a synthetic gateway event at the function
//! alias so the underlying server process stays resident between real
//! invocations. Convergence runs rule → permission → target; the permission
//! is revoked and re-granted so repeated passes never accumulate statements.

use serde_json::json;
use thiserror::Error;

use crate::config::DeployConfig;
use crate::naming;
use crate::progress::Progress;
use crate::provider::{
    FunctionClient, FunctionRecord, PermissionSpec, ProviderError, ScheduleClient, TargetSpec,
};

/// Schedule on which the warm-up event fires.
const WARMER_SCHEDULE: &str = "rate(1 minute)";

/// Service principal granted permission to invoke the alias.
const EVENTS_PRINCIPAL: &str = "events.amazonaws.com";

/// Errors raised while converging the warm-up trigger.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WarmerError {
    /// Raised when the schedule rule cannot be reconciled.
    #[error("failed to reconcile the warm-up rule: {0}")]
    Rule(#[source] ProviderError),
    /// Raised when granting the rule invoke access fails.
    #[error("failed to grant the warm-up rule invoke access: {0}")]
    Permission(#[source] ProviderError),
    /// Raised when attaching the alias as the rule target fails.
    #[error("failed to attach the function as the rule target: {0}")]
    Target(#[source] ProviderError),
}

/// Converges the scheduled warm-up trigger for the function alias.
pub struct WarmerReconciler<'a, C, P> {
    client: &'a C,
    progress: &'a P,
}

impl<'a, C, P> WarmerReconciler<'a, C, P>
where
    C: ScheduleClient + FunctionClient,
    P: Progress,
{
    /// Creates a reconciler borrowing the provider client and progress sink.
    #[must_use]
    pub const fn new(client: &'a C, progress: &'a P) -> Self {
        Self { client, progress }
    }

    /// Ensures the recurring rule, its invoke permission, and the alias
    /// target exist for the function.
    ///
    /// # Errors
    ///
    /// Returns [`WarmerError`] naming the step that failed.
    pub async fn ensure(
        &self,
        function: &FunctionRecord,
        config: &DeployConfig,
    ) -> Result<(), WarmerError> {
        let rule_name = naming::warmer_rule_name(&config.name, &config.environment);
        let rule_arn = self
            .client
            .put_rule(&rule_name, WARMER_SCHEDULE)
            .await
            .map_err(WarmerError::Rule)?;
        self.progress
            .note(&format!("Scheduling warm-up rule '{rule_name}'"));

        self.grant_invoke(&rule_arn, config)
            .await
            .map_err(WarmerError::Permission)?;
        self.attach_target(function, &rule_name, config)
            .await
            .map_err(WarmerError::Target)
    }

    /// Revokes any prior grant under the environment statement id, then
    /// grants a fresh one scoped to the rule and alias. The revoke may fail
    /// when no statement exists yet; that outcome is ignored.
    async fn grant_invoke(
        &self,
        rule_arn: &str,
        config: &DeployConfig,
    ) -> Result<(), ProviderError> {
        self.client
            .remove_permission(&config.name, &config.environment, &config.environment)
            .await
            .ok();

        let spec = PermissionSpec {
            function: config.name.clone(),
            statement_id: config.environment.clone(),
            qualifier: config.environment.clone(),
            principal: EVENTS_PRINCIPAL.to_owned(),
            source_arn: rule_arn.to_owned(),
        };
        self.client.add_permission(&spec).await
    }

    async fn attach_target(
        &self,
        function: &FunctionRecord,
        rule_name: &str,
        config: &DeployConfig,
    ) -> Result<(), ProviderError> {
        let root = naming::function_root_arn(&function.arn, &config.name);
        let target = TargetSpec {
            id: config.environment.clone(),
            arn: naming::alias_arn(&root, &config.environment),
            input: warm_event_payload(&config.environment),
        };
        self.client.put_targets(rule_name, &target).await
    }
}

/// Synthetic invocation event delivered on each firing. It mimics an HTTP
/// GET to `/` carrying the environment stage variable, so the shim proxies
/// it like any real gateway request.
fn warm_event_payload(environment: &str) -> String {
    json!({
        "resource": "/{proxy+}",
        "path": "/",
        "httpMethod": "GET",
        "stageVariables": {
            "environment": environment
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn warm_event_mimics_a_root_get_request() {
        let payload: Value =
            serde_json::from_str(&warm_event_payload("staging")).expect("payload must be JSON");
        assert_eq!(payload["httpMethod"], "GET");
        assert_eq!(payload["path"], "/");
        assert_eq!(payload["resource"], "/{proxy+}");
        assert_eq!(payload["stageVariables"]["environment"], "staging");
    }
}
