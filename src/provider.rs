//! Client abstractions for the resource families liftoff reconciles.
//!
//! Reconcilers speak to AWS through narrow per-family traits so tests can
//! substitute in-memory doubles. Lookup methods return `Ok(None)` when the
//! resource does not exist; implementations normalise provider "not found"
//! signals into that shape instead of surfacing them as errors. Every other
//! failure propagates untouched to the caller.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Classified failure returned by provider clients.
///
/// Classification happens at the client boundary. Reconcilers branch on the
/// variant and never inspect provider message text.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// The looked-up resource does not exist.
    #[error("{resource}: resource not found")]
    NotFound {
        /// Identification of the missing resource.
        resource: String,
    },
    /// A freshly created role has not propagated far enough to be assumed.
    #[error("role '{role}' cannot be assumed yet")]
    RoleNotPropagated {
        /// ARN of the role awaiting propagation.
        role: String,
    },
    /// Any other provider failure.
    #[error("{operation} failed: {message}")]
    Api {
        /// Provider operation that failed.
        operation: String,
        /// Message reported by the provider.
        message: String,
    },
}

impl ProviderError {
    /// Returns `true` for the absence class of failures.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Maps the absence class of failures to `None`, keeping everything else.
///
/// # Errors
///
/// Returns the original error for any non-absence failure.
pub fn optional<T>(result: Result<T, ProviderError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Function state surfaced after a write or lookup.
///
/// Doubles as the handle passed to the gateway and warm-up reconcilers once
/// the function has converged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionRecord {
    /// Canonical ARN as returned by the provider, possibly version-qualified.
    pub arn: String,
    /// Version published by the most recent write.
    pub version: String,
}

/// Alias state surfaced by a lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AliasRecord {
    /// Alias name (the environment).
    pub name: String,
    /// Version the alias currently targets.
    pub function_version: String,
}

/// Role state surfaced after a write or lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoleRecord {
    /// Role name.
    pub name: String,
    /// Role ARN.
    pub arn: String,
}

/// REST API handle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiRecord {
    /// Provider identifier of the API.
    pub id: String,
}

/// Resource handle within a REST API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRecord {
    /// Provider identifier of the resource.
    pub id: String,
    /// Full resource path, for example `/` or `/{proxy+}`.
    pub path: String,
}

/// Method state surfaced by a lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodRecord {
    /// HTTP method the resource answers to.
    pub http_method: String,
}

/// Integration state surfaced by a lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IntegrationRecord {
    /// Target URI, when the provider reports one.
    pub uri: Option<String>,
}

/// Parameters for creating the function.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionSpec {
    /// Function name (the deployment name).
    pub name: String,
    /// Human description attached to the function.
    pub description: String,
    /// Handler entry point inside the archive.
    pub handler: String,
    /// ARN of the execution role the function assumes.
    pub role_arn: String,
    /// Zip archive holding the server bundle and shim.
    pub archive: Vec<u8>,
}

/// Parameters for granting a caller permission to invoke the alias.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionSpec {
    /// Function the permission is attached to.
    pub function: String,
    /// Statement identifier (the environment).
    pub statement_id: String,
    /// Alias qualifier the permission is scoped to.
    pub qualifier: String,
    /// Service principal being granted access.
    pub principal: String,
    /// ARN of the resource allowed to invoke the alias.
    pub source_arn: String,
}

/// Parameters for the rule target pointing at the function alias.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetSpec {
    /// Target identifier (the environment).
    pub id: String,
    /// Alias-qualified function ARN.
    pub arn: String,
    /// Invocation payload delivered on each firing.
    pub input: String,
}

/// Lambda operations used by the function and warm-up reconcilers.
pub trait FunctionClient {
    /// Looks the function up by name.
    fn get_function<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<FunctionRecord>>;

    /// Creates the function and publishes its first version.
    fn create_function<'a>(&'a self, spec: &'a FunctionSpec) -> ProviderFuture<'a, FunctionRecord>;

    /// Replaces the function code and publishes a new version.
    fn update_function_code<'a>(
        &'a self,
        name: &'a str,
        archive: &'a [u8],
    ) -> ProviderFuture<'a, FunctionRecord>;

    /// Looks the alias up by name.
    fn get_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
    ) -> ProviderFuture<'a, Option<AliasRecord>>;

    /// Creates the alias pointing at the given version.
    fn create_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
        version: &'a str,
    ) -> ProviderFuture<'a, ()>;

    /// Retargets the alias at the given version.
    fn update_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
        version: &'a str,
    ) -> ProviderFuture<'a, ()>;

    /// Grants the described caller permission to invoke the alias.
    fn add_permission<'a>(&'a self, spec: &'a PermissionSpec) -> ProviderFuture<'a, ()>;

    /// Revokes a previously granted permission statement.
    fn remove_permission<'a>(
        &'a self,
        function: &'a str,
        statement_id: &'a str,
        qualifier: &'a str,
    ) -> ProviderFuture<'a, ()>;
}

/// IAM operations used by the trust role reconciler.
pub trait RoleClient {
    /// Looks the role up by name.
    fn get_role<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<RoleRecord>>;

    /// Creates the role with the given trust policy document.
    fn create_role<'a>(
        &'a self,
        name: &'a str,
        trust_policy: &'a str,
    ) -> ProviderFuture<'a, RoleRecord>;

    /// Attaches an inline policy document to the role.
    fn put_role_policy<'a>(
        &'a self,
        role: &'a str,
        policy_name: &'a str,
        policy: &'a str,
    ) -> ProviderFuture<'a, ()>;
}

/// API Gateway operations used by the gateway reconciler.
pub trait GatewayClient {
    /// Looks a REST API up by exact name.
    fn find_api<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<ApiRecord>>;

    /// Creates a REST API.
    fn create_api<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, ApiRecord>;

    /// Looks a resource up by its full path.
    fn find_resource<'a>(
        &'a self,
        api: &'a ApiRecord,
        path: &'a str,
    ) -> ProviderFuture<'a, Option<ResourceRecord>>;

    /// Creates a resource under the given parent.
    fn create_resource<'a>(
        &'a self,
        api: &'a ApiRecord,
        parent: &'a ResourceRecord,
        path_part: &'a str,
    ) -> ProviderFuture<'a, ResourceRecord>;

    /// Looks a method up on the given resource.
    fn get_method<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, Option<MethodRecord>>;

    /// Creates an unauthenticated method on the given resource.
    fn put_method<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, MethodRecord>;

    /// Looks the integration up on the given resource method.
    fn get_integration<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, Option<IntegrationRecord>>;

    /// Creates a proxy-passthrough integration on the given resource method.
    fn put_integration<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
        uri: &'a str,
        credentials: &'a str,
    ) -> ProviderFuture<'a, IntegrationRecord>;

    /// Publishes a new stage deployment carrying the given variables.
    fn create_deployment<'a>(
        &'a self,
        api: &'a ApiRecord,
        stage: &'a str,
        description: &'a str,
        variables: &'a BTreeMap<String, String>,
    ) -> ProviderFuture<'a, ()>;
}

/// Scheduled-event operations used by the warm-up reconciler.
pub trait ScheduleClient {
    /// Creates or updates the recurring rule and returns its ARN.
    fn put_rule<'a>(&'a self, name: &'a str, schedule: &'a str) -> ProviderFuture<'a, String>;

    /// Attaches the given target to the rule, replacing any previous target
    /// with the same identifier.
    fn put_targets<'a>(&'a self, rule: &'a str, target: &'a TargetSpec)
    -> ProviderFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_converts_absence_to_none() {
        let result: Result<u8, ProviderError> = Err(ProviderError::NotFound {
            resource: String::from("lambda.GetFunction"),
        });
        assert_eq!(optional(result), Ok(None));
    }

    #[test]
    fn optional_passes_values_through() {
        assert_eq!(optional(Ok(7u8)), Ok(Some(7)));
    }

    #[test]
    fn optional_propagates_other_failures() {
        let error = ProviderError::Api {
            operation: String::from("lambda.GetFunction"),
            message: String::from("quota exceeded"),
        };
        let result: Result<u8, ProviderError> = Err(error.clone());
        assert_eq!(optional(result), Err(error));
    }

    #[test]
    fn propagation_errors_are_not_absence() {
        let error = ProviderError::RoleNotPropagated {
            role: String::from("arn:aws:iam::123456789012:role/orbit-lambda-role"),
        };
        assert!(!error.is_not_found());
    }
}
