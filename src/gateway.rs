//! Idempotent reconciliation of the API Gateway front.
//!
//! The gateway converges in dependency order: the REST API itself, the
//! catch-all proxy resource under the root, an `ANY` method on both
//! resources, the invocation role, and a proxy integration per resource.
//! A stage deployment is then published unconditionally, so every
//! successful pass produces a new revision even when nothing else changed.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;

use crate::config::DeployConfig;
use crate::naming;
use crate::progress::Progress;
use crate::provider::{
    ApiRecord, FunctionRecord, GatewayClient, ProviderError, ResourceRecord, RoleClient,
};
use crate::roles::RoleReconciler;

/// Path part of the catch-all proxy resource.
pub const PROXY_PATH_PART: &str = "{proxy+}";

/// Full path of the root resource.
const ROOT_PATH: &str = "/";

/// HTTP method wired on every reconciled resource.
const ANY_METHOD: &str = "ANY";

/// Errors raised while converging the gateway, naming the failing step.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GatewayError {
    /// Raised when the API itself cannot be reconciled or looked up.
    #[error("failed to reconcile the API: {0}")]
    Api(#[source] ProviderError),
    /// Raised when an API exists without a root resource. A freshly created
    /// API always carries one, so this is a configuration inconsistency.
    #[error("API '{api}' has no root resource")]
    MissingRootResource {
        /// Name of the inconsistent API.
        api: String,
    },
    /// Raised when the root resource lookup fails.
    #[error("failed to look up the root resource: {0}")]
    RootResource(#[source] ProviderError),
    /// Raised when the proxy resource cannot be reconciled.
    #[error("failed to reconcile the proxy resource: {0}")]
    ProxyResource(#[source] ProviderError),
    /// Raised when a method cannot be reconciled.
    #[error("failed to reconcile the ANY method on '{path}': {source}")]
    Method {
        /// Path of the resource whose method failed.
        path: String,
        /// Underlying provider failure.
        #[source]
        source: ProviderError,
    },
    /// Raised when the invocation role cannot be reconciled.
    #[error("failed to reconcile the invocation role: {0}")]
    InvocationRole(#[source] ProviderError),
    /// Raised when an integration cannot be reconciled.
    #[error("failed to reconcile the integration on '{path}': {source}")]
    Integration {
        /// Path of the resource whose integration failed.
        path: String,
        /// Underlying provider failure.
        #[source]
        source: ProviderError,
    },
    /// Raised when the stage deployment cannot be created.
    #[error("failed to create the stage deployment: {0}")]
    Deployment(#[source] ProviderError),
    /// Raised when the invoke URL is requested for an API that does not
    /// exist.
    #[error("API '{api}' not found")]
    MissingApi {
        /// Name of the missing API.
        api: String,
    },
}

/// Converges the REST API fronting the function.
pub struct GatewayReconciler<'a, C, P> {
    client: &'a C,
    progress: &'a P,
}

impl<'a, C, P> GatewayReconciler<'a, C, P>
where
    C: GatewayClient + RoleClient,
    P: Progress,
{
    /// Creates a reconciler borrowing the provider client and progress sink.
    #[must_use]
    pub const fn new(client: &'a C, progress: &'a P) -> Self {
        Self { client, progress }
    }

    /// Ensures the API, its resources, methods, integrations, and a fresh
    /// stage deployment exist for the function.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] naming the step that failed; earlier steps
    /// are left as converged.
    pub async fn ensure(
        &self,
        function: &FunctionRecord,
        config: &DeployConfig,
    ) -> Result<(), GatewayError> {
        let api = self.ensure_api(config).await.map_err(GatewayError::Api)?;

        let root = self
            .client
            .find_resource(&api, ROOT_PATH)
            .await
            .map_err(GatewayError::RootResource)?
            .ok_or_else(|| GatewayError::MissingRootResource {
                api: naming::api_name(&config.name),
            })?;

        let proxy = self
            .ensure_proxy(&api, &root, config)
            .await
            .map_err(GatewayError::ProxyResource)?;

        self.ensure_method(&api, &root).await?;
        self.ensure_method(&api, &proxy).await?;

        let root_arn = naming::function_root_arn(&function.arn, &config.name);
        let roles = RoleReconciler::new(self.client, self.progress);
        let role = roles
            .ensure_invocation_role(config, &root_arn)
            .await
            .map_err(GatewayError::InvocationRole)?;

        let uri = naming::integration_uri(&config.region, &root_arn);
        self.ensure_integration(&api, &root, &uri, &role.arn).await?;
        self.ensure_integration(&api, &proxy, &uri, &role.arn).await?;

        self.deploy_stage(&api, config)
            .await
            .map_err(GatewayError::Deployment)
    }

    /// Returns the public URL of the deployed stage.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingApi`] when the API has not been
    /// created, or [`GatewayError::Api`] when the lookup fails.
    pub async fn invoke_url(&self, config: &DeployConfig) -> Result<String, GatewayError> {
        let name = naming::api_name(&config.name);
        let api = self
            .client
            .find_api(&name)
            .await
            .map_err(GatewayError::Api)?
            .ok_or_else(|| GatewayError::MissingApi { api: name.clone() })?;
        Ok(naming::invoke_url(&api.id, &config.region, &config.environment))
    }

    async fn ensure_api(&self, config: &DeployConfig) -> Result<ApiRecord, ProviderError> {
        let name = naming::api_name(&config.name);
        if let Some(api) = self.client.find_api(&name).await? {
            return Ok(api);
        }

        self.progress.note(&format!("Creating API '{name}'"));
        self.client.create_api(&name, &config.description).await
    }

    async fn ensure_proxy(
        &self,
        api: &ApiRecord,
        root: &ResourceRecord,
        config: &DeployConfig,
    ) -> Result<ResourceRecord, ProviderError> {
        let path = format!("/{PROXY_PATH_PART}");
        if let Some(resource) = self.client.find_resource(api, &path).await? {
            return Ok(resource);
        }

        self.progress.note(&format!(
            "Creating proxy resource on '{}'",
            naming::api_name(&config.name)
        ));
        self.client.create_resource(api, root, PROXY_PATH_PART).await
    }

    async fn ensure_method(
        &self,
        api: &ApiRecord,
        resource: &ResourceRecord,
    ) -> Result<(), GatewayError> {
        let existing = self
            .client
            .get_method(api, resource, ANY_METHOD)
            .await
            .map_err(|err| GatewayError::Method {
                path: resource.path.clone(),
                source: err,
            })?;
        if existing.is_some() {
            return Ok(());
        }

        self.progress
            .note(&format!("Creating 'ANY' method on '{}'", resource.path));
        self.client
            .put_method(api, resource, ANY_METHOD)
            .await
            .map_err(|err| GatewayError::Method {
                path: resource.path.clone(),
                source: err,
            })?;
        Ok(())
    }

    async fn ensure_integration(
        &self,
        api: &ApiRecord,
        resource: &ResourceRecord,
        uri: &str,
        credentials: &str,
    ) -> Result<(), GatewayError> {
        let existing = self
            .client
            .get_integration(api, resource, ANY_METHOD)
            .await
            .map_err(|err| GatewayError::Integration {
                path: resource.path.clone(),
                source: err,
            })?;
        if existing.is_some() {
            return Ok(());
        }

        self.progress.note(&format!(
            "Creating integration between Lambda and API on '{}'",
            resource.path
        ));
        self.client
            .put_integration(api, resource, ANY_METHOD, uri, credentials)
            .await
            .map_err(|err| GatewayError::Integration {
                path: resource.path.clone(),
                source: err,
            })?;
        Ok(())
    }

    /// Publishes a stage deployment. Never skipped: every successful pass
    /// produces a new revision carrying the current stage variables.
    async fn deploy_stage(
        &self,
        api: &ApiRecord,
        config: &DeployConfig,
    ) -> Result<(), ProviderError> {
        let variables = stage_variables(config);
        let description = Utc::now().to_rfc2822();
        self.progress
            .note(&format!("Deploying stage '{}'", config.environment));
        self.client
            .create_deployment(api, &config.environment, &description, &variables)
            .await
    }
}

/// Stage variables for the configured environment: the `environment`
/// variable plus any configured overrides, overrides winning on collision.
fn stage_variables(config: &DeployConfig) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();
    variables.insert(String::from("environment"), config.environment.clone());
    if let Some(overrides) = config.variables.get(&config.environment) {
        for (key, value) in overrides {
            variables.insert(key.clone(), value.clone());
        }
    }
    variables
}
