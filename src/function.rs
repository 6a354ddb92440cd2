//! Idempotent reconciliation of the Lambda function and its alias.
//!
//! A missing function is created from the packaged archive (resolving its
//! execution role first); an existing one gets its code replaced in place.
//! Both paths publish a new version, and the environment alias is then
//! created at, or moved to, exactly that version.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::config::DeployConfig;
use crate::progress::Progress;
use crate::provider::{FunctionClient, FunctionRecord, FunctionSpec, ProviderError, RoleClient};
use crate::roles::RoleReconciler;
use crate::shim;

const ROLE_PROPAGATION_DELAY: Duration = Duration::from_secs(3);
const ROLE_PROPAGATION_ATTEMPTS: u32 = 20;

/// Errors raised while converging the function.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FunctionError {
    /// Raised when a provider call fails.
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),
    /// Raised when the execution role never becomes assumable.
    #[error("role '{role}' was not assumable after {attempts} attempts")]
    RolePropagationTimeout {
        /// Role that failed to propagate.
        role: String,
        /// Number of create attempts issued.
        attempts: u32,
    },
}

/// Converges the function and its environment alias.
pub struct FunctionReconciler<'a, C, P> {
    client: &'a C,
    progress: &'a P,
    propagation_delay: Duration,
    propagation_attempts: u32,
}

impl<'a, C, P> FunctionReconciler<'a, C, P>
where
    C: FunctionClient + RoleClient,
    P: Progress,
{
    /// Creates a reconciler borrowing the provider client and progress sink.
    #[must_use]
    pub const fn new(client: &'a C, progress: &'a P) -> Self {
        Self {
            client,
            progress,
            propagation_delay: ROLE_PROPAGATION_DELAY,
            propagation_attempts: ROLE_PROPAGATION_ATTEMPTS,
        }
    }

    /// Overrides the delay between role-propagation retries.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    /// Overrides the role-propagation retry ceiling.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_propagation_attempts(mut self, attempts: u32) -> Self {
        self.propagation_attempts = attempts;
        self
    }

    /// Creates or updates the function from the packaged archive, publishes
    /// a new version, and points the environment alias at it.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::RolePropagationTimeout`] when the freshly
    /// created execution role never becomes assumable, and
    /// [`FunctionError::Provider`] for any other failing call.
    pub async fn create_or_update(
        &self,
        config: &DeployConfig,
        archive: &[u8],
    ) -> Result<FunctionRecord, FunctionError> {
        let existing = self.client.get_function(&config.name).await?;
        let record = if existing.is_some() {
            self.progress
                .note(&format!("Updating function '{}'", config.name));
            self.client
                .update_function_code(&config.name, archive)
                .await?
        } else {
            let roles = RoleReconciler::new(self.client, self.progress);
            let role = roles.ensure_execution_role(config).await?;
            self.progress
                .note(&format!("Creating function '{}'", config.name));
            self.create_with_retry(config, archive, &role.arn).await?
        };

        self.reconcile_alias(config, &record).await?;
        Ok(record)
    }

    /// Issues the create call, retrying while the execution role propagates.
    ///
    /// A brand-new role is rejected by Lambda until it is visible to the
    /// service, so the same call is repeated after a fixed delay up to the
    /// attempt ceiling.
    async fn create_with_retry(
        &self,
        config: &DeployConfig,
        archive: &[u8],
        role_arn: &str,
    ) -> Result<FunctionRecord, FunctionError> {
        let spec = FunctionSpec {
            name: config.name.clone(),
            description: config.description.clone(),
            handler: shim::SHIM_HANDLER.to_owned(),
            role_arn: role_arn.to_owned(),
            archive: archive.to_vec(),
        };

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.client.create_function(&spec).await {
                Ok(record) => return Ok(record),
                Err(ProviderError::RoleNotPropagated { role }) => {
                    if attempts >= self.propagation_attempts {
                        return Err(FunctionError::RolePropagationTimeout { role, attempts });
                    }
                    self.progress.note(&format!(
                        "Role '{role}' is not ready yet, retrying in {}s",
                        self.propagation_delay.as_secs()
                    ));
                    sleep(self.propagation_delay).await;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    async fn reconcile_alias(
        &self,
        config: &DeployConfig,
        record: &FunctionRecord,
    ) -> Result<(), FunctionError> {
        let existing = self
            .client
            .get_alias(&config.name, &config.environment)
            .await?;

        if existing.is_some() {
            self.progress.note(&format!(
                "Updating alias '{}' to point to version {}",
                config.environment, record.version
            ));
            self.client
                .update_alias(&config.name, &config.environment, &record.version)
                .await?;
        } else {
            self.progress.note(&format!(
                "Creating alias '{}' at version {}",
                config.environment, record.version
            ));
            self.client
                .create_alias(&config.name, &config.environment, &record.version)
                .await?;
        }
        Ok(())
    }
}
