//! End-to-end deployment coordination.
//!
//! The deployer sequences the packager and the reconcilers in dependency
//! order: artifact → function and alias → gateway → warm-up trigger. There
//! is no coordinator-level retry and no rollback; the first failure aborts
//! the pass with the step context, leaving already-converged resources in
//! place. The whole pass runs under a deadline so a wedged provider call
//! cannot hang a deployment forever.

use std::time::Duration;

use camino::Utf8Path;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::DeployConfig;
use crate::function::{FunctionError, FunctionReconciler};
use crate::gateway::{GatewayError, GatewayReconciler};
use crate::package::{self, PackageError};
use crate::progress::Progress;
use crate::provider::{FunctionClient, FunctionRecord, GatewayClient, RoleClient, ScheduleClient};
use crate::warmer::{WarmerError, WarmerReconciler};

const PASS_DEADLINE: Duration = Duration::from_secs(900);

/// Errors surfaced while performing a deployment pass.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeployError {
    /// Raised when packaging the artifact fails.
    #[error("failed to package the artifact: {0}")]
    Package(#[from] PackageError),
    /// Raised when the function or its alias cannot be converged.
    #[error("failed to converge the function: {0}")]
    Function(#[from] FunctionError),
    /// Raised when the gateway cannot be converged.
    #[error("failed to converge the API gateway: {0}")]
    Gateway(#[from] GatewayError),
    /// Raised when the warm-up trigger cannot be converged.
    #[error("failed to converge the warm-up trigger: {0}")]
    Warmer(#[from] WarmerError),
    /// Raised when the pass exceeds its deadline.
    #[error("deployment did not finish within {seconds} seconds")]
    DeadlineExceeded {
        /// Configured deadline in seconds.
        seconds: u64,
    },
}

/// Outcome of a successful deployment pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeployOutcome {
    /// Converged function, carrying the version published by this pass.
    pub function: FunctionRecord,
    /// Public URL of the deployed stage.
    pub invoke_url: String,
}

/// Sequences the packager and reconcilers over one provider.
#[derive(Debug)]
pub struct Deployer<B, P> {
    backend: B,
    progress: P,
    pass_deadline: Duration,
}

impl<B, P> Deployer<B, P>
where
    B: FunctionClient + RoleClient + GatewayClient + ScheduleClient,
    P: Progress,
{
    /// Creates a deployer over the given provider and progress sink.
    #[must_use]
    pub const fn new(backend: B, progress: P) -> Self {
        Self {
            backend,
            progress,
            pass_deadline: PASS_DEADLINE,
        }
    }

    /// Overrides the per-pass deadline.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_pass_deadline(mut self, deadline: Duration) -> Self {
        self.pass_deadline = deadline;
        self
    }

    /// Runs one deployment pass and returns the converged outcome.
    ///
    /// Packaging happens first so a broken workspace fails before any
    /// provider call; the function and alias converge next so the gateway
    /// and warm-up trigger can reference the published version.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError`] naming the step that failed, or
    /// [`DeployError::DeadlineExceeded`] when the pass overruns its
    /// deadline. Resources converged before the failure are left in place.
    pub async fn execute(
        &self,
        config: &DeployConfig,
        workspace: &Utf8Path,
    ) -> Result<DeployOutcome, DeployError> {
        let seconds = self.pass_deadline.as_secs();
        timeout(self.pass_deadline, self.converge(config, workspace))
            .await
            .map_err(|_elapsed| DeployError::DeadlineExceeded { seconds })?
    }

    async fn converge(
        &self,
        config: &DeployConfig,
        workspace: &Utf8Path,
    ) -> Result<DeployOutcome, DeployError> {
        let archive = package::archive_workspace(workspace, config.port)?;

        let functions = FunctionReconciler::new(&self.backend, &self.progress);
        let function = functions.create_or_update(config, &archive).await?;

        let gateway = GatewayReconciler::new(&self.backend, &self.progress);
        gateway.ensure(&function, config).await?;

        let warmer = WarmerReconciler::new(&self.backend, &self.progress);
        warmer.ensure(&function, config).await?;

        let invoke_url = gateway.invoke_url(config).await?;
        Ok(DeployOutcome {
            function,
            invoke_url,
        })
    }
}
