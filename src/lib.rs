//! Core library for the liftoff deployment tool.
//!
//! The crate packages a long-running HTTP server into a deployable zip
//! artifact (bundling a generated Node.js shim that bridges invocation
//! events to the server) and idempotently converges the AWS resources that
//! expose it: the Lambda function and its environment alias, the IAM trust
//! roles, an API Gateway REST API with a catch-all proxy, and a scheduled
//! warm-up rule. Reconcilers speak to AWS through narrow client traits so
//! behaviour tests can run against an in-memory provider.

pub mod aws;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod function;
pub mod gateway;
pub mod naming;
pub mod package;
pub mod progress;
pub mod provider;
pub mod roles;
pub mod server;
pub mod shim;
pub mod test_support;
pub mod warmer;

pub use aws::AwsProvider;
pub use config::{ConfigError, ConfigViolation, ConfigViolations, DeployConfig};
pub use deploy::{DeployError, DeployOutcome, Deployer};
pub use function::{FunctionError, FunctionReconciler};
pub use gateway::{GatewayError, GatewayReconciler};
pub use package::{PackageError, archive_workspace, write_archive};
pub use progress::{Progress, StdoutProgress};
pub use provider::{
    FunctionClient, FunctionRecord, GatewayClient, ProviderError, RoleClient, ScheduleClient,
};
pub use roles::RoleReconciler;
pub use server::{SERVER_FILE_NAME, ServerFileError, ensure_server_executable};
pub use shim::{SHIM_FILE_NAME, SHIM_HANDLER, render_shim};
pub use warmer::{WarmerError, WarmerReconciler};
