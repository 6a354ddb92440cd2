//! Command-line interface definitions for the `liftoff` binary.
//!
//! The parser structures live in their own module so the build script can
//! reuse them when generating the manual page.

use clap::Parser;

/// Top-level command-line interface.
#[derive(Debug, Parser)]
#[command(
    name = "liftoff",
    about = "Deploy long-running HTTP servers as serverless functions on AWS",
    arg_required_else_help = true
)]
pub enum Cli {
    /// Packages the workspace and converges the AWS resources onto it.
    #[command(name = "deploy", about = "Package the workspace and converge AWS resources")]
    Deploy(DeployArgs),
    /// Writes the deployable archive to disk without touching AWS.
    #[command(name = "package", about = "Write the deployable zip archive to disk")]
    Package(PackageArgs),
}

/// Flags accepted by `liftoff deploy`. Set values override the corresponding
/// configuration entries.
#[derive(Debug, Parser)]
pub struct DeployArgs {
    /// Target environment, naming the API stage and the function alias.
    #[arg(short, long)]
    pub environment: Option<String>,
    /// Port the bundled server binds to.
    #[arg(short, long)]
    pub port: Option<u16>,
    /// AWS region receiving the deployment.
    #[arg(short, long)]
    pub region: Option<String>,
}

/// Flags accepted by `liftoff package`.
#[derive(Debug, Parser)]
pub struct PackageArgs {
    /// Port the bundled server binds to.
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Archive file name, without the `.zip` extension. Defaults to the
    /// configured deployment name.
    #[arg(short, long)]
    pub output: Option<String>,
}
