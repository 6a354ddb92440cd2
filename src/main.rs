//! Binary entry point for the liftoff CLI.

use std::io::{self, Write};
use std::process;

use aws_config::{BehaviorVersion, Region};
use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;

use liftoff::cli::{Cli, DeployArgs, PackageArgs};
use liftoff::config::ConfigError;
use liftoff::{
    AwsProvider, ConfigViolations, DeployConfig, DeployError, Deployer, PackageError,
    ServerFileError, StdoutProgress, ensure_server_executable, write_archive,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    InvalidConfig(#[from] ConfigViolations),
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("server file error: {0}")]
    Server(#[from] ServerFileError),
    #[error("packaging failed: {0}")]
    Package(#[from] PackageError),
    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Deploy(args) => deploy_command(args).await,
        Cli::Package(args) => package_command(&args),
    }
}

async fn deploy_command(args: DeployArgs) -> Result<(), CliError> {
    let DeployArgs {
        environment,
        port,
        region,
    } = args;
    let config = load_config(environment, port, region)?;
    let workspace = workspace_dir()?;

    let mut stdout = io::stdout();
    if ensure_server_executable(&workspace)? {
        writeln!(stdout, "Making the 'server' file executable").ok();
    }

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;
    let provider = AwsProvider::new(&sdk_config);
    let deployer = Deployer::new(provider, StdoutProgress);

    let outcome = deployer.execute(&config, &workspace).await?;
    writeln!(stdout, "Service deployed to {}", outcome.invoke_url).ok();
    Ok(())
}

fn package_command(args: &PackageArgs) -> Result<(), CliError> {
    let config = load_config(None, args.port, None)?;
    let workspace = workspace_dir()?;
    let name = args.output.clone().unwrap_or_else(|| config.name.clone());

    let path = write_archive(&workspace, config.port, &name)?;
    writeln!(io::stdout(), "Wrote {path}").ok();
    Ok(())
}

fn load_config(
    environment: Option<String>,
    port: Option<u16>,
    region: Option<String>,
) -> Result<DeployConfig, CliError> {
    let loaded = DeployConfig::load_without_cli_args()?;
    let config = apply_overrides(loaded, environment, port, region);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(
    mut config: DeployConfig,
    environment: Option<String>,
    port: Option<u16>,
    region: Option<String>,
) -> DeployConfig {
    if let Some(environment) = environment {
        config.environment = environment;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(region) = region {
        config.region = region;
    }
    config
}

fn workspace_dir() -> Result<Utf8PathBuf, CliError> {
    let cwd = std::env::current_dir().map_err(|err| CliError::Workspace(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| CliError::Workspace(path.display().to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    if let CliError::InvalidConfig(violations) = err {
        for violation in violations.violations() {
            writeln!(target, "Config error: {violation}").ok();
        }
        return;
    }
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base_config() -> DeployConfig {
        DeployConfig {
            name: String::from("orbit"),
            description: String::from("Test deployment"),
            region: String::from("eu-central-1"),
            environment: String::from("dev"),
            port: 3000,
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn flag_overrides_replace_configured_values() {
        let config = apply_overrides(
            base_config(),
            Some(String::from("prod")),
            Some(8080),
            Some(String::from("us-east-1")),
        );

        assert_eq!(config.environment, "prod");
        assert_eq!(config.port, 8080);
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    fn absent_flags_keep_configured_values() {
        let config = apply_overrides(base_config(), None, None, None);
        assert_eq!(config, base_config());
    }

    #[test]
    fn write_error_lists_every_config_violation() {
        let violations = base_config_with_violations().expect_err("expected violations");
        let mut buffer = Vec::new();
        write_error(&mut buffer, &CliError::InvalidConfig(violations));

        let rendered = String::from_utf8(buffer).expect("utf8");
        assert_eq!(
            rendered,
            "Config error: 'name' must not be empty\nConfig error: 'region' must not be empty\n"
        );
    }

    #[test]
    fn write_error_renders_other_errors_on_one_line() {
        let mut buffer = Vec::new();
        write_error(
            &mut buffer,
            &CliError::Workspace(String::from("not a directory")),
        );

        let rendered = String::from_utf8(buffer).expect("utf8");
        assert_eq!(rendered, "workspace error: not a directory\n");
    }

    fn base_config_with_violations() -> Result<(), ConfigViolations> {
        DeployConfig {
            name: String::new(),
            region: String::new(),
            ..base_config()
        }
        .validate()
    }
}
