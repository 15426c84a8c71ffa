use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use copilot_manifest::{
    manifest::{self, WorkloadManifest},
    validation::{Validate, ValidationError},
    yaml,
};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, instrument, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "MANIFESTCTL_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to read manifest from {path:?}"))]
    ReadManifest {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to decode manifest {path:?}"))]
    DecodeManifest {
        source: manifest::Error,
        path: PathBuf,
    },

    #[snafu(display("manifest {path:?} is invalid"))]
    InvalidManifest {
        source: ValidationError,
        path: PathBuf,
    },

    #[snafu(display("failed to write resolved manifest"))]
    WriteManifest { source: yaml::Error },
}

/// Resolves and validates AWS Copilot manifests.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log level used when MANIFESTCTL_LOG is not set.
    #[arg(long, global = true, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a workload manifest as deployed to one environment.
    Resolve(ResolveArgs),

    /// Check a workload manifest, optionally after applying an environment's overrides.
    Validate(ValidateArgs),

    /// Check an environment manifest.
    Environment(EnvironmentArgs),
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Path to the workload manifest.
    file: PathBuf,

    /// Environment whose overrides are applied.
    #[arg(long, env = "MANIFESTCTL_ENV")]
    env: String,

    /// Print the resolved manifest even if it fails validation.
    #[arg(long)]
    skip_validation: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Path to the workload manifest.
    file: PathBuf,

    /// Environment whose overrides are applied before validating.
    #[arg(long, env = "MANIFESTCTL_ENV")]
    env: Option<String>,
}

#[derive(Debug, Args)]
struct EnvironmentArgs {
    /// Path to the environment manifest.
    file: PathBuf,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    initialize_logging(cli.log_level);

    match cli.command {
        Command::Resolve(args) => resolve(&args),
        Command::Validate(args) => validate(&args),
        Command::Environment(args) => validate_environment(&args),
    }
}

/// Logs to stderr, so that stdout only carries the resolved manifest.
fn initialize_logging(default_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_workload(path: &Path) -> Result<WorkloadManifest, Error> {
    let input = std::fs::read(path).context(ReadManifestSnafu { path })?;
    manifest::unmarshal_workload(&input).context(DecodeManifestSnafu { path })
}

fn resolve_env(manifest: &WorkloadManifest, env: &str) -> WorkloadManifest {
    if !manifest.environment_names().contains(&env) {
        warn!(
            env,
            declared = ?manifest.environment_names(),
            "environment has no overrides, using the base configuration"
        );
    }
    manifest.apply_env(env)
}

#[instrument(skip_all, fields(file = %args.file.display(), env = %args.env))]
fn resolve(args: &ResolveArgs) -> Result<(), Error> {
    let manifest = read_workload(&args.file)?;
    let resolved = resolve_env(&manifest, &args.env);

    if args.skip_validation {
        debug!("skipping validation");
    } else {
        resolved
            .validate()
            .context(InvalidManifestSnafu { path: &args.file })?;
    }

    yaml::serialize_to_explicit_document(std::io::stdout().lock(), &resolved)
        .context(WriteManifestSnafu)
}

#[instrument(skip_all, fields(file = %args.file.display(), env = args.env.as_deref()))]
fn validate(args: &ValidateArgs) -> Result<(), Error> {
    let manifest = read_workload(&args.file)?;
    let manifest = match &args.env {
        Some(env) => resolve_env(&manifest, env),
        None => manifest,
    };

    manifest
        .validate()
        .context(InvalidManifestSnafu { path: &args.file })?;
    info!(
        name = manifest.name(),
        workload_type = %manifest.workload_type(),
        "manifest is valid"
    );
    Ok(())
}

#[instrument(skip_all, fields(file = %args.file.display()))]
fn validate_environment(args: &EnvironmentArgs) -> Result<(), Error> {
    let input = std::fs::read(&args.file).context(ReadManifestSnafu { path: &args.file })?;
    let environment = manifest::unmarshal_environment(&input)
        .context(DecodeManifestSnafu { path: &args.file })?;

    environment
        .validate()
        .context(InvalidManifestSnafu { path: &args.file })?;
    info!(name = environment.name.as_deref(), "environment manifest is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn resolve_arguments() {
        let cli = Cli::try_parse_from([
            "manifestctl",
            "resolve",
            "manifest.yml",
            "--env",
            "prod",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level, LevelFilter::DEBUG);
        let Command::Resolve(args) = cli.command else {
            panic!("expected the resolve command");
        };
        assert_eq!(args.file, PathBuf::from("manifest.yml"));
        assert_eq!(args.env, "prod");
        assert!(!args.skip_validation);
    }
}
