//! Binary entry point for the Tiller CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use tiller::{
    ChangeApplier, ChangeSet, DesiredState, EngineConfig, EngineError, FileStateStore, Reconciler,
    ResourceDefinition, RestTransport, resources,
};

mod cli;

use cli::{Cli, ImportCommand, ManifestCommand, ResourceCommand};

/// Exit code signalling a successful plan that found pending changes.
const EXIT_CHANGES_PENDING: i32 = 2;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cannot read manifest {path}: {message}")]
    Manifest { path: String, message: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Plan(command) => plan_command(command).await,
        Cli::Apply(command) => apply_command(command).await,
        Cli::Destroy(command) => destroy_command(command).await,
        Cli::Import(command) => import_command(command).await,
    }
}

fn reconciler_for(
    definition: ResourceDefinition,
) -> Result<Reconciler<RestTransport, FileStateStore>, CliError> {
    let config = EngineConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let transport = RestTransport::new(
        config.api_endpoint.clone(),
        config.auth_token.clone(),
        config.timeouts(),
    );
    let store = FileStateStore::new(config.state_dir.clone());
    let (spec, codecs) = definition.into_parts();
    let applier = ChangeApplier::new(transport, spec, codecs, config.identity_defaults());
    Ok(Reconciler::new(applier, store))
}

fn load_manifest(definition: &ResourceDefinition, path: &str) -> Result<DesiredState, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|err| CliError::Manifest {
        path: path.to_owned(),
        message: err.to_string(),
    })?;
    let document: serde_json::Value =
        serde_json::from_str(&raw).map_err(|err| CliError::Manifest {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
    Ok(DesiredState::from_json(definition.spec(), &document)?)
}

async fn plan_command(args: ManifestCommand) -> Result<i32, CliError> {
    let definition = resources::by_name(&args.resource_type)?;
    let desired = load_manifest(&definition, &args.file)?;
    let reconciler = reconciler_for(definition)?;

    let changes = reconciler.plan(&args.name, &desired).await?;
    render_plan(io::stdout(), &args.name, &changes);
    if changes.is_empty() {
        Ok(0)
    } else {
        Ok(EXIT_CHANGES_PENDING)
    }
}

async fn apply_command(args: ManifestCommand) -> Result<i32, CliError> {
    let definition = resources::by_name(&args.resource_type)?;
    let desired = load_manifest(&definition, &args.file)?;
    let reconciler = reconciler_for(definition)?;

    reconciler.converge(&args.name, &desired).await?;
    writeln!(io::stdout(), "{}: converged", args.name).ok();
    Ok(0)
}

async fn destroy_command(args: ResourceCommand) -> Result<i32, CliError> {
    let definition = resources::by_name(&args.resource_type)?;
    let reconciler = reconciler_for(definition)?;

    reconciler.destroy(&args.name).await?;
    writeln!(io::stdout(), "{}: destroyed", args.name).ok();
    Ok(0)
}

async fn import_command(args: ImportCommand) -> Result<i32, CliError> {
    let definition = resources::by_name(&args.resource_type)?;
    let reconciler = reconciler_for(definition)?;

    reconciler.import(&args.name, &args.id).await?;
    writeln!(io::stdout(), "{}: imported from {}", args.name, args.id).ok();
    Ok(0)
}

fn render_plan(mut target: impl Write, name: &str, changes: &ChangeSet) {
    if changes.is_empty() {
        writeln!(target, "{name}: no changes").ok();
        return;
    }
    for change in changes {
        let marker = if change.forces_replacement() { "-/+" } else { "~" };
        match change.old() {
            Some(old) => {
                writeln!(
                    target,
                    "{marker} {}: {old:?} => {:?}",
                    change.name(),
                    change.new_value()
                )
                .ok();
            }
            None => {
                writeln!(target, "+ {}: {:?}", change.name(), change.new_value()).ok();
            }
        }
    }
    writeln!(target, "{name}: {} change(s) pending", changes.len()).ok();
}

fn report_error(err: &CliError) {
    writeln!(io::stderr(), "{err}").ok();
}
