//! Nimbus - multi-cloud provisioning dashboard
//!
//! Command line front end: register provider accounts, sync their inventory and
//! drive node lifecycle operations. Results are printed as JSON on stdout; logs go
//! to stderr or to the configured log files.
//!
//! Usage:
//!   nimbus [--config <path>] [--verbose] <command> [args...]

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

use nimbus::config::{self, LogFormat};
use nimbus::models::{NewProvider, NodeForm};
use nimbus::utils::{OperationError, ProvisionError};
use nimbus::{AppConfig, AppState};

/// A parsed subcommand
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Types,
    Providers,
    AddProvider(NewProvider),
    Sync { provider: Option<String> },
    ImportCatalog { provider: String },
    Nodes { provider: String },
    Spawn { provider: String, form: NodeForm },
    Reboot { provider: String, node: String },
    Destroy { provider: String, node: String },
    Status,
}

/// What the command line asks for
#[derive(Debug, Clone, PartialEq)]
enum Invocation {
    Help,
    Version,
    Run {
        config_path: Option<PathBuf>,
        verbose: bool,
        command: Command,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let (config_path, verbose, command) = match parse_args(&args) {
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("nimbus {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Ok(Invocation::Run {
            config_path,
            verbose,
            command,
        }) => (config_path, verbose, command),
        Err(message) => {
            eprintln!("{}", message);
            print_help();
            std::process::exit(2);
        }
    };

    // Load configuration first (before logging, so we know log format)
    if let Some(path) = config_path {
        env::set_var("NIMBUS_CONFIG", &path);
    }
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if verbose {
        config.logging.level = "debug".to_string();
    }

    // The guard must be kept alive so file logs are flushed
    let _log_guard = init_logging(&config);

    ensure_data_directory(&config)?;
    let state = AppState::init(config).await?;
    debug!("Running {:?}", command);

    match run(&state, command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            let output = json!({
                "error": error_type(&e),
                "message": format!("{:#}", e),
            });
            eprintln!("{}", serde_json::to_string_pretty(&output)?);
            std::process::exit(1);
        }
    }
}

async fn run(state: &AppState, command: Command) -> Result<Value> {
    let service = &state.providers;

    let output = match command {
        Command::Types => {
            let types: Vec<_> = service.context().capabilities.iter().collect();
            serde_json::to_value(types)?
        }
        Command::Providers => serde_json::to_value(service.list_providers().await?)?,
        Command::AddProvider(input) => {
            let session = service.create_provider(input).await?;
            serde_json::to_value(session.provider())?
        }
        Command::Sync { provider: None } => serde_json::to_value(service.sync_all().await?)?,
        Command::Sync {
            provider: Some(name),
        } => {
            let mut session = service.open(&name).await?;
            serde_json::to_value(session.update().await?)?
        }
        Command::ImportCatalog { provider } => {
            let mut session = service.open(&provider).await?;
            serde_json::to_value(session.import_catalog().await?)?
        }
        Command::Nodes { provider } => {
            let session = service.open(&provider).await?;
            let nodes: Vec<Value> = session
                .nodes()
                .await?
                .into_iter()
                .map(|node| -> Result<Value, serde_json::Error> {
                    let mut value = serde_json::to_value(&node)?;
                    value["extra"] = Value::Object(node.extra_data()?);
                    Ok(value)
                })
                .collect::<Result<_, _>>()?;
            Value::Array(nodes)
        }
        Command::Spawn { provider, form } => {
            let mut session = service.open(&provider).await?;
            let creator = env::var("USER").unwrap_or_else(|_| "nimbus".to_string());
            serde_json::to_value(session.create_node(&form, &creator).await?)?
        }
        Command::Reboot { provider, node } => {
            let mut session = service.open(&provider).await?;
            let node = session.find_node(&node).await?;
            session.reboot_node(&node).await?;
            json!({ "rebooted": node.name })
        }
        Command::Destroy { provider, node } => {
            let mut session = service.open(&provider).await?;
            let mut node = session.find_node(&node).await?;
            let original = node.name.clone();
            session.destroy_node(&mut node).await?;
            info!("Node {} is now {}", original, node.name);
            json!({ "destroyed": original, "renamed_to": node.name })
        }
        Command::Status => serde_json::to_value(service.status().await?)?,
    };

    Ok(output)
}

fn error_type(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<ProvisionError>() {
        e.error_type()
    } else if let Some(e) = err.downcast_ref::<OperationError>() {
        e.error_type()
    } else {
        "internal_error"
    }
}

/// Parse arguments (program name excluded)
fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut verbose = false;
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args.get(i + 1).ok_or("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => return Ok(Invocation::Help),
            "--version" | "-V" => return Ok(Invocation::Version),
            arg if arg.starts_with("--") => return Err(format!("Unknown argument: {}", arg)),
            arg => positional.push(arg),
        }
        i += 1;
    }

    let (name, rest) = positional.split_first().ok_or("No command given")?;
    let arity = |min: usize, max: usize| -> Result<(), String> {
        if rest.len() < min || rest.len() > max {
            Err(format!("Wrong number of arguments for {}", name))
        } else {
            Ok(())
        }
    };

    let command = match *name {
        "types" => {
            arity(0, 0)?;
            Command::Types
        }
        "providers" => {
            arity(0, 0)?;
            Command::Providers
        }
        "add-provider" => {
            arity(3, 4)?;
            Command::AddProvider(NewProvider {
                name: rest[0].to_string(),
                provider_type: rest[1].to_string(),
                access_key: rest[2].to_string(),
                secret_key: rest.get(3).map(|s| s.to_string()).unwrap_or_default(),
            })
        }
        "sync" => {
            arity(0, 1)?;
            Command::Sync {
                provider: rest.first().map(|s| s.to_string()),
            }
        }
        "import-catalog" => {
            arity(1, 1)?;
            Command::ImportCatalog {
                provider: rest[0].to_string(),
            }
        }
        "nodes" => {
            arity(1, 1)?;
            Command::Nodes {
                provider: rest[0].to_string(),
            }
        }
        "spawn" => {
            arity(4, usize::MAX)?;
            let mut realm = None;
            let mut extra = BTreeMap::new();
            for arg in &rest[4..] {
                match arg.split_once('=') {
                    Some((key, value)) => {
                        extra.insert(key.to_string(), value.to_string());
                    }
                    None if realm.is_none() && extra.is_empty() => realm = Some(arg.to_string()),
                    None => return Err(format!("Expected key=value, got {}", arg)),
                }
            }
            Command::Spawn {
                provider: rest[0].to_string(),
                form: NodeForm {
                    name: rest[1].to_string(),
                    image: rest[2].to_string(),
                    flavor: rest[3].to_string(),
                    realm,
                    extra,
                },
            }
        }
        "reboot" => {
            arity(2, 2)?;
            Command::Reboot {
                provider: rest[0].to_string(),
                node: rest[1].to_string(),
            }
        }
        "destroy" => {
            arity(2, 2)?;
            Command::Destroy {
                provider: rest[0].to_string(),
                node: rest[1].to_string(),
            }
        }
        "status" => {
            arity(0, 0)?;
            Command::Status
        }
        other => return Err(format!("Unknown command: {}", other)),
    };

    Ok(Invocation::Run {
        config_path,
        verbose,
        command,
    })
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;

    match &log_config.target {
        LogTarget::Console => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            let subscriber = tracing_subscriber::registry().with(env_filter);
            init_console_logging(
                subscriber.with(file_layer(&log_config.format, writer)),
                &log_config.format,
            );
            Some(guard)
        }
    }
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Console logging on stderr; stdout carries command output
fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

/// Initialize file-only logging
fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::prelude::*;

    subscriber.with(file_layer(format, writer)).init();
}

/// Formatting layer writing to the log file
fn file_layer<S>(
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Ensure the directory of the SQLite database exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Print help message
fn print_help() {
    println!(
        r#"nimbus {}

USAGE:
    nimbus [OPTIONS] <COMMAND> [ARGS...]

OPTIONS:
    -c, --config <PATH>     Configuration file (overrides NIMBUS_CONFIG)
    -v, --verbose           Debug logging
    -h, --help              Print this help message
    -V, --version           Print version information

COMMANDS:
    types                                   List supported provider types
    providers                               List provider accounts
    add-provider NAME TYPE ACCESS [SECRET]  Register a provider account
    sync [PROVIDER]                         Sync one provider, or all of them
    import-catalog PROVIDER                 Import images, locations and sizes
    nodes PROVIDER                          List nodes of a provider
    spawn PROVIDER NAME IMAGE FLAVOR [REALM] [key=value...]
                                            Create a node
    reboot PROVIDER NODE                    Reboot a node
    destroy PROVIDER NODE                   Destroy and decommission a node
    status                                  Schema version and node counts

ENVIRONMENT:
    NIMBUS_CONFIG           Path to configuration file
    DATABASE_URL            Database URL override
    NIMBUS_LOG_FORMAT       pretty, compact or json
    NIMBUS_PUBLIC_KEY_PATH  Deploy key installed on spawned nodes

CONFIGURATION:
    The configuration file is looked up in the following order:
    1. Path given by --config or NIMBUS_CONFIG
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/nimbus/config.yaml
    5. $XDG_CONFIG_HOME/nimbus/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
