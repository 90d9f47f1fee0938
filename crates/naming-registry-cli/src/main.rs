//! Naming registry command line client
//!
//! Thin wrapper over [`RegistryClient`]: every subcommand is one registry
//! operation. Configuration comes from `--config`, `NAMING_*` variables (a
//! `.env` file is honored) and the flags below, in increasing precedence.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use naming_registry_service::{ClientConfig, RegistryClient, ServiceType};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "namectl")]
#[command(about = "Naming registry command line client", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Store endpoints, comma separated
    #[arg(long, env = "NAMING_ENDPOINTS", value_delimiter = ',')]
    endpoints: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Reject service types other than charm, model and page
    #[arg(long)]
    strict: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new name
    Create {
        name: String,
        /// charm, model or page
        service_type: String,
    },
    /// Change the service type of a name, if it still holds the old one
    Update {
        name: String,
        old_type: String,
        new_type: String,
    },
    /// Show the service type of a name
    Read { name: String },
    /// Unregister a name (recurses into directories)
    Delete { name: String },
    /// Show the names inside a namespace
    List {
        namespace: String,
        /// Include names in nested namespaces
        #[arg(long, short)]
        recursive: bool,
    },
}

/// Result of a single subcommand
#[derive(Debug, PartialEq)]
enum Output {
    Done,
    Resolved { name: String, service_type: ServiceType },
    Names(BTreeMap<String, ServiceType>),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let client =
        RegistryClient::from_config(&config).context("failed to set up the store connection")?;

    let output = execute(&client, cli.command).await?;
    if let Some(text) = render(&output, cli.json)? {
        println!("{}", text);
    }
    Ok(())
}

/// Apply command line overrides on top of the loaded configuration.
fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config =
        ClientConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if !cli.endpoints.is_empty() {
        config = config.with_endpoints(cli.endpoints.iter().map(|e| e.trim().to_string()));
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    config.enforce_known_types |= cli.strict;
    config.validate().context("invalid configuration")?;

    debug!(?config, "Resolved client configuration");
    Ok(config)
}

async fn execute(client: &RegistryClient, command: Command) -> Result<Output> {
    let output = match command {
        Command::Create { name, service_type } => {
            client.create(&name, ServiceType::from(service_type)).await?;
            Output::Done
        }
        Command::Update {
            name,
            old_type,
            new_type,
        } => {
            client
                .update(&name, ServiceType::from(old_type), ServiceType::from(new_type))
                .await?;
            Output::Done
        }
        Command::Read { name } => {
            let service_type = client.read(&name).await?;
            Output::Resolved { name, service_type }
        }
        Command::Delete { name } => {
            client.delete(&name).await?;
            Output::Done
        }
        Command::List {
            namespace,
            recursive,
        } => {
            let names = if recursive {
                client.list_recursive(&namespace).await?
            } else {
                client.list(&namespace).await?
            };
            Output::Names(names)
        }
    };
    Ok(output)
}

fn render(output: &Output, json: bool) -> Result<Option<String>> {
    let text = match (output, json) {
        (Output::Done, _) => None,
        (Output::Resolved { service_type, .. }, false) => Some(service_type.to_string()),
        (Output::Resolved { name, service_type }, true) => Some(serde_json::to_string_pretty(
            &serde_json::json!({ "name": name, "service_type": service_type }),
        )?),
        (Output::Names(names), false) => Some(
            names
                .iter()
                .map(|(name, service_type)| format!("{}\t{}", name, service_type))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        (Output::Names(names), true) => Some(serde_json::to_string_pretty(names)?),
    };
    Ok(text)
}
