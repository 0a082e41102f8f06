//! envsync command line.
//!
//! ```text
//! envsync watch  --project p --key k           serve reloads for k, log every change
//! envsync reload --project p [--field f]       ask watchers of p to reload
//! envsync seed   --key k --file seed.toml      write a TOML file into the hash
//! envsync get    --key k [--field f]           print the hash or one field
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use envsync::config::{load_settings, Settings};
use envsync::env::{EnvMap, EnvRecord, MaterializeError};
use envsync::lifecycle::signals::shutdown_on_signal;
use envsync::lifecycle::{connect, connect_bus, connect_store, Backends, Shutdown};
use envsync::observability::logging::{init_logging, LogFormat};
use envsync::observability::metrics::init_metrics;
use envsync::reload::{request_reload, ReloadCoordinator, RemoteEnvLoader, REPLY_OK};
use envsync::remote::{fetch_all, fetch_field, seed::env_map_from_toml, RemoteStore};

#[derive(Parser)]
#[command(name = "envsync")]
#[command(about = "Typed configuration from a Redis hash, reloaded over NATS", long_about = None)]
struct Cli {
    /// Read settings from this .env file instead of ./.env
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a hash and keep it in sync until interrupted
    Watch {
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        key: String,
    },
    /// Ask the watchers of a project to reload
    Reload {
        #[arg(short, long)]
        project: String,
        /// Reload only this field
        #[arg(short, long)]
        field: Option<String>,
        #[arg(short, long, default_value = "5s", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },
    /// Write a TOML file into a hash
    Seed {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        file: PathBuf,
        /// Trigger a full reload of this project afterwards
        #[arg(short, long)]
        notify: Option<String>,
    },
    /// Print a hash as JSON, or one of its fields
    Get {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        field: Option<String>,
    },
}

/// Every entry of the map, sorted. Used when the binary has no schema.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
struct EnvSnapshot(BTreeMap<String, String>);

impl EnvRecord for EnvSnapshot {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self(env.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(cli.dotenv.as_deref())?;

    let format: LogFormat = settings.observability.log_format.parse()?;
    init_logging(&settings.observability.log_level, format);

    if !settings.observability.metrics_address.is_empty() {
        init_metrics(settings.observability.metrics_address.parse()?)?;
    }

    match cli.command {
        Commands::Watch { project, key } => {
            let backends = connect(&settings).await?;
            watch(&settings, backends, &project, &key).await
        }
        Commands::Reload { project, field, timeout } => {
            let bus = connect_bus(&settings).await?;
            let reply = request_reload(
                bus.as_ref(),
                &settings.loader.subject_root,
                &project,
                field.as_deref(),
                timeout,
            )
            .await?;
            println!("{}", reply);
            check_reply(&project, &reply)
        }
        Commands::Seed { key, file, notify } => {
            let contents = std::fs::read_to_string(&file)?;
            let fields = env_map_from_toml(&contents)?;
            let store = connect_store(&settings).await?;
            store.put_fields(&key, &fields).await?;
            tracing::info!(key = %key, fields = fields.len(), file = %file.display(), "Hash seeded");

            if let Some(project) = notify {
                let bus = connect_bus(&settings).await?;
                let reply = request_reload(
                    bus.as_ref(),
                    &settings.loader.subject_root,
                    &project,
                    None,
                    settings.loader.fetch_timeout * 2,
                )
                .await?;
                println!("{}", reply);
                check_reply(&project, &reply)?;
            }
            Ok(())
        }
        Commands::Get { key, field } => {
            let store = connect_store(&settings).await?;
            let timeout = settings.loader.fetch_timeout;
            match field {
                Some(field) => println!("{}", fetch_field(store.as_ref(), &key, &field, timeout).await?),
                None => {
                    let env = fetch_all(store.as_ref(), &key, timeout).await?;
                    let snapshot = EnvSnapshot::from_env(&env)?;
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
            }
            Ok(())
        }
    }
}

/// Anything but `ok` makes the command fail.
fn check_reply(project: &str, reply: &str) -> Result<(), Box<dyn std::error::Error>> {
    if reply != REPLY_OK {
        return Err(format!("reload of {} failed: {}", project, reply).into());
    }
    Ok(())
}

async fn watch(
    settings: &Settings,
    backends: Backends,
    project: &str,
    key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let live = RemoteEnvLoader::new(key)
        .timeout(settings.loader.fetch_timeout)
        .error_at_not_found(settings.loader.error_at_not_found)
        .load::<EnvSnapshot>(backends.store.as_ref())
        .await?;
    tracing::info!(key = %key, fields = live.load().0.len(), "Initial configuration installed");

    let coordinator = ReloadCoordinator::new(backends.bus, backends.store)
        .with_subject_root(settings.loader.subject_root.clone())
        .fetch_timeout(settings.loader.fetch_timeout);
    let handle = coordinator.subscribe(project, live.clone()).await?;

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown));

    let mut generations = live.watch_generation();
    loop {
        tokio::select! {
            changed = generations.changed() => {
                if changed.is_err() {
                    break;
                }
                let generation = *generations.borrow_and_update();
                let record = live.load();
                tracing::info!(key = %key, generation, fields = record.0.len(), "Configuration changed");
                tracing::debug!(snapshot = ?record.0, "Installed configuration");
            }
            _ = stop.recv() => break,
        }
    }

    handle.unsubscribe().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
