//! knative-entity-provider — runs the configured providers outside a catalog.
//!
//! Reads a TOML file holding `catalog.providers.knativeEventType` and/or
//! `catalog.providers.knativeEventMesh`, schedules every provider on the tokio
//! scheduler, and prints each full mutation as a
//! line of JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use knative_entity_provider::logging::init_tracing;
use knative_entity_provider::stdout::JsonLinesConnection;
use knative_entity_provider::{
    EntityProvider, EntityProviderConnection, ImmediateTaskRunner, ProviderOptions,
    ScheduleDefinition, Scheduler, SyncProvider, TaskRunner, TokioScheduler,
};

#[derive(Debug, Parser)]
#[command(name = "knative-entity-provider", version, about)]
struct Cli {
    /// TOML file containing the `catalog.providers` sections.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Frequency for providers that do not configure a schedule.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    default_frequency_secs: Option<u64>,

    /// Timeout paired with `--default-frequency-secs`.
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 180,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    default_timeout_secs: u64,

    /// Run a single cycle per provider and exit.
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn default_schedule(&self) -> knative_entity_provider::Result<Option<ScheduleDefinition>> {
        self.default_frequency_secs
            .map(|secs| {
                ScheduleDefinition::try_new(
                    Duration::from_secs(secs),
                    Duration::from_secs(self.default_timeout_secs),
                )
            })
            .transpose()
    }
}

fn load_config(path: &Path) -> Result<toml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info")?;

    let root = load_config(&cli.config)?;
    let scheduler = TokioScheduler::new();

    let options = if cli.once {
        ProviderOptions {
            schedule: Some(Arc::new(ImmediateTaskRunner)),
            ..Default::default()
        }
    } else {
        let default_runner: Option<Arc<dyn TaskRunner>> = cli
            .default_schedule()?
            .map(|schedule| scheduler.create_recurring_task(schedule))
            .transpose()?;
        ProviderOptions {
            schedule: default_runner,
            scheduler: Some(Arc::new(scheduler.clone())),
            ..Default::default()
        }
    };

    let providers: Vec<Arc<dyn EntityProvider>> = SyncProvider::from_config(&root, options)?
        .into_iter()
        .map(|provider| provider as Arc<dyn EntityProvider>)
        .collect();
    let connection: Arc<dyn EntityProviderConnection> = Arc::new(JsonLinesConnection::stdout());
    for provider in providers {
        let name = provider.provider_name();
        provider
            .connect(Arc::clone(&connection))
            .await
            .with_context(|| format!("failed to connect {name}"))?;
    }

    if cli.once {
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    scheduler.shutdown().await;
    Ok(())
}
