//! CLI entry point for the regsync organization importer.

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, EnvFilter};

use regsync_core::Payload;
use regsync_graph::{EntityStore, GraphClient, MemoryStore, Neo4jStore};

use regsync_import::config::{LockConfig, Settings};
use regsync_import::{ImportOutcome, Importer, LockRegistry};

#[derive(Parser)]
#[command(name = "regsync-import")]
#[command(about = "Import an organization registry record into the graph")]
struct Cli {
    /// Payload JSON file (reads stdin when omitted).
    #[arg(short, long)]
    payload: Option<PathBuf>,

    /// Import into an in-memory store instead of Neo4j.
    #[arg(long)]
    dry_run: bool,

    /// Skip the named import lock.
    #[arg(long)]
    no_lock: bool,

    /// Config file prefix (default: regsync).
    #[arg(short, long, default_value = "regsync")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)?;
    if cli.no_lock {
        settings.import.lock.enabled = false;
    }

    let bytes = read_payload(cli.payload.as_deref()).await?;
    let payload = Payload::from_slice(&bytes)?;

    let outcome = if cli.dry_run {
        tracing::info!("Dry run, importing into an in-memory store");
        import_with(MemoryStore::new(), settings.import.lock, &payload).await?
    } else {
        let client = GraphClient::connect(&settings.neo4j).await?;
        let store = Neo4jStore::new(client);
        store.ensure_schema().await?;
        import_with(store, settings.import.lock, &payload).await?
    };

    tracing::info!(inn = outcome.inn(), "Import finished");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn import_with<S: EntityStore>(
    store: S,
    lock: LockConfig,
    payload: &Payload,
) -> anyhow::Result<ImportOutcome> {
    let mut importer = Importer::new(store, LockRegistry::new(), lock);
    Ok(importer.import(payload).await?)
}

async fn read_payload(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => Ok(tokio::fs::read(path).await?),
        None => {
            let mut bytes = Vec::new();
            tokio::io::stdin().read_to_end(&mut bytes).await?;
            Ok(bytes)
        }
    }
}
