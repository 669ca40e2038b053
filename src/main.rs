use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use package_resolver::config::{LOG_FILE_NAME, ResolverConfig, data_dir, log_path};
use package_resolver::package::{
    PackageCache, PackageReference, PackageResolver, http_client_factory,
};

#[derive(Parser)]
#[command(name = "package-resolver")]
#[command(version, about = "Resolve packages from a local cache or registry servers")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra package server, tried after the configured ones
    #[arg(long = "server", global = true)]
    servers: Vec<String>,

    /// Package database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Write log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a package (`id` or `id#version`), fetching it when not cached
    Fetch {
        reference: String,
        /// Write the package content to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the URL of a package
    Url { id: String },
    /// Print the id of the package owning a canonical URL
    Id { canonical: String },
    /// Print the effective server list
    Servers,
}

/// Initialize file logging under the data directory.
///
/// Log level is controlled by `RUST_LOG`, defaulting to INFO.
fn init_logging(json: bool) -> anyhow::Result<WorkerGuard> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {:?}", dir))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, LOG_FILE_NAME));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("package_resolver=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init();
    }

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResolverConfig> {
    let Some(path) = path else {
        return Ok(ResolverConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid config {:?}", path))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.cache.resolved_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
    }
    let cache = PackageCache::new(&db_path)
        .with_context(|| format!("Failed to open package cache {:?}", db_path))?;

    let resolver = PackageResolver::new(Arc::new(cache), http_client_factory(config.http.clone()))
        .with_servers(config.servers.iter().chain(cli.servers.iter()))?;

    tracing::debug!("Using servers {:?}", resolver.servers());

    match cli.command {
        Command::Fetch { reference, output } => {
            let reference = PackageReference::parse(&reference)?;
            let Some(package) = resolver.load_package(&reference).await? else {
                bail!("package {} not found on any server", reference);
            };

            if let Some(output) = output {
                std::fs::write(&output, &package.content)
                    .with_context(|| format!("Failed to write {:?}", output))?;
            }
            println!(
                "{}#{} ({} bytes) {}",
                package.id,
                package.version,
                package.content.len(),
                package.source_url.as_deref().unwrap_or("(cached)")
            );
        }
        Command::Url { id } => match resolver.get_package_url(&id).await? {
            Some(url) => println!("{}", url),
            None => bail!("no URL known for package {}", id),
        },
        Command::Id { canonical } => match resolver.get_package_id(&canonical).await {
            Some(id) => println!("{}", id),
            None => bail!("no package found for canonical {}", canonical),
        },
        Command::Servers => {
            for server in resolver.servers() {
                println!("{}", server);
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_json)
        .with_context(|| format!("Failed to initialize logging at {:?}", log_path()))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
