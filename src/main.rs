use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nexo_libs::model::config::{AppConfig, data_dir};
use nexo_libs::{ArtifactSource, LibraryManager, LocalCacheEngine, Manifest, StaticHost};

#[derive(Parser)]
#[command(name = "nexo-libs")]
#[command(version)]
#[command(about = "Plan and load the plugin's runtime libraries", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Library manifest replacing the built-in one
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    /// Host vendor, e.g. Paper
    #[arg(long, global = true)]
    vendor: Option<String>,
    /// Host version, e.g. 1.21.4
    #[arg(long = "host-version", global = true)]
    host_version: Option<String>,
    /// Marker symbol present on the host (repeatable)
    #[arg(long = "symbol", global = true)]
    symbols: Vec<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the descriptors the detected environment resolves to
    Plan,
    /// Run a load pass against the local artifact cache
    Load {
        /// Cache root (defaults to the platform data dir)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Show the base repository list
    Repos,
}

fn main() -> Result<ExitCode> {
    // Log to file; stdout is reserved for command output.
    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "nexo-libs.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nexo_libs=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let manifest = match cli.manifest.clone().or_else(|| config.manifest_path()) {
        Some(path) => Manifest::from_path(&path)?,
        None => Manifest::builtin().context("built-in manifest is invalid")?,
    };
    let manager = LibraryManager::new(&config, manifest)?;
    let host = host_from(&cli, &config);

    match cli.command {
        Commands::Plan => plan(&manager, &host),
        Commands::Load { root } => load(&manager, &host, root.unwrap_or(log_dir)),
        Commands::Repos => {
            for url in manager.registry().base_repositories() {
                println!("{url}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Flags win over the `[host]` config section.
fn host_from(cli: &Cli, config: &AppConfig) -> StaticHost {
    let mut host = config.static_host();
    if let Some(vendor) = &cli.vendor {
        host.vendor = Some(vendor.clone());
    }
    if let Some(version) = &cli.host_version {
        host.version = Some(version.clone());
    }
    host.symbols.extend(cli.symbols.iter().cloned());
    host
}

fn plan(manager: &LibraryManager, host: &StaticHost) -> Result<ExitCode> {
    let facts = manager.detect(host);
    let descriptors = manager.plan(&facts)?;

    println!("environment: {facts}");
    for descriptor in &descriptors {
        println!("{descriptor}");
        match manager.registry().source_for(descriptor) {
            ArtifactSource::Direct(url) => println!("  source: {url}"),
            ArtifactSource::Repositories(repositories) => {
                println!("  source: {} repositories", repositories.len())
            }
        }
        for rule in descriptor.relocations() {
            println!("  relocate: {rule}");
        }
        if descriptor.isolated() {
            println!("  isolated");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load(manager: &LibraryManager, host: &StaticHost, root: PathBuf) -> Result<ExitCode> {
    let mut engine = LocalCacheEngine::new(root);
    let summary = manager.run(host, &mut engine)?;

    for notice in summary.startup_notifications(manager.diagnostic_prefix()) {
        println!("{notice}");
    }

    Ok(if summary.had_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
