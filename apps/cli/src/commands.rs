//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use newssync_core::enrich::default_enrichers;
use newssync_core::sync::run_sync;
use newssync_fetch::PipelineRegistry;
use newssync_shared::{AppConfig, init_config, load_config, load_config_from};
use newssync_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// newssync — keep a local store in step with paginated news feeds.
#[derive(Parser)]
#[command(
    name = "newssync",
    version,
    about = "Incrementally synchronize a local store with paginated news sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one synchronization pass over all configured sources.
    Sync {
        /// Config file to use instead of ~/.newssync/newssync.toml.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database file, overriding the configured path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List the configured sources.
    Sources {
        /// Config file to use instead of ~/.newssync/newssync.toml.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newssync=info",
        1 => "newssync=debug",
        _ => "newssync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sync { config, db } => cmd_sync(config.as_deref(), db.as_deref()).await,
        Command::Sources { config } => cmd_sources(config.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sync(config_path: Option<&Path>, db: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    if config.sources.is_empty() {
        return Err(eyre!(
            "no sources configured — add [[sources]] entries to the config file \
             (run `newssync config init` to create one)"
        ));
    }

    let db_path = match db {
        Some(p) => p.to_path_buf(),
        None => expand_home(&config.defaults.db_path),
    };

    info!(
        sources = config.sources.len(),
        db = %db_path.display(),
        "starting sync"
    );

    let storage = Storage::open(&db_path).await?;
    let registry = PipelineRegistry::from_config(&config)?;
    let enrichers = default_enrichers(config.defaults.keywords.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(format!("Synchronizing {} source(s)", config.sources.len()));

    let result = run_sync(&config, &registry, &storage, &enrichers).await;
    spinner.finish_and_clear();
    let report = result?;

    println!();
    println!("  Sync finished");
    println!("  Run:       {}", report.run_id);
    println!("  New items: {}", report.new_items.len());
    for source in &report.sources {
        println!("    {:<20} {}", source.title, source.new_items);
    }
    println!("  Stored:    {}", storage.item_count().await?);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_sources(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    for source in &config.sources {
        println!("{:<20} {:<10} {}", source.title, source.kind, source.template);
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => Ok(load_config_from(p)?),
        None => Ok(load_config()?),
    }
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
