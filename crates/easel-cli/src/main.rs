use std::path::PathBuf;

use clap::{Parser, Subcommand};
use easel_common::telemetry::{self, TelemetryConfig};
use easel_common::{EditorConfig, KdlConfigFile};
use easel_editor_core::{FileSnapshotStore, SnapshotKey};
use miette::Result;

mod commands;

#[derive(Parser)]
#[command(version, about = "Easel - inspect and repair editor snapshot storage", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Snapshot directory (defaults to the configured or platform location)
    #[arg(long, global = true, env = "EASEL_STORE_DIR")]
    store: Option<PathBuf>,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every stored snapshot
    List,
    /// Print a snapshot as JSON
    Show { key: String },
    /// Fonts a snapshot would preload
    Fonts { key: String },
    /// Preview parameters a snapshot exposes
    Params { key: String },
    /// Store a design JSON file as a snapshot
    Import {
        file: PathBuf,

        /// Target slot (defaults to the session autosave key)
        #[arg(long)]
        key: Option<String>,
    },
    /// Write a snapshot to a JSON file
    Export { key: String, file: PathBuf },
    /// Delete a snapshot
    Remove { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    telemetry::init(TelemetryConfig::quiet("easel-cli"));

    let cli = Cli::parse();

    let config_file = match cli.config {
        Some(path) => KdlConfigFile::new(path),
        None => KdlConfigFile::default_location()?,
    };
    let config = EditorConfig::load(&config_file).await?.with_env()?;
    let dir = match cli.store {
        Some(dir) => dir,
        None => config.resolved_store_dir()?,
    };
    tracing::debug!(config = %config_file.path().display(), store = %dir.display(), "resolved locations");
    let store = FileSnapshotStore::open(dir)?;

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::List => commands::list(&store, &mut out)?,
        Commands::Show { key } => commands::show(&store, &SnapshotKey::new(key), &mut out)?,
        Commands::Fonts { key } => commands::fonts(&store, &SnapshotKey::new(key), &mut out)?,
        Commands::Params { key } => commands::params(&store, &SnapshotKey::new(key), &mut out)?,
        Commands::Import { file, key } => {
            let key = key
                .or(config.autosave_key)
                .map(SnapshotKey::new)
                .unwrap_or_else(SnapshotKey::default_autosave);
            commands::import(&store, &file, &key)?;
            println!("Imported {} into {key}", file.display());
        }
        Commands::Export { key, file } => {
            commands::export(&store, &SnapshotKey::new(key), &file)?;
            println!("Wrote {}", file.display());
        }
        Commands::Remove { key } => {
            commands::remove(&store, &SnapshotKey::new(key))?;
        }
    }

    Ok(())
}

fn init_miette() {
    let hook = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }));
    if hook.is_err() {
        eprintln!("couldn't set the miette hook");
    }
    miette::set_panic_hook();
}
