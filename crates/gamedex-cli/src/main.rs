//! gamedex
//!
//! Lists, refreshes and cleans up the local game library. Every library
//! operation runs on the background task slot; this thread only starts it
//! and waits for the completion message.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use gamedex_config::GamedexConfig;
use gamedex_library::{
    CancelToken, Catalog, DeletionReport, GameLibrary, GrantStore, LibraryError, Provenance,
    TaskEvent, TaskSlot, TitleRecord, TreeGrant, validate_grant_root,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gamedex", version, about = "Local game library index")]
struct Cli {
    /// Configuration file (defaults to the system and user files)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the catalog, rebuilding it if the cache is unusable
    List,
    /// Rescan every source and rewrite the cache
    Refresh,
    /// Show the installed add-on of a title
    Addon { serial: String },
    /// Remove a title's installed data
    DeleteInstalled { serial: String },
    /// Remove a title's save and trophy data
    DeleteData { serial: String },
    /// Remove a title with all its data, then refresh
    DeleteAll { serial: String },
    /// Remove a title's shader caches
    DeleteShaders { serial: String },
    /// Grant access to a directory of disc images
    Grant { dir: PathBuf },
    /// Forget the disc image directory
    Revoke,
}

/// Setup logging to the console
fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(false))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<GamedexConfig> {
    match path {
        Some(path) => GamedexConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => GamedexConfig::load_default().context("Failed to load configuration"),
    }
}

/// Run `work` on a task slot and wait for its outcome
fn run_task<T, F>(label: &str, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T, LibraryError> + Send + 'static,
{
    let mut slot = TaskSlot::new();
    slot.start(label, work)?;
    match slot.wait() {
        Some(TaskEvent::Done(value)) => Ok(value),
        Some(TaskEvent::Failed(e)) => Err(anyhow!(e).context(format!("{} failed", label))),
        None => Err(anyhow!("{} produced no result", label)),
    }
}

/// A catalog entry with everything the listing shows
#[derive(Debug)]
struct ListedTitle {
    record: TitleRecord,
    update: Option<String>,
    disc: bool,
}

impl ListedTitle {
    /// Resolve add-on versions; runs on the worker since it invokes the extractor
    fn resolve(library: &GameLibrary, record: TitleRecord) -> Self {
        Self {
            update: library.update_version(&record),
            disc: library.is_disc_sourced(&record),
            record,
        }
    }

    fn resolve_all(library: &GameLibrary, catalog: Catalog) -> Vec<Self> {
        catalog
            .into_records()
            .into_iter()
            .map(|record| Self::resolve(library, record))
            .collect()
    }
}

fn print_titles(titles: &[ListedTitle]) {
    if titles.is_empty() {
        println!("No titles found");
        return;
    }

    for title in titles {
        println!("{}", describe(title));
    }
}

fn describe(title: &ListedTitle) -> String {
    let record = &title.record;
    let version = match &title.update {
        Some(update) => format!("{} (update {})", record.version, update),
        None => record.version.clone(),
    };
    let origin = match record.provenance() {
        Provenance::DocumentTree(_) => "iso",
        Provenance::Directory(_) if title.disc => "disc",
        Provenance::Directory(_) => "installed",
        Provenance::Unknown => "-",
    };
    let lock = if record.decrypt { "" } else { "  locked" };

    format!(
        "{:<10} {:<40} {:<20} {:<16} {}{}",
        record.serial, record.name, version, record.category, origin, lock
    )
}

fn report_deletion(action: &str, serial: &str, report: &DeletionReport) {
    println!(
        "{} {}: {} removed, {} failed",
        action,
        serial,
        report.removed.len(),
        report.failed.len()
    );
    for path in &report.failed {
        println!("  could not remove {}", path.display());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    let library = GameLibrary::from_config(&config);
    info!("Data directory {}", config.storage.data_dir.display());

    match cli.command {
        Command::List => {
            let worker = library.clone();
            let titles = run_task("list", move |cancel| {
                let catalog = worker.load_or_refresh(cancel)?;
                Ok(ListedTitle::resolve_all(&worker, catalog))
            })?;
            print_titles(&titles);
        }
        Command::Refresh => {
            let worker = library.clone();
            let titles = run_task("refresh", move |cancel| {
                let catalog = worker.refresh(cancel)?;
                Ok(ListedTitle::resolve_all(&worker, catalog))
            })?;
            print_titles(&titles);
        }
        Command::Addon { serial } => {
            let worker = library.clone();
            let lookup = serial.clone();
            let addon = run_task("addon", move |_| {
                Ok(worker
                    .lookup_addon(&lookup)
                    .map(|record| ListedTitle::resolve(&worker, record)))
            })?;
            match addon {
                Some(title) => println!("{}", describe(&title)),
                None => println!("No add-on installed for {}", serial),
            }
        }
        Command::DeleteInstalled { serial } => {
            let worker = library.clone();
            let target = serial.clone();
            let report = run_task("delete-installed", move |_| {
                Ok(worker.delete_installed(&target))
            })?;
            report_deletion("Deleted installed data of", &serial, &report);
        }
        Command::DeleteData { serial } => {
            let worker = library.clone();
            let target = serial.clone();
            let report = run_task("delete-data", move |_| {
                Ok(worker.delete_save_and_trophy(&target))
            })?;
            report_deletion("Deleted save and trophy data of", &serial, &report);
        }
        Command::DeleteAll { serial } => {
            let worker = library.clone();
            let target = serial.clone();
            let report = run_task("delete-all", move |_| Ok(worker.delete_all(&target)))?;
            report_deletion("Deleted", &serial, &report);

            // Deletion leaves the cache stale; rebuild it once the worker is done
            let worker = library.clone();
            let catalog = run_task("refresh", move |cancel| worker.refresh(cancel))?;
            info!("Catalog now holds {} titles", catalog.len());
        }
        Command::DeleteShaders { serial } => {
            let worker = library.clone();
            let target = serial.clone();
            let report = run_task("delete-shaders", move |_| {
                Ok(worker.delete_shader_cache(&target))
            })?;
            report_deletion("Deleted shader caches of", &serial, &report);
        }
        Command::Grant { dir } => {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("Cannot resolve {}", dir.display()))?;
            validate_grant_root(&dir)?;
            GrantStore::new(&library.roots().grant_file).save(&TreeGrant::for_dir(&dir))?;
            println!("Disc images will be read from {}", dir.display());
        }
        Command::Revoke => {
            GrantStore::new(&library.roots().grant_file).revoke()?;
            println!("Disc image directory forgotten");
        }
    }

    Ok(())
}
