//! Command-line entry point for quickfind.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use quickfind::app_dirs;
use quickfind::config::{self, MonitorSettings};
use quickfind::format::{human_mtime, human_size, human_time};
use quickfind::index::{IndexDatabase, SearchHit, SearchOptions};
use quickfind::logging;
use quickfind::monitor::{IndexMonitor, rebuild_root, reconcile_root, scan_root};

#[derive(Parser)]
#[command(
    name = "quickfind",
    version,
    about = "Fast file search with an always-fresh metadata index"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index for a directory from scratch.
    Index {
        /// Directory to index.
        path: PathBuf,
    },
    /// Incrementally refresh one root, or every known root.
    Update {
        /// Root to refresh; defaults to all indexed roots.
        path: Option<PathBuf>,
    },
    /// Search indexed file names; * and ? work as wildcards.
    Search {
        /// Substring or wildcard pattern.
        query: String,
        /// Maximum number of results.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Match case exactly.
        #[arg(short, long)]
        case_sensitive: bool,
    },
    /// List indexed roots with their last sync time and file count.
    Roots,
    /// Drop a root and everything indexed under it.
    Forget {
        /// Root to remove from the index.
        path: PathBuf,
    },
    /// Monitor roots in the foreground, keeping the index fresh.
    Watch {
        /// Roots to monitor; defaults to all indexed roots.
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let cli = Cli::parse();
    let settings = config::load_or_default()?.monitor;
    let db_path = app_dirs::index_db_path()?;

    match cli.command {
        Some(Command::Index { path }) => run_index(&db_path, &path, &settings),
        Some(Command::Update { path }) => run_update(&db_path, path.as_deref(), &settings),
        Some(Command::Search {
            query,
            limit,
            case_sensitive,
        }) => run_search(&db_path, &query, limit, case_sensitive),
        Some(Command::Roots) => run_roots(&db_path),
        Some(Command::Forget { path }) => run_forget(&db_path, &path),
        Some(Command::Watch { paths }) => run_watch(&db_path, paths, &settings),
        None => run_interactive(&db_path, &settings),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn run_index(
    db_path: &Path,
    path: &Path,
    settings: &MonitorSettings,
) -> Result<(), Box<dyn Error>> {
    let root = absolute(path);
    let db = IndexDatabase::open(db_path)?;
    let snapshot = scan_root(&root, &settings.scan_options())?;
    let result = rebuild_root(&db, &root, &snapshot)?;
    println!("Indexed {} files under {}", result.total_files, root.display());
    Ok(())
}

fn run_update(
    db_path: &Path,
    path: Option<&Path>,
    settings: &MonitorSettings,
) -> Result<(), Box<dyn Error>> {
    let db = IndexDatabase::open(db_path)?;
    let roots = match path {
        Some(path) => vec![absolute(path)],
        None => db
            .list_roots()?
            .into_iter()
            .map(|state| state.root_path)
            .collect(),
    };
    if roots.is_empty() {
        println!("No roots indexed yet. Run `quickfind index <path>` first.");
        return Ok(());
    }
    for root in roots {
        if db.root_state(&root)?.is_none() {
            println!(
                "{} has not been indexed before. Run `quickfind index` to create it.",
                root.display()
            );
            continue;
        }
        let snapshot = scan_root(&root, &settings.scan_options())?;
        let result = reconcile_root(&db, &root, &snapshot, &settings.reconcile_options())?;
        println!(
            "{}: {} new, {} updated, {} removed, {} total",
            root.display(),
            result.created,
            result.modified,
            result.deleted,
            result.total_files
        );
    }
    Ok(())
}

fn run_search(
    db_path: &Path,
    query: &str,
    limit: usize,
    case_sensitive: bool,
) -> Result<(), Box<dyn Error>> {
    let db = IndexDatabase::open(db_path)?;
    let options = SearchOptions {
        limit,
        case_sensitive,
    };
    print_hits(&db.search(query, &options)?);
    Ok(())
}

fn run_roots(db_path: &Path) -> Result<(), Box<dyn Error>> {
    let db = IndexDatabase::open(db_path)?;
    let roots = db.list_roots()?;
    if roots.is_empty() {
        println!("No roots indexed yet.");
        return Ok(());
    }
    for state in roots {
        println!(
            "{:<50} {:>8} files  {}",
            state.root_path.display(),
            state.file_count,
            human_time(state.last_synced_at)
        );
    }
    Ok(())
}

fn run_forget(db_path: &Path, path: &Path) -> Result<(), Box<dyn Error>> {
    let root = absolute(path);
    let db = IndexDatabase::open(db_path)?;
    match db.root_state(&root)? {
        Some(state) => {
            db.forget_root(&root)?;
            println!("Forgot {} ({} files)", root.display(), state.file_count);
        }
        None => println!("{} is not an indexed root.", root.display()),
    }
    Ok(())
}

fn run_watch(
    db_path: &Path,
    paths: Vec<PathBuf>,
    settings: &MonitorSettings,
) -> Result<(), Box<dyn Error>> {
    let roots: Vec<PathBuf> = if paths.is_empty() {
        IndexDatabase::open(db_path)?
            .list_roots()?
            .into_iter()
            .map(|state| state.root_path)
            .collect()
    } else {
        paths.iter().map(|path| absolute(path)).collect()
    };
    if roots.is_empty() {
        println!("Nothing to watch. Run `quickfind index <path>` or pass paths.");
        return Ok(());
    }

    let mut monitor = IndexMonitor::new(db_path, roots, settings.monitor_options());
    monitor.start()?;
    println!("Watching {} root(s). Type a query, or 'exit' to quit.", monitor.roots().len());
    interactive_loop(db_path, settings)?;
    monitor.stop();
    Ok(())
}

fn run_interactive(db_path: &Path, settings: &MonitorSettings) -> Result<(), Box<dyn Error>> {
    println!("quickfind interactive mode. Type 'help' for commands.");
    interactive_loop(db_path, settings)
}

fn interactive_loop(db_path: &Path, settings: &MonitorSettings) -> Result<(), Box<dyn Error>> {
    let db = IndexDatabase::open(db_path)?;
    let stdin = io::stdin();
    loop {
        print!("Search> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "help" => print_help(),
            "roots" => run_roots(db_path)?,
            "update" => run_update(db_path, None, settings)?,
            query => print_hits(&db.search(query, &SearchOptions::default())?),
        }
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  exit     quit");
    println!("  update   incrementally refresh every indexed root");
    println!("  roots    show indexed roots");
    println!("  help     show this help");
    println!("Anything else is a search query; * and ? work as wildcards.");
}

fn print_hits(hits: &[SearchHit]) {
    println!("Found {} file(s)", hits.len());
    for hit in hits {
        println!(
            "{:<40} {:>10} {} {}",
            hit.name,
            human_size(hit.size),
            human_mtime(hit.modified_ns),
            hit.path.display()
        );
    }
}
