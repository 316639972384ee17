use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use incgraph::config::{load_config, save_config};
use incgraph::errors::{CodeGraphError, Result};
use incgraph::graph::{GraphQueryManager, SymbolRef};
use incgraph::project::ProjectIndex;
use incgraph::types::*;
use incgraph::watch::{ChangeWatcher, UpdateQueue};

/// Incremental code graph for TypeScript and JavaScript projects.
#[derive(Parser)]
#[command(
    name = "incgraph",
    about = "Incremental code graph for TypeScript and JavaScript projects"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration for the project
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
    },
    /// Index the project and print counts
    Index {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// List symbols, optionally filtered
    Symbols {
        /// Symbol kind (function, class, variable, import, export, interface, type_alias)
        #[arg(short, long)]
        kind: Option<String>,
        /// Exact symbol name
        #[arg(short, long)]
        name: Option<String>,
        /// Only symbols declared in this file
        #[arg(short, long)]
        file: Option<String>,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Show references to every symbol with the given name
    Refs {
        /// Symbol name
        name: String,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Print the file dependency graph
    Deps {
        /// Map imports to project files instead of raw specifiers
        #[arg(short, long)]
        resolved: bool,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Exported symbols per file
    Exports {
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Imported symbols per file
    Imports {
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Show graph statistics
    Status {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Index, then keep the graph up to date until interrupted
    Watch {
        /// Project path (default: current directory)
        path: Option<String>,
    },
}

#[derive(Serialize)]
struct SymbolListing<'a> {
    name: &'a str,
    kind: SymbolKind,
    file: &'a str,
    line: u32,
    exported: bool,
}

impl<'a> From<&'a Symbol> for SymbolListing<'a> {
    fn from(s: &'a Symbol) -> Self {
        Self {
            name: &s.name,
            kind: s.kind,
            file: &s.file_path,
            line: s.span.start_line,
            exported: s.is_exported(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("incgraph=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let project_path = resolve_path(path);
            let config = load_config(&project_path)?;
            save_config(&project_path, &config)?;
            println!("Initialized incgraph at {}", project_path.display());
        }
        Commands::Index { path, json } => {
            let index = ProjectIndex::open(&resolve_path(path))?;
            let result = index.index_all()?;
            if json {
                print_json(&result)?;
            } else {
                println!(
                    "Indexed {} of {} files ({} skipped, {} failed): {} symbols, {} dependencies in {}ms",
                    result.indexed_count,
                    result.file_count,
                    result.skipped_count,
                    result.failed_count,
                    result.symbol_count,
                    result.dependency_count,
                    result.duration_ms
                );
                for (file, message) in index.failures() {
                    println!("  failed: {}: {}", file, message);
                }
            }
        }
        Commands::Symbols {
            kind,
            name,
            file,
            path,
        } => {
            let kind = match kind {
                Some(k) => Some(SymbolKind::from_str(&k).ok_or_else(|| CodeGraphError::Config {
                    message: format!("unknown symbol kind '{}'", k),
                })?),
                None => None,
            };
            let index = open_indexed(path)?;
            let graph = index.graph();
            let queries = GraphQueryManager::new(&graph);
            let symbols: Vec<&Symbol> = match (&name, &file) {
                (Some(name), _) => queries.symbols_by_name(name),
                (None, Some(file)) => queries.symbols_in_file(file),
                (None, None) => graph.symbols().collect(),
            };
            let listing: Vec<SymbolListing> = symbols
                .into_iter()
                .filter(|s| kind.map_or(true, |k| s.kind == k))
                .filter(|s| file.as_deref().map_or(true, |f| s.file_path == f))
                .map(SymbolListing::from)
                .collect();
            print_json(&listing)?;
        }
        Commands::Refs { name, path } => {
            let index = open_indexed(path)?;
            let graph = index.graph();
            let queries = GraphQueryManager::new(&graph);
            let references = queries.references_of(&name);
            if references.is_empty() {
                eprintln!("No references to '{}'", name);
            }
            print_json(&references)?;
        }
        Commands::Deps { resolved, path } => {
            let index = open_indexed(path)?;
            let graph = index.graph();
            let queries = GraphQueryManager::new(&graph);
            if resolved {
                print_json(&queries.resolved_dependency_graph())?;
            } else {
                print_json(&queries.dependency_graph())?;
            }
        }
        Commands::Exports { path } => {
            let index = open_indexed(path)?;
            let graph = index.graph();
            print_symbol_groups(GraphQueryManager::new(&graph).exported_symbols_by_file())?;
        }
        Commands::Imports { path } => {
            let index = open_indexed(path)?;
            let graph = index.graph();
            print_symbol_groups(GraphQueryManager::new(&graph).imported_symbols_by_file())?;
        }
        Commands::Status { path, json } => {
            let index = open_indexed(path)?;
            let graph = index.graph();
            let summary = GraphQueryManager::new(&graph).summary();
            if json {
                print_json(&summary)?;
            } else {
                println!("incgraph status");
                println!("  Files:        {}", summary.total_files);
                println!("  Nodes:        {}", summary.total_nodes);
                println!("  Symbols:      {}", summary.total_symbols);
                println!("  Dependencies: {}", summary.total_dependencies);
                if !summary.symbols_by_kind.is_empty() {
                    println!("\n  Symbols by kind:");
                    for (kind, count) in &summary.symbols_by_kind {
                        println!("    {}: {}", kind, count);
                    }
                }
                let failures = index.failures();
                if !failures.is_empty() {
                    println!("\n  Failed files: {}", failures.len());
                }
            }
        }
        Commands::Watch { path } => {
            let index = Arc::new(open_indexed(path)?);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch(index))?;
        }
    }
    Ok(())
}

async fn watch(index: Arc<ProjectIndex>) -> Result<()> {
    let mut watcher = ChangeWatcher::new(index.root())?;
    let queue = UpdateQueue::spawn(Arc::clone(&index));

    loop {
        tokio::select! {
            event = watcher.next_event() => match event {
                Some(event) => queue.push(event)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let applied = queue.shutdown().await;
    let graph = index.graph();
    println!(
        "Applied {} changes; graph has {} files and {} symbols",
        applied,
        graph.file_count(),
        graph.symbol_count()
    );
    Ok(())
}

/// Opens the project and runs a full index; the graph is not persisted.
fn open_indexed(path: Option<String>) -> Result<ProjectIndex> {
    let index = ProjectIndex::open(&resolve_path(path))?;
    index.index_all()?;
    Ok(index)
}

fn print_symbol_groups(groups: std::collections::BTreeMap<String, Vec<&Symbol>>) -> Result<()> {
    let listing: std::collections::BTreeMap<String, Vec<SymbolRef>> = groups
        .into_iter()
        .map(|(file, symbols)| (file, symbols.into_iter().map(SymbolRef::from).collect()))
        .collect();
    print_json(&listing)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
