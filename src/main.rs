use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cairn::cli::{self, write::ForgetTarget, ScopeFlags};
use cairn::config::CairnConfig;
use cairn::db::Database;
use cairn::server;

#[derive(Parser)]
#[command(name = "cairn", version, about = "Local-first memory store for AI coding agents")]
struct Cli {
    /// Config file (defaults to ~/.cairn/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Act as a remote caller holding this bearer credential
    #[arg(long, global = true, value_name = "TOKEN")]
    bearer: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport unless --http)
    Serve {
        /// Serve streamable HTTP at /mcp instead of stdio
        #[arg(long)]
        http: bool,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that run once against an opened store.
#[derive(Subcommand)]
enum StoreCommand {
    /// Store a memory
    Add {
        content: String,
        /// rule, decision, fact, note, or skill
        #[arg(long = "type", short = 't')]
        memory_type: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Search memories by keyword
    Search {
        query: String,
        #[arg(long = "type", short = 't')]
        memory_type: Option<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// List memories, newest first
    List {
        #[arg(long = "type", short = 't')]
        memory_type: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Show one memory in full
    Inspect { id: String },
    /// Forget memories by id, or by filter
    Forget {
        ids: Vec<String>,
        #[arg(long = "type", short = 't')]
        memory_type: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        contains: Option<String>,
        /// Show what a filter matches without forgetting anything
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Print the memory section recalled for a query
    Context {
        query: Option<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Inject recalled memory into a JSON request envelope (stdin to stdout)
    Inject {
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Export memories as JSON
    Export {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Import memories from an export file
    Import {
        file: PathBuf,
        #[command(flatten)]
        scope: ScopeFlags,
    },
    /// Compute embeddings for memories that lack them
    Embed {
        /// Re-embed every memory, not only pending ones
        #[arg(long)]
        all: bool,
    },
    /// Run storage health checks
    Doctor {
        /// Rebuild the full-text index if it has drifted
        #[arg(long)]
        repair: bool,
    },
    /// Permanently purge forgotten memories
    Vacuum {
        /// Only purge memories forgotten at least this many days ago
        #[arg(long)]
        older_than_days: Option<u32>,
    },
    /// Show store statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CairnConfig::load_from(path)?,
        None => CairnConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => serve(config, http),
        Command::Store(command) => {
            let db = cli::open_store(&config, cli.bearer.as_deref())?;
            run(command, &config, db.as_ref())
        }
    }
}

fn run(command: StoreCommand, config: &CairnConfig, db: &dyn Database) -> Result<()> {
    match command {
        StoreCommand::Add {
            content,
            memory_type,
            tags,
            scope,
        } => cli::write::add(db, config, &content, memory_type.as_deref(), tags, &scope)?,
        StoreCommand::Search {
            query,
            memory_type,
            limit,
            scope,
        } => cli::search::search(db, config, &query, memory_type.as_deref(), limit, &scope)?,
        StoreCommand::List {
            memory_type,
            tags,
            limit,
            scope,
        } => cli::search::list(db, config, memory_type.as_deref(), tags, limit, &scope)?,
        StoreCommand::Inspect { id } => cli::inspect::inspect(db, &id)?,
        StoreCommand::Forget {
            ids,
            memory_type,
            tags,
            contains,
            dry_run,
            scope,
        } => {
            let target = if ids.is_empty() {
                ForgetTarget::Filter {
                    memory_type,
                    tags,
                    contains,
                    scope,
                    dry_run,
                }
            } else {
                ForgetTarget::Ids(ids)
            };
            cli::write::forget(db, target)?
        }
        StoreCommand::Context {
            query,
            limit,
            scope,
        } => cli::search::context(db, config, query.as_deref(), limit, &scope)?,
        StoreCommand::Inject { scope } => cli::inject::inject(db, config, &scope)?,
        StoreCommand::Export { output, scope } => {
            // Export defaults to everything rather than the default project.
            let filter = if scope.global || scope.project.is_some() {
                scope.read_filter(config)?
            } else {
                cairn::memory::ScopeFilter::All
            };
            cli::export::export(db, &filter, output.as_deref())?
        }
        StoreCommand::Import { file, scope } => cli::import::import(db, config, &file, &scope)?,
        StoreCommand::Embed { all } => cli::embed::embed(db, config, all)?,
        StoreCommand::Doctor { repair } => cli::doctor::doctor(db, config, repair)?,
        StoreCommand::Vacuum { older_than_days } => cli::maintenance::vacuum(
            db,
            older_than_days.unwrap_or(config.health.vacuum_age_days),
        )?,
        StoreCommand::Stats => cli::stats::stats(db)?,
    }

    Ok(())
}

/// The server is the only async part of cairn; everything else blocks.
fn serve(config: CairnConfig, http: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let http = http || config.server.transport == "http";
    runtime.block_on(async move {
        if http {
            server::serve_http(config).await
        } else {
            server::serve_stdio(config).await
        }
    })
}
