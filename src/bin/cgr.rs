//! `cgr` — a thin CLI front end over the query engine and link inferencer.
//!
//! Not a server: opens a `DATABASE_URL` Postgres pool, runs one command,
//! and exits. Intended for local exploration and for wiring into an
//! ingestion pipeline's post-processing step.

use anyhow::Result;
use clap::{Parser, Subcommand};
use codegraph_engine::config::load_config;
use codegraph_engine::linker::run_link_inference;
use codegraph_engine::observability::init_logging_with_level;
use codegraph_engine::query::execute;
use codegraph_engine::store::pg::PgStore;
use codegraph_engine::Store;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Code-graph query and link-inference CLI")]
struct Args {
    /// Postgres connection string for the graph store.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Enable debug-level logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single Cypher-subset query across every project known to the
    /// store and print the result table.
    Query {
        /// Query text, e.g. `MATCH (f:Function)-[:CALLS]->(g:Function) RETURN f.name, g.name`.
        text: String,
    },
    /// Run the HTTP/async link inference pass over a project.
    Link {
        /// Project name as registered in the store.
        project: String,
        /// Project root on disk, used to resolve `.cgrconfig` and source
        /// files referenced by the graph. Defaults to the project's
        /// registered root when omitted.
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging_with_level(args.verbose)?;

    let pool = PgPoolOptions::new().max_connections(10).connect(&args.database_url).await?;
    let store = PgStore::new(pool);

    match args.command {
        Command::Query { text } => {
            let result = execute(&store, &text).await?;
            print_table(&result);
        }
        Command::Link { project, root } => {
            let project_root = match root {
                Some(r) => r,
                None => {
                    let info = store
                        .get_project(&project)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("unknown project '{project}'"))?;
                    PathBuf::from(info.root)
                }
            };
            let config = load_config(&project_root).http_linker;
            let emitted = run_link_inference(&store, &project, &config).await?;
            info!(project = %project, routes_emitted = emitted, "link inference complete");
        }
    }

    Ok(())
}

fn print_table(result: &codegraph_engine::QueryResult) {
    println!("{}", result.columns.join(" | "));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    println!("({} rows)", result.rows.len());
}
