//! askdb CLI: ask natural-language questions of a configured database.

use anyhow::Context;
use askdb::config::Config;
use askdb::db::{Database, ExecutionErrorPolicy, QueryExecutor, SqlDatabase};
use askdb::llm::HttpChatModel;
use askdb::pipeline::{Pipeline, PipelineOptions};
use askdb::schema::SchemaCache;
use askdb::types::state::StageEvent;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Ask natural-language questions of a SQL database", long_about = None)]
struct Cli {
    /// Config file path (default: ~/.askdb/config.json)
    #[arg(long, global = true, env = "ASKDB_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a natural-language question
    Ask {
        /// Database name (default from config if omitted)
        #[arg(long, short)]
        db: Option<String>,

        /// The question
        question: String,

        /// Row-limit hint for query generation
        #[arg(long, default_value = "10")]
        top_k: usize,

        /// Fail the run on query execution errors instead of letting the
        /// model explain them
        #[arg(long)]
        abort_on_error: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Execute a raw SQL query
    Query {
        /// Database name
        #[arg(long, short)]
        db: Option<String>,

        /// SQL query string
        query: String,
    },

    /// Show the schema description used for prompt grounding
    Schema {
        /// Database name
        #[arg(long, short)]
        db: Option<String>,

        /// Recompute instead of using the cached description
        #[arg(long)]
        refresh: bool,
    },

    /// List configured databases
    Databases,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            db,
            question,
            top_k,
            abort_on_error,
            format,
        } => {
            let database = connect(&config, db.as_deref()).await?;
            println!(
                "{} Asking {}: \"{}\"",
                "→".cyan(),
                database.name().bright_white(),
                question
            );

            let model = Arc::new(HttpChatModel::from_env()?);
            let cache = Arc::new(SchemaCache::new());
            let options = PipelineOptions {
                top_k,
                on_execution_error: if abort_on_error {
                    ExecutionErrorPolicy::Abort
                } else {
                    ExecutionErrorPolicy::Report
                },
            };
            let pipeline = Pipeline::new(model, database, cache, options);

            let run = pipeline
                .run_with_observer(&question, &mut render_event)
                .await;

            if let Some(error) = run.error {
                println!("{} Run failed: {}", "✗".red(), error);
                std::process::exit(1);
            }

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&run.state)?);
            } else if let Some(answer) = run.answer() {
                println!("\n{} {}", "✓".green(), answer.bright_white());
            }
        }

        Commands::Query { db, query } => {
            let database = connect(&config, db.as_deref()).await?;
            let executor = QueryExecutor::new(database).with_policy(ExecutionErrorPolicy::Abort);

            let result = executor.execute(&query).await?;
            if result.is_empty() {
                println!("{}", "(no rows)".dimmed());
            } else {
                println!("{}", result);
            }
        }

        Commands::Schema { db, refresh } => {
            let database = connect(&config, db.as_deref()).await?;
            let cache = SchemaCache::new();
            if refresh {
                cache.invalidate(database.name());
            }

            let description = cache.describe(database.as_ref()).await?;
            println!(
                "{} Database: {} ({})",
                "✓".green(),
                database.name().bright_white(),
                description.dialect.dimmed()
            );
            println!("\n{}", description.table_info);
        }

        Commands::Databases => {
            if config.databases.is_empty() {
                println!("{}", "No databases configured".yellow());
                println!("Edit {}", Config::config_file()?.display());
                return Ok(());
            }

            println!("{}", "Configured databases:".cyan().bold());
            for name in config.names() {
                let db = config.get(&name)?;
                let marker = if config.default_database.as_deref() == Some(name.as_str()) {
                    " (default)".dimmed()
                } else {
                    "".dimmed()
                };
                println!("  {} {}{}", "•".green(), name.bright_white(), marker);
                println!(
                    "    {}://{}@{}:{}/{}",
                    db.scheme, db.username, db.host, db.port, db.database
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw).into_owned();
            Config::load_from(&PathBuf::from(expanded)).context("failed to load config")
        }
        None => Config::load().context("failed to load config"),
    }
}

async fn connect(config: &Config, name: Option<&str>) -> anyhow::Result<Arc<Database>> {
    let db_config = config.resolve(name)?;
    let database = Database::connect(db_config)
        .await
        .with_context(|| format!("cannot reach database '{}'", db_config.name))?;
    Ok(Arc::new(database))
}

/// Render one committed stage delta as it arrives.
fn render_event(event: &StageEvent) {
    let payload = event.delta.text();
    let body = if payload.is_empty() {
        "(no rows)".dimmed().to_string()
    } else {
        payload.to_string()
    };
    println!("\n{}", event.stage.as_str().cyan().bold());
    println!("  {}", body);
}
