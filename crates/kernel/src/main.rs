//! notion-press
//!
//! Fetches Notion pages and prints them as WordPress block markup.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use notion_press::config::Config;
use notion_press::notion::normalize_id;
use notion_press::state::AppState;

/// Compile Notion pages into WordPress block markup.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the block markup of a page.
    Compile {
        /// Page id or Notion URL.
        page_id: String,
    },

    /// List the pages of a database.
    Pages {
        /// Database id or Notion URL (default: NOTION_DATABASE_ID).
        database_id: Option<String>,
    },

    /// Print a page's title and URL.
    Page {
        /// Page id or Notion URL.
        page_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(api_base = %config.notion_api_base, "Configuration loaded");

    let state = AppState::new(&config).context("failed to initialize application state")?;

    match args.command {
        Command::Compile { page_id } => {
            let id = parse_id(&page_id)?;
            let markup = state.compiler().compile_from_root(&id).await;
            if markup.is_empty() {
                info!(page_id = %id, "page produced no markup");
            }
            print!("{markup}");
        }
        Command::Pages { database_id } => {
            let Some(raw) = database_id.as_deref().or(state.default_database_id()) else {
                bail!("no database id given and NOTION_DATABASE_ID is not set");
            };
            let id = parse_id(raw)?;
            let pages = state.notion().query_database(&id).await;
            info!(database_id = %id, count = pages.len(), "database queried");
            for page in pages.iter().filter(|p| !p.archived) {
                println!("{}\t{}\t{}", page.id, page.last_edited_time, page.title());
            }
        }
        Command::Page { page_id } => {
            let id = parse_id(&page_id)?;
            let page = state
                .notion()
                .fetch_page(&id)
                .await
                .with_context(|| format!("page {id} could not be fetched"))?;
            println!("{}", page.title());
            println!("{}", page.url);
        }
    }

    Ok(())
}

fn parse_id(input: &str) -> Result<String> {
    normalize_id(input).with_context(|| format!("not a Notion id or URL: {input}"))
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,notion_press=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
