// hnkit command line entry point.
// Parses a subcommand, runs it against the Hacker News API, and prints JSON to stdout.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hnkit::{HnClient, HnError, Result, StoryList};

const ENV_HELP: &str = "environment:
  HNKIT_API_BASE, HNKIT_SEARCH_BASE, HNKIT_USER_AGENT, HNKIT_TIMEOUT_SECS,
  HNKIT_MAX_RETRIES, HNKIT_MAX_DEPTH, HNKIT_FANOUT, HNKIT_BULK_CONCURRENCY,
  HNKIT_CACHE_CAPACITY, RUST_LOG";

/// Read Hacker News from the command line. Output is JSON.
#[derive(Debug, Parser)]
#[command(name = "hnkit", version, after_help = ENV_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Fetch one item
    Item { id: u64 },
    /// Fetch an item and its comment tree
    Tree {
        id: u64,
        /// Levels below the item (default from HNKIT_MAX_DEPTH)
        depth: Option<usize>,
    },
    /// Top stories
    Top(ListArgs),
    /// Newest stories
    New(ListArgs),
    /// Best stories
    Best(ListArgs),
    /// Ask HN stories
    Ask(ListArgs),
    /// Show HN stories
    Show(ListArgs),
    /// Job stories
    Job(ListArgs),
    /// Fetch a user profile
    User { name: String },
    /// Search stories
    Search {
        query: String,
        #[arg(default_value_t = 0)]
        page: u32,
    },
    /// List recently changed items and profiles
    Updates,
}

#[derive(Debug, PartialEq, Args)]
struct ListArgs {
    /// Number of stories to fetch
    #[arg(default_value_t = 30)]
    limit: usize,
}

impl Command {
    async fn run(self, client: &HnClient, cancel: &CancellationToken) -> Result<String> {
        let (list, args) = match self {
            Command::Item { id } => return to_json(&client.item(id, cancel).await?),
            Command::Tree { id, depth } => {
                let tree = match depth {
                    Some(depth) => client.tree(id, depth, cancel).await?,
                    None => client.default_tree(id, cancel).await?,
                };
                return to_json(&tree);
            }
            Command::User { name } => return to_json(&client.user(&name, cancel).await?),
            Command::Search { query, page } => {
                return to_json(&client.search(&query, page, cancel).await?);
            }
            Command::Updates => return to_json(&client.updates(cancel).await?),
            Command::Top(args) => (StoryList::Top, args),
            Command::New(args) => (StoryList::New, args),
            Command::Best(args) => (StoryList::Best, args),
            Command::Ask(args) => (StoryList::Ask, args),
            Command::Show(args) => (StoryList::Show, args),
            Command::Job(args) => (StoryList::Job, args),
        };
        to_json(&client.stories(list, args.limit, cancel).await?)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| HnError::Other(e.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hnkit=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = Cli::parse().command;

    let client = match HnClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling");
            trigger.cancel();
        }
    });

    debug!(?command, "running");
    match command.run(&client, &cancel).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
