//! slicekit CLI - Drive entity slices against a live persistence service.
//!
//! # Usage
//!
//! ```bash
//! # List strap colors, newest first
//! slicekit strap-color list --size 20 --sort id,desc
//!
//! # Filter a list
//! slicekit customer list --filter lastName.contains=Smith
//!
//! # Create, read, update and delete one record
//! slicekit strap-color create --set name=Red --set value=#ff0000
//! slicekit strap-color get 5
//! slicekit strap-color update 5 --set name=Crimson
//! slicekit order-item update 7 --set quantity=3 --partial
//! slicekit strap-color delete 5
//! ```
//!
//! # Environment Variables
//!
//! Read through `ClientConfig::from_env` (a `.env` file is loaded first):
//! `SLICEKIT_API_URL`, `SLICEKIT_API_TOKEN`, `SLICEKIT_TIMEOUT_SECS`,
//! `SLICEKIT_CONCURRENCY`, `SLICEKIT_APP_NAME`. Set `SLICEKIT_LOG_JSON` for
//! JSON log lines on stderr.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use slicekit_core::entities::{Customer, Description, OrderItem, StrapColor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "slicekit")]
#[command(author, version, about = "Entity slices over a REST persistence service")]
struct Cli {
    /// Service root URL (overrides `SLICEKIT_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Entity type to operate on
    #[arg(value_enum)]
    entity: EntityKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EntityKind {
    StrapColor,
    Description,
    Customer,
    OrderItem,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a page of records
    List {
        /// Zero-based page number
        #[arg(long)]
        page: Option<u32>,

        /// Page size
        #[arg(long)]
        size: Option<u32>,

        /// Sort order as `field,asc` or `field,desc` (repeatable)
        #[arg(long)]
        sort: Vec<String>,

        /// Filter as `field.operator=value` (repeatable)
        #[arg(long)]
        filter: Vec<String>,
    },
    /// Fetch one record
    Get { id: i64 },
    /// Create a record
    Create {
        /// Field assignment as `field=value` (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    /// Update a record
    Update {
        id: i64,

        /// Field assignment as `field=value` (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Send only the assigned fields instead of replacing the record
        #[arg(long)]
        partial: bool,
    },
    /// Delete a record
    Delete { id: i64 },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "slicekit=info,slicekit_cli=info".into());

    let json = std::env::var("SLICEKIT_LOG_JSON").is_ok();
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let client = commands::connect(cli.api_url.as_deref())?;

    match cli.entity {
        EntityKind::StrapColor => commands::run::<StrapColor>(&client, cli.command).await,
        EntityKind::Description => commands::run::<Description>(&client, cli.command).await,
        EntityKind::Customer => commands::run::<Customer>(&client, cli.command).await,
        EntityKind::OrderItem => commands::run::<OrderItem>(&client, cli.command).await,
    }
}
