//! Entity commands.
//!
//! Every command builds a REST slice for the chosen entity type, performs one
//! slice operation and prints the resulting slice state as JSON on stdout.

mod fields;

use serde::Serialize;
use slicekit::{
    ClientConfig, ConcurrencyPolicy, ConfigError, Patch, QueryParams, RestClient, RestSlice,
    SliceError, Sort,
};
use slicekit_core::Entity;
use thiserror::Error;
use tracing::{info, warn};

use crate::Command;

pub use fields::{FieldArgError, build_entity, parse_assignments, parse_filter};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    Argument(#[from] FieldArgError),

    #[error(transparent)]
    Slice(#[from] SliceError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// A client plus the policy its slices use.
pub struct Connection {
    client: RestClient,
    policy: ConcurrencyPolicy,
}

/// Load configuration and build the REST client.
///
/// # Errors
///
/// Returns `CliError::Config` if the environment is incomplete or invalid.
pub fn connect(api_url: Option<&str>) -> Result<Connection, CliError> {
    let config = match api_url {
        Some(raw) => {
            ClientConfig::from_env_with_api_url(slicekit::config::parse_url("--api-url", raw)?)?
        }
        None => ClientConfig::from_env()?,
    };
    info!(api_url = %config.api_url, concurrency = %config.concurrency, "Connecting");

    Ok(Connection {
        client: RestClient::new(&config)?,
        policy: config.concurrency,
    })
}

/// Run one command against the slice of entity type `E`.
///
/// # Errors
///
/// Returns `CliError` if the arguments are invalid or the slice operation fails.
pub async fn run<E: Entity>(connection: &Connection, command: Command) -> Result<(), CliError> {
    let slice = RestSlice::<E>::from_client(&connection.client, connection.policy);

    let outcome = execute(&slice, command).await;
    if let Some(message) = slice.state().error_message {
        warn!(entity_type = E::DESCRIPTOR.name, %message, "Slice reported an error");
    }
    outcome
}

async fn execute<E: Entity>(slice: &RestSlice<E>, command: Command) -> Result<(), CliError> {
    match command {
        Command::List {
            page,
            size,
            sort,
            filter,
        } => {
            let mut query = QueryParams::new();
            query.page = page;
            query.size = size;
            for raw in &sort {
                query = query.sort(raw.parse::<Sort>().map_err(FieldArgError::Sort)?);
            }
            for raw in &filter {
                let (key, value) = parse_filter(raw)?;
                query = query.filter(key, value);
            }

            slice.get_entities(&query).await?;
            let state = slice.state();
            info!(
                count = state.entities.len(),
                total_items = ?state.total_items,
                "Fetched {}",
                E::DESCRIPTOR.path
            );
            print_json(&state.entities)
        }
        Command::Get { id } => {
            slice.get_entity(E::Id::from(id)).await?;
            print_json(&slice.state().entity)
        }
        Command::Create { set } => {
            let entity: E = build_entity(&parse_assignments::<E>(&set)?)?;
            slice.create_entity(&entity).await?;
            print_json(&slice.state().entity)
        }
        Command::Update { id, set, partial } => {
            let id = E::Id::from(id);
            let assignments = parse_assignments::<E>(&set)?;
            let patch = Patch::<E>::from_fields(id, assignments);

            if partial {
                slice.partial_update_entity(&patch).await?;
            } else {
                // Full replace: start from the stored record
                let current = slice.get_entity(id).await?;
                slice.update_entity(&patch.apply_to(&current)?).await?;
            }
            print_json(&slice.state().entity)
        }
        Command::Delete { id } => {
            slice.delete_entity(E::Id::from(id)).await?;
            info!(entity_type = E::DESCRIPTOR.name, id, "Deleted");
            Ok(())
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
