//! CLI module for system globals administration
//!
//! Provides subcommands for inspecting and changing globals:
//! - `list`: records with their descriptions
//! - `get`: one coerced value
//! - `set`: write a value through the registry
//! - `dict`: prefix projection as JSON
//! - `clear-cache`: drop the cached snapshot

pub mod read;
pub mod write;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::globals::GlobalRegistry;
use crate::infrastructure::logging;

/// System globals - Cached named configuration values
#[derive(Parser)]
#[command(name = "system-globals")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every global with its value and description
    List(ListArgs),

    /// Print the coerced value of one global
    Get(GetArgs),

    /// Store a value, creating the global if needed
    Set(SetArgs),

    /// Print globals under a prefix as a JSON object
    Dict(DictArgs),

    /// Drop the cached snapshot so the next read reloads it
    ClearCache,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show names starting with this prefix (case-insensitive)
    #[arg(long, default_value = "")]
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub name: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub name: String,

    /// Stored verbatim as text
    pub value: String,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct DictArgs {
    /// Keep names starting with this prefix and strip it from the keys
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Lowercase the returned keys
    #[arg(long)]
    pub lower: bool,

    /// Return stored text instead of coerced values
    #[arg(long)]
    pub raw: bool,
}

/// Loads configuration and logging, then builds the registry every command uses
pub async fn bootstrap() -> anyhow::Result<GlobalRegistry> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging)?;

    crate::create_registry_with_config(&config).await
}

/// Runs one command against `registry`, writing human output to `out`
pub async fn run(
    registry: &GlobalRegistry,
    command: Command,
    out: &mut impl std::io::Write,
) -> anyhow::Result<()> {
    match command {
        Command::List(args) => read::list(registry, &args, out).await,
        Command::Get(args) => read::get(registry, &args, out).await,
        Command::Dict(args) => read::dict(registry, &args, out).await,
        Command::Set(args) => write::set(registry, args, out).await,
        Command::ClearCache => write::clear_cache(registry, out).await,
    }
}
