//! CLI command definitions.
//!
//! This module defines the command structure for the Priceyy CLI. Each
//! subcommand opens the workspace session and works on its threads, cart or
//! the pricing catalog.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use priceyy_chat::{AppSession, ChatConfig};

pub mod calculate;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod models;
pub mod threads;

/// Priceyy - cloud cost assistant
#[derive(Parser)]
#[command(name = "priceyy")]
#[command(version, about = "Priceyy - compare and estimate cloud costs from the terminal")]
#[command(long_about = r#"
Priceyy helps you compare cloud costs across AWS, Azure and GCP. Ask the
assistant in plain language, browse the pricing catalog and build an
estimate cart that is priced by the pricing service.

COMMANDS:
  chat       → Talk to the cost assistant (tool-calling, with model fallback)
  threads    → List, show, select or delete conversation threads
  cart       → Inspect and edit the estimate cart
  catalog    → Browse providers, regions, resources and pricing options
  calculate  → Price the whole cart
  models     → List the available models and the fallback chain

CONFIGURATION:
  .priceyy/settings.json in the workspace, then OPENROUTER_API_KEY,
  PRICEYY_MODEL, PRICEYY_PRICING_URL and PRICEYY_MAX_ROUNDS.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Pricing API failure
  4 - Model failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace directory holding .priceyy/ (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Pricing API base URL
    #[arg(long, global = true)]
    pub pricing_url: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Talk to the cost assistant
    Chat(chat::ChatArgs),

    /// Manage conversation threads
    Threads(threads::ThreadsArgs),

    /// Inspect and edit the estimate cart
    Cart(cart::CartArgs),

    /// Browse the pricing catalog
    Catalog(catalog::CatalogArgs),

    /// Price the whole cart
    Calculate(calculate::CalculateArgs),

    /// List available models
    Models(models::ModelsArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub workspace: Option<PathBuf>,
    pub pricing_url: Option<String>,
    pub json: bool,
}

impl Cli {
    pub fn global(&self) -> GlobalOptions {
        GlobalOptions {
            workspace: self.workspace.clone(),
            pricing_url: self.pricing_url.clone(),
            json: self.json,
        }
    }
}

impl GlobalOptions {
    pub fn workspace_root(&self) -> Result<PathBuf> {
        match &self.workspace {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    /// Resolve configuration for the workspace, with CLI flags applied last.
    pub fn config(&self) -> Result<ChatConfig> {
        let root = self.workspace_root()?;
        let mut config = ChatConfig::load(&root).context("Failed to load configuration")?;
        if let Some(url) = &self.pricing_url {
            config = config.with_pricing_api_url(url.clone());
        }
        Ok(config)
    }

    pub fn open_session(&self, config: ChatConfig) -> Result<AppSession> {
        let root = self.workspace_root()?;
        AppSession::open(&root, config)
            .with_context(|| format!("Failed to open workspace {}", root.display()))
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["priceyy", "cart", "list", "--json", "-w", "/tmp/ws"]);
        let global = cli.global();
        assert!(global.json);
        assert_eq!(global.workspace, Some(PathBuf::from("/tmp/ws")));
    }
}
