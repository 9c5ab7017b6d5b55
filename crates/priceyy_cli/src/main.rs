//! Priceyy CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Pricing API failure
//! - 4: Model failure

use std::process::ExitCode;

use clap::Parser;
use priceyy_chat::ChatError;
use priceyy_pricing::PricingError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const PRICING_ERROR: u8 = 3;
    pub const MODEL_ERROR: u8 = 4;
}

const DEFAULT_LOG_FILTER: &str = "priceyy=info,warn";
const VERBOSE_LOG_FILTER: &str = "priceyy=debug,info";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr so replies on stdout stay clean
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let global = cli.global();
    let result = match cli.command {
        Commands::Chat(args) => commands::chat::execute(args, &global).await,
        Commands::Threads(args) => commands::threads::execute(args, &global).await,
        Commands::Cart(args) => commands::cart::execute(args, &global).await,
        Commands::Catalog(args) => commands::catalog::execute(args, &global).await,
        Commands::Calculate(args) => commands::calculate::execute(args, &global).await,
        Commands::Models(args) => commands::models::execute(args, &global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(chat) = cause.downcast_ref::<ChatError>() {
            return match chat {
                ChatError::Pricing(pricing) => pricing_exit_code(pricing),
                ChatError::Transport(_)
                | ChatError::Api { .. }
                | ChatError::MalformedResponse(_)
                | ChatError::AllModelsFailed { .. }
                | ChatError::LlmNotConfigured => ExitCodes::MODEL_ERROR,
                ChatError::ThreadNotFound(_) | ChatError::EmptyMessage | ChatError::Config(_) => {
                    ExitCodes::INVALID_ARGS
                }
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(pricing) = cause.downcast_ref::<PricingError>() {
            return pricing_exit_code(pricing);
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

fn pricing_exit_code(e: &PricingError) -> u8 {
    match e {
        PricingError::InvalidItem(_)
        | PricingError::ItemNotFound(_)
        | PricingError::UnknownProvider(_)
        | PricingError::EmptyCart => ExitCodes::INVALID_ARGS,
        PricingError::Io(_) | PricingError::Serialization(_) => ExitCodes::GENERAL_ERROR,
        _ => ExitCodes::PRICING_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_errors_map_to_model_exit_code() {
        let err = anyhow::Error::new(ChatError::AllModelsFailed {
            attempts: Vec::new(),
        });
        assert_eq!(categorize_error(&err), ExitCodes::MODEL_ERROR);
    }

    #[test]
    fn test_pricing_errors_map_to_pricing_exit_code() {
        let err = anyhow::Error::new(ChatError::Pricing(PricingError::Api {
            status: 500,
            message: "boom".to_string(),
        }))
        .context("Failed to calculate cart");
        assert_eq!(categorize_error(&err), ExitCodes::PRICING_ERROR);
    }

    #[test]
    fn test_cart_mistakes_are_invalid_args() {
        let err = anyhow::Error::new(PricingError::ItemNotFound("x".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_unknown_errors_are_general() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }
}
