//! Catalog command - Browse the pricing catalog.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use priceyy_pricing::PricingApi;

use super::{print_json, GlobalOptions};

#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    command: CatalogCommand,
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// List cloud providers
    Providers,

    /// List regions of a provider
    Regions { provider: String },

    /// Search resource types in a region
    Resources {
        provider: String,
        region: String,
        /// Filter text; lists everything when omitted
        query: Option<String>,
    },

    /// Show pricing options for a resource type
    Options {
        provider: String,
        region: String,
        resource: String,
    },
}

pub async fn execute(args: CatalogArgs, global: &GlobalOptions) -> Result<()> {
    let session = global.open_session(global.config()?)?;
    let pricing = session.pricing();

    match args.command {
        CatalogCommand::Providers => {
            let providers = pricing
                .providers()
                .await
                .context("Failed to list providers")?;
            print_list(&providers, global.json)?;
        }
        CatalogCommand::Regions { provider } => {
            let regions = pricing
                .regions(&provider)
                .await
                .with_context(|| format!("Failed to list regions of {}", provider))?;
            print_list(&regions, global.json)?;
        }
        CatalogCommand::Resources {
            provider,
            region,
            query,
        } => {
            let resources = pricing
                .resource_types(&provider, &region, query.as_deref().unwrap_or_default())
                .await
                .with_context(|| format!("Failed to search resources in {}", region))?;
            print_list(&resources, global.json)?;
        }
        CatalogCommand::Options {
            provider,
            region,
            resource,
        } => {
            let options = pricing
                .resource_options(&provider, &region, &resource)
                .await
                .with_context(|| format!("Failed to load pricing options for {}", resource))?;
            if global.json {
                return print_json(&options);
            }
            if options.is_empty() {
                println!("No pricing options for {} in {}.", resource, region);
            }
            for option in options {
                let kind = if option.is_fixed() { "fixed" } else { "metered" };
                println!(
                    "  {:<12} ${:<12} per {:<10} ({})",
                    option.price_model, option.price_per_unit, option.unit_of_measure, kind
                );
            }
        }
    }

    Ok(())
}

fn print_list(values: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&values);
    }
    if values.is_empty() {
        println!("Nothing found.");
    }
    for value in values {
        println!("  {}", value);
    }
    Ok(())
}
