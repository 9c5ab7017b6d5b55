//! Calculate command - Price the whole cart.

use anyhow::{Context, Result};
use clap::Args;

use super::{print_json, GlobalOptions};

#[derive(Args)]
pub struct CalculateArgs {}

pub async fn execute(_args: CalculateArgs, global: &GlobalOptions) -> Result<()> {
    let session = global.open_session(global.config()?)?;
    let result = session
        .calculate()
        .await
        .context("Failed to calculate cart")?;

    if global.json {
        return print_json(&result);
    }

    println!("💰 Monthly estimate\n");
    for line in &result.breakdown {
        println!(
            "  {:<24} {:<16} ${:>10.2}",
            line.resource_type, line.region, line.total_cost
        );
    }
    if !result.breakdown.is_empty() {
        println!();
    }
    println!("  Total: ${:.2}", result.total_cost);

    Ok(())
}
