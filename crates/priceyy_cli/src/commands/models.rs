//! Models command - List available models and the fallback chain.

use anyhow::Result;
use clap::Args;
use priceyy_chat::models::catalog;
use priceyy_chat::FallbackModelSelector;

use super::{print_json, GlobalOptions};

#[derive(Args)]
pub struct ModelsArgs {}

pub async fn execute(_args: ModelsArgs, global: &GlobalOptions) -> Result<()> {
    let config = global.config()?;
    let selector = FallbackModelSelector::from_config(&config);

    if global.json {
        return print_json(&serde_json::json!({
            "models": catalog(),
            "candidates": selector.candidates(),
        }));
    }

    println!("🧠 Models\n");
    let mut family = "";
    for entry in catalog() {
        if entry.family != family {
            family = entry.family;
            println!("  {}", family);
        }
        let marker = if entry.id == config.model {
            "*"
        } else if selector.candidates().contains(&entry.id.to_string()) {
            "+"
        } else {
            " "
        };
        println!("   {} {:<45} {}", marker, entry.id, entry.display_name);
    }

    println!("\n  * primary   + fallback");
    println!("  Order tried: {}", selector.candidates().join(" → "));
    Ok(())
}
