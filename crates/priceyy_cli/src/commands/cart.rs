//! Cart command - Inspect and edit the estimate cart.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use priceyy_chat::AppSession;
use priceyy_pricing::{Cart, NewCartItem, PricingApi, QuantityUpdate, ResourceOption, UsageUnit};

use super::{print_json, GlobalOptions};

#[derive(Args)]
pub struct CartArgs {
    #[command(subcommand)]
    command: Option<CartCommand>,
}

#[derive(Subcommand)]
enum CartCommand {
    /// Show the cart with local estimates
    List,

    /// Add a resource to the cart
    Add(AddArgs),

    /// Change the instance count or usage of a line
    Update {
        id: String,

        /// Number of instances
        #[arg(long)]
        count: Option<u32>,

        /// Usage per instance
        #[arg(long)]
        usage: Option<f64>,
    },

    /// Remove a line
    Remove { id: String },

    /// Remove every line
    Clear,
}

#[derive(Args)]
struct AddArgs {
    /// Cloud provider (aws, azure, gcp)
    #[arg(long)]
    provider: String,

    #[arg(long)]
    region: String,

    /// Resource type, e.g. t2.micro
    #[arg(long)]
    resource: String,

    /// Pricing model
    #[arg(long, default_value = "OnDemand")]
    price_model: String,

    /// Unit of measure; looked up in the catalog when omitted
    #[arg(long, requires = "price")]
    unit: Option<String>,

    /// Price per unit; looked up in the catalog when omitted
    #[arg(long, requires = "unit")]
    price: Option<f64>,

    /// Number of instances
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Usage per instance (defaults to a month of hours for hourly units)
    #[arg(long)]
    usage: Option<f64>,
}

pub async fn execute(args: CartArgs, global: &GlobalOptions) -> Result<()> {
    let session = global.open_session(global.config()?)?;

    match args.command.unwrap_or(CartCommand::List) {
        CartCommand::List => {
            let cart = session.cart();
            if global.json {
                return print_json(&cart);
            }
            print_cart(&cart);
        }
        CartCommand::Add(add) => {
            let item = resolve_item(&session, add).await?;
            let line = session.add_to_cart(item)?;
            println!(
                "🛒 {} × {} in {} ({} {}): ~${:.2}",
                line.count,
                line.resource_type,
                line.region,
                line.price_model,
                line.unit_of_measure,
                line.estimated_cost()
            );
            println!("   id: {}", line.id);
        }
        CartCommand::Update { id, count, usage } => {
            if count.is_none() && usage.is_none() {
                anyhow::bail!("Nothing to update; pass --count or --usage");
            }
            let line = session.update_cart_item(
                &id,
                QuantityUpdate {
                    count,
                    usage_quantity: usage,
                },
            )?;
            println!(
                "✅ {}: {} × {} {}",
                line.resource_type,
                line.count,
                line.usage_quantity,
                line.unit().label()
            );
        }
        CartCommand::Remove { id } => {
            let line = session.remove_cart_item(&id)?;
            println!("🗑️  Removed {} ({})", line.resource_type, line.id);
        }
        CartCommand::Clear => {
            let removed = session.clear_cart()?;
            println!("🗑️  Removed {} line(s)", removed);
        }
    }

    Ok(())
}

/// Fill in price and unit from the catalog unless both were given.
async fn resolve_item(session: &AppSession, args: AddArgs) -> Result<NewCartItem> {
    let (unit, price) = match (args.unit, args.price) {
        (Some(unit), Some(price)) => (unit, price),
        _ => {
            let options = session
                .pricing()
                .resource_options(&args.provider, &args.region, &args.resource)
                .await
                .with_context(|| format!("Failed to look up pricing for {}", args.resource))?;
            let option = pick_option(&options, &args.price_model).with_context(|| {
                format!(
                    "No {} pricing option for {} in {}",
                    args.price_model, args.resource, args.region
                )
            })?;
            (option.unit_of_measure.clone(), option.price_per_unit)
        }
    };

    let usage = args
        .usage
        .unwrap_or_else(|| UsageUnit::parse(&unit).default_usage());

    Ok(NewCartItem {
        provider: args.provider,
        region: args.region,
        resource_type: args.resource,
        price_model: args.price_model,
        unit_of_measure: unit,
        price_per_unit: price,
        usage_quantity: usage,
        count: args.count,
    })
}

fn pick_option<'a>(options: &'a [ResourceOption], price_model: &str) -> Option<&'a ResourceOption> {
    options
        .iter()
        .find(|o| o.price_model.eq_ignore_ascii_case(price_model))
}

fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("🛒 Cart is empty.");
        return;
    }

    println!("🛒 Cart ({} line(s))\n", cart.len());
    for item in cart.items() {
        let quantity = if item.unit().is_fixed() {
            format!("{} item(s)", item.count)
        } else {
            format!(
                "{} × {} {}",
                item.count,
                item.usage_quantity,
                item.unit().label()
            )
        };
        println!(
            "  {}  {}/{}  {} [{}]  {}  ~${:.2}",
            item.id,
            item.provider,
            item.region,
            item.resource_type,
            item.price_model,
            quantity,
            item.estimated_cost()
        );
    }
    println!("\n  Estimated total: ${:.2}", cart.estimated_total());
    println!("  Run `priceyy calculate` for the pricing service's figure.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(model: &str, unit: &str, price: f64) -> ResourceOption {
        ResourceOption {
            price_model: model.to_string(),
            unit_of_measure: unit.to_string(),
            price_per_unit: price,
        }
    }

    #[test]
    fn test_pick_option_by_price_model() {
        let options = vec![option("OnDemand", "Hrs", 0.0116), option("Reserved", "1", 60.0)];

        assert_eq!(pick_option(&options, "reserved").unwrap().price_per_unit, 60.0);
        assert_eq!(pick_option(&options, "OnDemand").unwrap().unit_of_measure, "Hrs");
        assert!(pick_option(&options, "Spot").is_none());
    }
}
