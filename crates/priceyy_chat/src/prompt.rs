//! System prompt for the cost assistant.

use priceyy_pricing::units::{INSTANCE_PRESETS, USAGE_PRESETS};

const BASE_PROMPT: &str = "You are a helpful cloud pricing assistant for Priceyy, an intelligent cloud cost comparison platform.

Your responsibilities:
- Help users understand and compare cloud costs across AWS, Azure, and GCP
- Provide accurate pricing estimates and cost optimization recommendations
- Explain resource configurations and their cost implications
- Use tables to compare pricing when relevant

Always be concise, accurate, and helpful. When discussing pricing, mention that costs may vary by region and usage patterns.";

const TOOL_GUIDANCE: &str = "Tools:
- Use get_providers, get_regions, search_resources and get_pricing_options to look up real catalog data instead of guessing prices.
- Provider names are lowercase: aws, azure, gcp.
- Only call add_to_cart after the user confirmed provider, region, resource, pricing model and quantity.
- In add_to_cart, quantity is the number of instances and usage is the usage per instance in the resource's unit (for hourly resources, 730 hours is one month). Resources whose unit is \"1\" have a fixed price and take no usage.
- Call tools with JSON arguments through the tool-call channel.";

/// The fixed system prompt sent with every turn.
pub fn system_prompt() -> String {
    let usage = USAGE_PRESETS
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let instances = INSTANCE_PRESETS
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\n\n{}\n- Typical usage amounts are {} hours; typical instance counts are {}.",
        BASE_PROMPT, TOOL_GUIDANCE, usage, instances
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_tools_and_presets() {
        let prompt = system_prompt();
        assert!(prompt.starts_with("You are a helpful cloud pricing assistant for Priceyy"));
        assert!(prompt.contains("add_to_cart"));
        assert!(prompt.contains("1, 8, 24, 730 hours"));
        assert!(prompt.contains("1, 2, 4, 8"));
    }
}
