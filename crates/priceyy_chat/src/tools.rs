//! Tool registry for the cost assistant.
//!
//! The registry is the fixed set of operations the model may request. Each
//! tool declares a JSON schema for its arguments; recovered arguments are
//! validated against it and then decoded into [`ToolArgs`].

use std::fmt;
use std::str::FromStr;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

/// Names of the registered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    GetProviders,
    GetRegions,
    SearchResources,
    GetPricingOptions,
    AddToCart,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::GetProviders,
        ToolName::GetRegions,
        ToolName::SearchResources,
        ToolName::GetPricingOptions,
        ToolName::AddToCart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetProviders => "get_providers",
            Self::GetRegions => "get_regions",
            Self::SearchResources => "search_resources",
            Self::GetPricingOptions => "get_pricing_options",
            Self::AddToCart => "add_to_cart",
        }
    }

    /// Whether the tool changes the cart.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::AddToCart)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: ToolName,
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolDefinition {
    /// OpenAI-compatible `{type: "function", function: {...}}` entry.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name.as_str(),
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Arguments of `get_regions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionsArgs {
    pub provider: String,
}

/// Arguments of `search_resources`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchArgs {
    pub provider: String,
    pub region: String,
    #[serde(default)]
    pub query: Option<String>,
}

/// Arguments of `get_pricing_options`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingOptionsArgs {
    pub provider: String,
    pub region: String,
    pub resource_type: String,
}

/// Arguments of `add_to_cart`.
///
/// `quantity` is the number of instances, `usage` the per-instance usage in
/// `unit_of_measure`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartArgs {
    pub provider: String,
    pub region: String,
    pub resource_type: String,
    pub price_model: String,
    pub unit_of_measure: String,
    pub price_per_unit: f64,
    pub quantity: f64,
    #[serde(default)]
    pub usage: Option<f64>,
}

/// Validated arguments, one variant per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    GetProviders,
    GetRegions(RegionsArgs),
    SearchResources(SearchArgs),
    GetPricingOptions(PricingOptionsArgs),
    AddToCart(AddToCartArgs),
}

impl ToolArgs {
    pub fn tool(&self) -> ToolName {
        match self {
            Self::GetProviders => ToolName::GetProviders,
            Self::GetRegions(_) => ToolName::GetRegions,
            Self::SearchResources(_) => ToolName::SearchResources,
            Self::GetPricingOptions(_) => ToolName::GetPricingOptions,
            Self::AddToCart(_) => ToolName::AddToCart,
        }
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    schema: Option<JSONSchema>,
}

/// The fixed set of tools with their compiled argument schemas.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let tools = builtin_definitions()
            .into_iter()
            .map(|definition| {
                let schema = JSONSchema::compile(&definition.parameters).ok();
                if schema.is_none() {
                    warn!(tool = %definition.name, "Argument schema failed to compile");
                }
                RegisteredTool { definition, schema }
            })
            .collect();
        Self { tools }
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.iter().map(|t| t.definition.name).collect()
    }

    /// Look up a tool by the name the model used.
    pub fn resolve(&self, name: &str) -> Option<ToolName> {
        let name = name.parse::<ToolName>().ok()?;
        self.tools
            .iter()
            .any(|t| t.definition.name == name)
            .then_some(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn definition(&self, name: ToolName) -> Option<&ToolDefinition> {
        self.tools
            .iter()
            .find(|t| t.definition.name == name)
            .map(|t| &t.definition)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    /// Tool list in the completion request format.
    pub fn to_wire(&self) -> Vec<Value> {
        self.definitions().map(ToolDefinition::to_wire).collect()
    }

    /// Check arguments against the tool's schema and decode them.
    ///
    /// Returns every schema violation joined into one message on failure.
    /// A tool whose schema did not compile never accepts arguments.
    pub fn validate(&self, name: ToolName, arguments: &Value) -> Result<ToolArgs, String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.definition.name == name)
            .ok_or_else(|| format!("unsupported tool: {}", name))?;

        let schema = tool
            .schema
            .as_ref()
            .ok_or_else(|| format!("no argument schema available for {}", name))?;
        if let Err(errors) = schema.validate(arguments) {
            let messages: Vec<String> = errors.map(|e| describe_violation(&e)).collect();
            return Err(messages.join("; "));
        }

        decode(name, arguments.clone()).map_err(|e| e.to_string())
    }
}

fn describe_violation(error: &jsonschema::ValidationError<'_>) -> String {
    let path = error.instance_path.to_string();
    if path.is_empty() {
        error.to_string()
    } else {
        format!("{}: {}", path.trim_start_matches('/'), error)
    }
}

fn decode(name: ToolName, arguments: Value) -> Result<ToolArgs, serde_json::Error> {
    Ok(match name {
        ToolName::GetProviders => ToolArgs::GetProviders,
        ToolName::GetRegions => ToolArgs::GetRegions(serde_json::from_value(arguments)?),
        ToolName::SearchResources => ToolArgs::SearchResources(serde_json::from_value(arguments)?),
        ToolName::GetPricingOptions => {
            ToolArgs::GetPricingOptions(serde_json::from_value(arguments)?)
        }
        ToolName::AddToCart => ToolArgs::AddToCart(serde_json::from_value(arguments)?),
    })
}

fn builtin_definitions() -> Vec<ToolDefinition> {
    let provider = json!({
        "type": "string",
        "enum": ["aws", "gcp", "azure"],
        "description": "The cloud provider (lowercase)"
    });

    vec![
        ToolDefinition {
            name: ToolName::GetProviders,
            description: "Get the list of available cloud providers (AWS, GCP, Azure). Use this when the user asks about available providers or wants to start a pricing estimate.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: ToolName::GetRegions,
            description: "Get available regions for a cloud provider. Use this when the user mentions a provider and needs to pick a region.",
            parameters: json!({
                "type": "object",
                "properties": { "provider": provider },
                "required": ["provider"]
            }),
        },
        ToolDefinition {
            name: ToolName::SearchResources,
            description: "Search resource types in a provider and region. Use this when the user mentions a resource type such as EC2, S3, VM or Storage.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "provider": provider,
                    "region": { "type": "string", "minLength": 1, "description": "The cloud region (e.g. us-east-1, europe-west1)" },
                    "query": { "type": "string", "description": "Search text for resource types (e.g. 'EC2', 'Storage', 'VM')" }
                },
                "required": ["provider", "region"]
            }),
        },
        ToolDefinition {
            name: ToolName::GetPricingOptions,
            description: "Get pricing options for one resource type. Use this to show pricing details before adding anything to the cart.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "provider": provider,
                    "region": { "type": "string", "minLength": 1, "description": "The cloud region" },
                    "resourceType": { "type": "string", "minLength": 1, "description": "The resource type (e.g. 't2.micro')" }
                },
                "required": ["provider", "region", "resourceType"]
            }),
        },
        ToolDefinition {
            name: ToolName::AddToCart,
            description: "Add a cloud resource to the user's estimate cart. Only use this after the user confirmed provider, region, resource, pricing model and quantity.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "provider": { "type": "string", "minLength": 1, "description": "The cloud provider" },
                    "region": { "type": "string", "minLength": 1, "description": "The cloud region" },
                    "resourceType": { "type": "string", "minLength": 1, "description": "The resource type" },
                    "priceModel": { "type": "string", "minLength": 1, "description": "The pricing model (e.g. 'OnDemand', 'Reserved')" },
                    "unitOfMeasure": { "type": "string", "minLength": 1, "description": "The unit of measure for pricing" },
                    "pricePerUnit": { "type": "number", "minimum": 0, "description": "The price per unit" },
                    "quantity": { "type": "number", "exclusiveMinimum": 0, "description": "Number of instances or resources" },
                    "usage": { "type": "number", "exclusiveMinimum": 0, "description": "Usage per instance (hours, GB, ...); defaults to 1" }
                },
                "required": ["provider", "region", "resourceType", "priceModel", "unitOfMeasure", "pricePerUnit", "quantity"]
            }),
        },
    ]
}
