//! Catalog of free models routed through OpenRouter.
//!
//! Models are grouped by family. The default chain tries the default model
//! first and then walks the general-purpose fallback list.

use serde::Serialize;

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b:free";

/// Free models grouped by family, in preference order.
pub const FREE_MODELS: &[(&str, &[&str])] = &[
    ("openai", &["openai/gpt-oss-20b:free"]),
    (
        "anthropic",
        &[
            "anthropic/claude-3-haiku:free",
            "deepseek/deepseek-r1-0528:free",
        ],
    ),
    (
        "google",
        &[
            "google/gemini-2.0-flash-exp:free",
            "google/gemma-3-27b-it:free",
            "google/gemma-3-12b-it:free",
        ],
    ),
    (
        "meta",
        &[
            "meta-llama/llama-4-maverick:free",
            "meta-llama/llama-4-scout:free",
            "meta-llama/llama-3.3-8b-instruct:free",
        ],
    ),
    (
        "mistral",
        &[
            "mistralai/mistral-small-3.2-24b-instruct:free",
            "mistralai/mistral-small-3.1-24b-instruct:free",
        ],
    ),
    (
        "fallback",
        &[
            "openrouter/polaris-alpha",
            "nvidia/nemotron-nano-12b-v2-vl:free",
            "alibaba/tongyi-deepresearch-30b-a3b:free",
            "deepseek/deepseek-chat-v3.1:free",
            "z-ai/glm-4.5-air:free",
            "qwen/qwen3-coder:free",
            "moonshotai/kimi-k2:free",
            "google/gemma-3n-e2b-it:free",
        ],
    ),
];

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("openrouter/polaris-alpha", "Polaris Alpha"),
    ("nvidia/nemotron-nano-12b-v2-vl:free", "Nemotron Nano 12B"),
    ("alibaba/tongyi-deepresearch-30b-a3b:free", "Tongyi DeepResearch"),
    ("deepseek/deepseek-chat-v3.1:free", "DeepSeek V3.1"),
    ("openai/gpt-oss-20b:free", "GPT OSS 20B"),
    ("z-ai/glm-4.5-air:free", "GLM 4.5 Air"),
    ("qwen/qwen3-coder:free", "Qwen3 Coder"),
    ("moonshotai/kimi-k2:free", "Kimi K2"),
    ("google/gemma-3n-e2b-it:free", "Gemma 3N E2B"),
    ("mistralai/mistral-small-3.2-24b-instruct:free", "Mistral Small 3.2"),
    ("deepseek/deepseek-r1-0528:free", "DeepSeek R1"),
    ("meta-llama/llama-3.3-8b-instruct:free", "Llama 3.3 8B"),
    ("meta-llama/llama-4-maverick:free", "Llama 4 Maverick"),
    ("meta-llama/llama-4-scout:free", "Llama 4 Scout"),
    ("deepseek/deepseek-chat-v3-0324:free", "DeepSeek V3"),
    ("mistralai/mistral-small-3.1-24b-instruct:free", "Mistral Small 3.1"),
    ("google/gemma-3-12b-it:free", "Gemma 3 12B"),
    ("google/gemma-3-27b-it:free", "Gemma 3 27B"),
    ("google/gemini-2.0-flash-exp:free", "Gemini 2.0 Flash"),
    ("anthropic/claude-3-haiku:free", "Claude 3 Haiku"),
];

/// A catalog entry for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub id: &'static str,
    pub family: &'static str,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Human-readable name for a model id.
///
/// Unknown ids fall back to the part after the vendor prefix, without the
/// `:free` tag.
pub fn display_name(model: &str) -> String {
    if let Some((_, name)) = DISPLAY_NAMES.iter().find(|(id, _)| *id == model) {
        return (*name).to_string();
    }
    let short = model.rsplit('/').next().unwrap_or(model);
    short.trim_end_matches(":free").to_string()
}

/// Models of one family, if known.
pub fn family(name: &str) -> Option<&'static [&'static str]> {
    FREE_MODELS
        .iter()
        .find(|(family, _)| family.eq_ignore_ascii_case(name))
        .map(|(_, models)| *models)
}

/// Fallback chain used when settings do not name one.
pub fn default_fallbacks() -> Vec<String> {
    family("fallback")
        .unwrap_or_default()
        .iter()
        .map(|m| m.to_string())
        .collect()
}

/// Every catalog entry, grouped by family.
pub fn catalog() -> Vec<ModelEntry> {
    FREE_MODELS
        .iter()
        .flat_map(|&(family, models)| {
            models.iter().map(move |&id| ModelEntry {
                id,
                family,
                display_name: display_name(id),
            })
        })
        .collect()
}
