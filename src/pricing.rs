//! Static per-model pricing tables.
//!
//! Prices are dollars per 1,000,000 tokens, input and output priced
//! separately. Model names are matched by substring against the lowercased
//! model string; each provider designates a default entry for unknown models.

use crate::provider::Provider;

/// Price entry: (model name fragment, input $/1M, output $/1M).
type PriceRow = (&'static str, f64, f64);

const OPENAI_PRICES: &[PriceRow] = &[
    ("gpt-4o-mini", 0.150, 0.600),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gpt-3.5-turbo-16k", 3.00, 4.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
];
// Unknown OpenAI models fall back to gpt-4o-mini.
const OPENAI_DEFAULT: PriceRow = ("gpt-4o-mini", 0.150, 0.600);

const ANTHROPIC_PRICES: &[PriceRow] = &[
    ("claude-3-opus", 15.00, 75.00),
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("claude-3-sonnet", 3.00, 15.00),
    ("claude-3-haiku", 0.25, 1.25),
];
const ANTHROPIC_DEFAULT: PriceRow = ("claude-3-sonnet", 3.00, 15.00);

const GEMINI_PRICES: &[PriceRow] = &[
    ("gemini-1.5-pro", 1.25, 5.00),
    ("gemini-1.5-flash", 0.075, 0.30),
    ("gemini-1.0-pro", 0.50, 1.50),
];
const GEMINI_DEFAULT: PriceRow = ("gemini-1.5-flash", 0.075, 0.30);

const XAI_PRICES: &[PriceRow] = &[
    ("grok-beta", 5.00, 15.00),
    ("grok-2", 5.00, 15.00),
];
const XAI_DEFAULT: PriceRow = ("grok-beta", 5.00, 15.00);

const DEEPSEEK_PRICES: &[PriceRow] = &[
    ("deepseek-chat", 0.14, 0.28),
    ("deepseek-coder", 0.14, 0.28),
];
const DEEPSEEK_DEFAULT: PriceRow = ("deepseek-chat", 0.14, 0.28);

fn table_for(provider: Provider) -> Option<(&'static [PriceRow], PriceRow)> {
    match provider {
        Provider::OpenAi => Some((OPENAI_PRICES, OPENAI_DEFAULT)),
        Provider::Anthropic => Some((ANTHROPIC_PRICES, ANTHROPIC_DEFAULT)),
        Provider::Gemini => Some((GEMINI_PRICES, GEMINI_DEFAULT)),
        Provider::Xai => Some((XAI_PRICES, XAI_DEFAULT)),
        Provider::DeepSeek => Some((DEEPSEEK_PRICES, DEEPSEEK_DEFAULT)),
        // Local models cost nothing.
        Provider::Ollama => None,
    }
}

/// Dollar cost of one call.
///
/// Unknown model names fall back to the provider's designated default row;
/// local providers always cost zero.
pub fn call_cost(
    provider: Provider,
    model: &str,
    prompt_tokens: u32,
    completion_tokens: u32,
) -> f64 {
    let Some((table, default)) = table_for(provider) else {
        return 0.0;
    };

    let model_lower = model.to_lowercase();
    let (_, input, output) = table
        .iter()
        .find(|(fragment, _, _)| model_lower.contains(fragment))
        .copied()
        .unwrap_or(default);

    let input_cost = f64::from(prompt_tokens) / 1_000_000.0 * input;
    let output_cost = f64::from(completion_tokens) / 1_000_000.0 * output;
    input_cost + output_cost
}
