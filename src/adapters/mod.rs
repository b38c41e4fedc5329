//! Adapter pipeline: per-model option transforms (spec §4.5).

mod anthropic_thinking;
mod openai_responses;

use crate::catalog::ModelDescriptor;
use crate::options::CompletionOptions;

/// A single adapter module: matches a model, then rewrites options.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, model: &ModelDescriptor, opts: &CompletionOptions) -> bool;
    fn transform_opts(&self, model: &ModelDescriptor, opts: CompletionOptions) -> CompletionOptions;
}

fn registry() -> Vec<Box<dyn Adapter>> {
    vec![
        Box::new(anthropic_thinking::AnthropicThinkingAdapter),
        Box::new(openai_responses::OpenAiResponsesAdapter),
    ]
}

/// Runs every matching adapter, in registration order, over `opts`.
pub fn apply_adapters(model: &ModelDescriptor, mut opts: CompletionOptions) -> CompletionOptions {
    for adapter in registry() {
        if adapter.matches(model, &opts) {
            opts = adapter.transform_opts(model, opts);
            opts.mark_adapter_applied(adapter.name());
        }
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;

    #[test]
    fn no_adapter_matches_a_plain_chat_model_without_thinking() {
        let model = CATALOG.lookup("openai", "gpt-4o-mini").unwrap();
        let opts = apply_adapters(&model, CompletionOptions::new());
        assert!(opts.adapter_applied.is_empty());
    }

    #[test]
    fn responses_adapter_matches_o1() {
        let model = CATALOG.lookup("openai", "o1").unwrap();
        let opts = apply_adapters(&model, CompletionOptions::new());
        assert!(opts.adapter_applied.contains(&"openai_responses".to_string()));
    }
}
