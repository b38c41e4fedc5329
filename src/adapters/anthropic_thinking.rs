//! Anthropic extended-thinking adapter (spec §4.5).

use super::Adapter;
use crate::catalog::ModelDescriptor;
use crate::options::{CompletionOptions, ReasoningEffort};

pub struct AnthropicThinkingAdapter;

fn effective_budget(opts: &CompletionOptions) -> u32 {
    if let Some(thinking) = &opts.thinking {
        if let Some(budget) = thinking.budget_tokens {
            return budget;
        }
        if let Some(effort) = thinking.effort {
            return budget_for_effort(effort);
        }
    }
    if let Some(effort) = opts.reasoning_effort {
        return budget_for_effort(effort);
    }
    2048
}

fn budget_for_effort(effort: ReasoningEffort) -> u32 {
    match effort {
        ReasoningEffort::Low => 1024,
        ReasoningEffort::Medium => 2048,
        ReasoningEffort::High => 4096,
    }
}

impl Adapter for AnthropicThinkingAdapter {
    fn name(&self) -> &'static str {
        "anthropic_thinking"
    }

    fn matches(&self, model: &ModelDescriptor, opts: &CompletionOptions) -> bool {
        model.provider == "anthropic" && (opts.thinking.is_some() || opts.reasoning_effort.is_some())
    }

    fn transform_opts(&self, _model: &ModelDescriptor, mut opts: CompletionOptions) -> CompletionOptions {
        opts.receive_timeout_secs.get_or_insert(300);
        opts.temperature = None;
        if let Some(top_p) = opts.top_p {
            opts.top_p = Some(top_p.clamp(0.95, 1.0));
        }
        opts.top_k = None;

        let budget = effective_budget(&opts);
        // The "+201" headroom above the thinking budget is preserved verbatim
        // from the source material; its exact derivation is unexplained there.
        if let Some(max_tokens) = opts.max_tokens {
            if max_tokens <= budget {
                opts.max_tokens = Some(budget + 201);
            }
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;

    #[test]
    fn raises_max_tokens_above_thinking_budget() {
        let model = CATALOG.lookup("anthropic", "claude-3-7-sonnet-20250219").unwrap();
        let opts = CompletionOptions {
            reasoning_effort: Some(ReasoningEffort::Medium),
            max_tokens: Some(100),
            ..Default::default()
        };
        let adapter = AnthropicThinkingAdapter;
        assert!(adapter.matches(&model, &opts));
        let opts = adapter.transform_opts(&model, opts);
        assert_eq!(opts.max_tokens, Some(2048 + 201));
    }

    #[test]
    fn removes_temperature_and_top_k() {
        let model = CATALOG.lookup("anthropic", "claude-3-7-sonnet-20250219").unwrap();
        let opts = CompletionOptions {
            reasoning_effort: Some(ReasoningEffort::Low),
            temperature: Some(0.9),
            top_k: Some(40),
            ..Default::default()
        };
        let adapter = AnthropicThinkingAdapter;
        let opts = adapter.transform_opts(&model, opts);
        assert_eq!(opts.temperature, None);
        assert_eq!(opts.top_k, None);
    }

    #[test]
    fn clamps_top_p_into_range() {
        let model = CATALOG.lookup("anthropic", "claude-3-7-sonnet-20250219").unwrap();
        let opts = CompletionOptions {
            reasoning_effort: Some(ReasoningEffort::Low),
            top_p: Some(0.5),
            ..Default::default()
        };
        let adapter = AnthropicThinkingAdapter;
        let opts = adapter.transform_opts(&model, opts);
        assert_eq!(opts.top_p, Some(0.95));
    }

    #[test]
    fn does_not_match_when_neither_thinking_nor_effort_set() {
        let model = CATALOG.lookup("anthropic", "claude-3-7-sonnet-20250219").unwrap();
        let adapter = AnthropicThinkingAdapter;
        assert!(!adapter.matches(&model, &CompletionOptions::new()));
    }
}
