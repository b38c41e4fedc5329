//! Constraints engine: metadata-driven parameter rewrites (spec §4.3).
//!
//! Transforms are independent and applied in a fixed order; the whole pass
//! is idempotent (spec §8 invariant 1) since each transform only rewrites
//! fields it owns and never re-derives state from fields it already
//! consumed.

use serde_json::Value;

use crate::catalog::ModelDescriptor;
use crate::options::CompletionOptions;

fn str_field<'a>(constraints: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    constraints.get(key).and_then(|v| v.as_str())
}

fn apply_token_limit_key(constraints: &serde_json::Map<String, Value>, opts: &mut CompletionOptions) {
    if str_field(constraints, "token_limit_key") == Some("max_completion_tokens") {
        if let Some(max_tokens) = opts.max_tokens.take() {
            opts.max_completion_tokens.get_or_insert(max_tokens);
        }
    }
}

fn apply_temperature(constraints: &serde_json::Map<String, Value>, opts: &mut CompletionOptions) {
    match str_field(constraints, "temperature") {
        Some("fixed_1") => opts.temperature = Some(1.0),
        Some("unsupported") => opts.temperature = None,
        _ => {}
    }
}

fn apply_sampling(constraints: &serde_json::Map<String, Value>, opts: &mut CompletionOptions) {
    if str_field(constraints, "sampling") == Some("unsupported") {
        opts.top_p = None;
        opts.top_k = None;
    }
}

fn apply_min_output_tokens(constraints: &serde_json::Map<String, Value>, opts: &mut CompletionOptions) {
    let Some(min) = constraints.get("min_output_tokens").and_then(|v| v.as_u64()) else {
        return;
    };
    let min = min as u32;
    if min == 0 {
        return;
    }
    for slot in [&mut opts.max_tokens, &mut opts.max_completion_tokens, &mut opts.max_output_tokens] {
        if let Some(current) = slot {
            if *current < min {
                *current = min;
            }
        }
    }
}

fn apply_reasoning_effort(constraints: &serde_json::Map<String, Value>, opts: &mut CompletionOptions) {
    use crate::options::ReasoningEffort;
    match str_field(constraints, "reasoning_effort") {
        Some("required") => {
            opts.reasoning_effort.get_or_insert(ReasoningEffort::Medium);
        }
        Some("unsupported") => opts.reasoning_effort = None,
        _ => {}
    }
}

/// Applies every constraint transform from `model.extra.constraints` to
/// `opts`, in the fixed order spec §4.3 lists.
pub fn apply_constraints(model: &ModelDescriptor, mut opts: CompletionOptions) -> CompletionOptions {
    let constraints = model.constraints();
    apply_token_limit_key(&constraints, &mut opts);
    apply_temperature(&constraints, &mut opts);
    apply_sampling(&constraints, &mut opts);
    apply_min_output_tokens(&constraints, &mut opts);
    apply_reasoning_effort(&constraints, &mut opts);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::options::ReasoningEffort;

    #[test]
    fn token_limit_key_renames_max_tokens() {
        let model = CATALOG.lookup("openai", "o1").unwrap();
        let opts = CompletionOptions { max_tokens: Some(500), ..Default::default() };
        let opts = apply_constraints(&model, opts);
        assert_eq!(opts.max_tokens, None);
        assert_eq!(opts.max_completion_tokens, Some(500));
    }

    #[test]
    fn never_leaves_both_max_tokens_and_max_completion_tokens() {
        let model = CATALOG.lookup("openai", "o1").unwrap();
        let opts = CompletionOptions { max_tokens: Some(500), ..Default::default() };
        let opts = apply_constraints(&model, opts);
        assert!(!(opts.max_tokens.is_some() && opts.max_completion_tokens.is_some()));
    }

    #[test]
    fn temperature_unsupported_removes_it() {
        let model = CATALOG.lookup("openai", "o1").unwrap();
        let opts = CompletionOptions { temperature: Some(0.7), ..Default::default() };
        let opts = apply_constraints(&model, opts);
        assert_eq!(opts.temperature, None);
    }

    #[test]
    fn reasoning_effort_required_defaults_to_medium() {
        let model = CATALOG.lookup("openai", "o1").unwrap();
        let opts = apply_constraints(&model, CompletionOptions::new());
        assert_eq!(opts.reasoning_effort, Some(ReasoningEffort::Medium));
    }

    #[test]
    fn applying_constraints_twice_is_idempotent() {
        let model = CATALOG.lookup("openai", "o1").unwrap();
        let opts = CompletionOptions { max_tokens: Some(500), temperature: Some(0.7), ..Default::default() };
        let once = apply_constraints(&model, opts);
        let twice = apply_constraints(&model, once.clone());
        assert_eq!(once.max_tokens, twice.max_tokens);
        assert_eq!(once.max_completion_tokens, twice.max_completion_tokens);
        assert_eq!(once.temperature, twice.temperature);
        assert_eq!(once.reasoning_effort, twice.reasoning_effort);
    }
}
