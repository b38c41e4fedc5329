//! OpenAI Responses/Reasoning adapter (spec §4.5).

use super::Adapter;
use crate::catalog::ModelDescriptor;
use crate::options::CompletionOptions;

pub struct OpenAiResponsesAdapter;

impl Adapter for OpenAiResponsesAdapter {
    fn name(&self) -> &'static str {
        "openai_responses"
    }

    fn matches(&self, model: &ModelDescriptor, _opts: &CompletionOptions) -> bool {
        model.api() == Some("responses") || model.wire_protocol() == Some("openai_responses")
    }

    fn transform_opts(&self, _model: &ModelDescriptor, mut opts: CompletionOptions) -> CompletionOptions {
        opts.receive_timeout_secs.get_or_insert(300);
        if let Some(max_tokens) = opts.max_tokens.take() {
            opts.max_completion_tokens.get_or_insert(max_tokens);
        }
        if let Some(max_output_tokens) = opts.max_output_tokens.take() {
            opts.max_completion_tokens.get_or_insert(max_output_tokens);
        }
        opts.max_completion_tokens.get_or_insert(16000);
        opts.temperature = None;
        opts
    }
}
