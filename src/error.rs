//! Error taxonomy for the request pipeline (see spec §7).
//!
//! Every pipeline stage either succeeds or returns one of these variants
//! immediately; no stage retries internally.

use thiserror::Error;

/// Errors that can occur anywhere along the request pipeline, from model
/// resolution through stream consumption.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Malformed input, e.g. an empty embedding string.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An unknown provider identifier was used in a model spec.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    /// The requested operation, modality, or feature is not supported by
    /// the resolved model.
    #[error("model does not support required capability, missing: {missing:?}")]
    InvalidCapability {
        /// The capabilities the model lacks that the request needed.
        missing: Vec<String>,
    },

    /// The model specification string or value could not be parsed.
    #[error("invalid model spec: {0}")]
    InvalidModelSpec(String),

    /// No model matches the given `provider:id` pair in the catalog.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// A non-2xx HTTP response, or a transport-level failure surfaced with
    /// a status.
    #[error("API request failed ({status}): {body}")]
    ApiRequest {
        /// HTTP status code, when available.
        status: u16,
        /// Response body snippet, for debugging.
        body: String,
    },

    /// The provider responded 2xx but the body did not have the expected
    /// shape.
    #[error("unexpected API response: {0}")]
    ApiResponse(String),

    /// A mid-stream error event, decode error, or transport drop.
    #[error("stream error: {0}")]
    ApiStream(String),

    /// A decoded object failed schema validation.
    #[error("object failed schema validation: {errors:?}")]
    ApiSchemaValidation {
        /// Human-readable validation failures, one per violated constraint.
        errors: Vec<String>,
    },

    /// The response body could not be parsed as JSON.
    #[error("failed to parse JSON response: {raw}")]
    ApiJsonParse {
        /// The raw text that failed to parse.
        raw: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Pipeline pre-flight validation failed (operation/modality/tooling
    /// mismatches not covered by `InvalidCapability`).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A replay was requested for a fixture that does not exist on disk.
    #[error("fixture missing: {0}")]
    FixtureMissing(String),

    /// Provider/credential configuration is invalid or incomplete.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The underlying HTTP client failed outside of a well-formed response
    /// (DNS, connect, TLS, etc).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unclassified fallback; should be rare in practice.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl LlmError {
    /// True for errors that represent an authentication failure surfaced by
    /// the provider (HTTP 401).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, LlmError::ApiRequest { status: 401, .. })
    }

    /// True for errors that represent a rate-limit response (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::ApiRequest { status: 429, .. })
    }
}
