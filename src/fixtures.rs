//! Fixture record/replay subsystem (spec §3 "Fixture record"/"Recorder", §4.8).

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::catalog::ModelDescriptor;
use crate::error::LlmError;
use crate::stream::{drive_stream, StreamResponse, TransportEvent};
use crate::wire::WireProtocol;

/// Process-wide fixture mode, resolved from `REQ_LLM_NEXT_FIXTURES_MODE`
/// (spec §6: default `"replay"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureMode {
    Record,
    Replay,
}

pub fn fixture_mode() -> FixtureMode {
    match std::env::var("REQ_LLM_NEXT_FIXTURES_MODE").as_deref() {
        Ok("record") => FixtureMode::Record,
        _ => FixtureMode::Replay,
    }
}

/// Lowercases and collapses runs of non-`[a-z0-9]` into `_`, trimming
/// underscores (spec §4.8 sanitization rule).
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

pub fn fixture_path(root: &Path, provider: &str, model_id: &str, name: &str) -> PathBuf {
    root.join(sanitize(provider)).join(sanitize(model_id)).join(format!("{}.json", sanitize(name)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRequestBody {
    pub b64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: FixtureRequestBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// `{provider, model_id, prompt, captured_at, request, response, chunks}`
/// (spec §3 "Fixture record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub provider: String,
    pub model_id: String,
    pub prompt: String,
    pub captured_at: String,
    pub request: FixtureRequest,
    pub response: FixtureResponse,
    /// Raw transport bytes, base64-encoded, in arrival order.
    pub chunks: Vec<String>,
}

/// Replaces `authorization`/`x-api-key` header values with `[REDACTED]`.
pub fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("authorization") || k.eq_ignore_ascii_case("x-api-key") {
                (k.clone(), "[REDACTED]".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// Mutable accumulator owned by one recording stream; lifecycle bound to
/// that stream (spec §3 "Recorder").
pub struct Recorder {
    path: PathBuf,
    record: FixtureRecord,
    flushed: bool,
}

impl Recorder {
    pub fn new(path: PathBuf, provider: &str, model_id: &str, prompt: &str, request: FixtureRequest, captured_at: String) -> Self {
        let request = FixtureRequest { headers: redact_headers(&request.headers), ..request };
        Self {
            path,
            record: FixtureRecord {
                provider: provider.to_string(),
                model_id: model_id.to_string(),
                prompt: prompt.to_string(),
                captured_at,
                request,
                response: FixtureResponse::default(),
                chunks: Vec::new(),
            },
            flushed: false,
        }
    }

    pub fn set_status(&mut self, status: u16) {
        self.record.response.status = status;
    }

    pub fn set_headers(&mut self, headers: Vec<(String, String)>) {
        let mut normalized: Vec<(String, String)> = headers.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        normalized.sort_by(|a, b| a.0.cmp(&b.0));
        self.record.response.headers = normalized;
    }

    pub fn push_chunk(&mut self, bytes: &[u8]) {
        self.record.chunks.push(STANDARD.encode(bytes));
    }

    /// Writes the JSON envelope to disk. Idempotent: a second call is a no-op.
    pub fn flush(mut self) -> Result<(), LlmError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LlmError::ConfigError(format!("fixture dir create failed: {}", e)))?;
        }
        let json = serde_json::to_vec_pretty(&self.record)
            .map_err(|e| LlmError::ConfigError(format!("fixture serialize failed: {}", e)))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| LlmError::ConfigError(format!("fixture write failed: {}", e)))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| LlmError::ConfigError(format!("fixture rename failed: {}", e)))?;
        tracing::debug!(path = %self.path.display(), "flushed fixture");
        Ok(())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if !self.flushed {
            tracing::warn!(path = %self.path.display(), "recorder dropped without flushing");
        }
    }
}

/// Reads a fixture file from disk, or `FixtureMissing` if absent.
pub fn load_fixture(path: &Path) -> Result<FixtureRecord, LlmError> {
    let bytes = std::fs::read(path).map_err(|_| LlmError::FixtureMissing(path.display().to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| LlmError::ApiJsonParse { raw: String::from_utf8_lossy(&bytes).to_string(), source: e })
}

/// Builds a replay `StreamResponse` by feeding the fixture's recorded bytes
/// back through the same transport-event channel and wire decoder used live
/// (spec §4.8 "Replay").
pub fn replay_stream(model: ModelDescriptor, wire: Box<dyn WireProtocol + Send>, record: FixtureRecord, receive_timeout: std::time::Duration) -> Result<StreamResponse, LlmError> {
    let (tx, rx) = mpsc::channel(32);
    let chunks = record.chunks.clone();

    tokio::spawn(async move {
        let _ = tx.send(TransportEvent::Status(record.response.status)).await;
        let _ = tx.send(TransportEvent::Headers(record.response.headers.clone())).await;
        for chunk_b64 in &chunks {
            if let Ok(bytes) = STANDARD.decode(chunk_b64) {
                if tx.send(TransportEvent::Data(bytes)).await.is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(TransportEvent::Done).await;
    });

    Ok(drive_stream(model, wire, rx, None, receive_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize("GPT-4o Mini!!"), "gpt_4o_mini");
        assert_eq!(sanitize("__leading"), "leading");
    }

    #[test]
    fn fixture_path_layout() {
        let path = fixture_path(Path::new("/fixtures"), "OpenAI", "gpt-4o-mini", "Basic Text");
        assert_eq!(path, PathBuf::from("/fixtures/openai/gpt_4o_mini/basic_text.json"));
    }

    #[test]
    fn redact_headers_masks_auth() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer secret".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        let redacted = redact_headers(&headers);
        assert_eq!(redacted[0].1, "[REDACTED]");
        assert_eq!(redacted[1].1, "application/json");
    }

    #[test]
    fn default_mode_is_replay() {
        std::env::remove_var("REQ_LLM_NEXT_FIXTURES_MODE");
        assert_eq!(fixture_mode(), FixtureMode::Replay);
    }

    #[test]
    fn load_missing_fixture_errors() {
        let err = load_fixture(Path::new("/nonexistent/path/fixture.json")).unwrap_err();
        assert!(matches!(err, LlmError::FixtureMissing(_)));
    }

    #[test]
    fn recorder_flush_writes_a_loadable_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openai").join("gpt_4o_mini").join("basic.json");
        let request = FixtureRequest {
            method: "POST".to_string(),
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            headers: vec![("authorization".to_string(), "Bearer secret".to_string())],
            body: FixtureRequestBody { b64: String::new(), canonical_json: None },
        };
        let mut recorder = Recorder::new(path.clone(), "openai", "gpt-4o-mini", "hi", request, "2026-01-01T00:00:00Z".to_string());
        recorder.set_status(200);
        recorder.push_chunk(b"data: [DONE]\n\n");
        recorder.flush().unwrap();

        let record = load_fixture(&path).unwrap();
        assert_eq!(record.response.status, 200);
        assert_eq!(record.chunks.len(), 1);
        assert_eq!(record.request.headers[0].1, "[REDACTED]");
    }
}
