//! Stream state machine: SSE framing, wire decoding, cancellation (spec §4.6, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::catalog::ModelDescriptor;
use crate::error::LlmError;
use crate::fixtures::Recorder;
use crate::wire::{Chunk, SseEvent, WireProtocol};

/// A single low-level event the transport hands to the state machine, in
/// the order the transport contract (spec §6) guarantees.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Status(u16),
    Headers(Vec<(String, String)>),
    Data(Vec<u8>),
    Done,
}

/// Incrementally parses complete SSE events out of an accumulating byte
/// buffer, leaving any trailing partial event in the buffer (spec §4.6).
#[derive(Default)]
pub struct SseFramer {
    buffer: Vec<u8>,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Drains every complete event (terminated by a blank line) currently in
    /// the buffer, in arrival order.
    pub fn drain_events(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        loop {
            let text = String::from_utf8_lossy(&self.buffer);
            let Some(blank_at) = find_blank_line(&text) else { break };
            let (raw_event, consumed_bytes) = split_at_char_boundary(&self.buffer, &text, blank_at);
            if let Some(event) = parse_event(&raw_event) {
                events.push(event);
            }
            self.buffer.drain(0..consumed_bytes);
        }
        events
    }
}

fn find_blank_line(text: &str) -> Option<usize> {
    text.find("\n\n").or_else(|| text.find("\r\n\r\n"))
}

fn split_at_char_boundary(buffer: &[u8], text: &str, blank_at: usize) -> (String, usize) {
    let delim_len = if text[blank_at..].starts_with("\r\n\r\n") { 4 } else { 2 };
    let raw = text[..blank_at].to_string();
    let consumed = blank_at + delim_len;
    // blank_at/consumed are byte offsets into the lossily-decoded text, which
    // is byte-for-byte identical to the original buffer except for invalid
    // UTF-8 substitution; SSE payloads are text, so this holds in practice.
    let consumed = consumed.min(buffer.len());
    (raw, consumed)
}

fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if let Some(rest) = line.strip_prefix("event:") {
            event.event = Some(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if let Some(rest) = line.strip_prefix("id:") {
            event.id = Some(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }
    if data_lines.is_empty() && event.event.is_none() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}

/// A handle to cancel an in-flight stream (spec §5 "Cancellation").
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Idempotent; safe to call after normal completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An opaque handle owning the lazy chunk sequence plus the model descriptor
/// and cancellation function (spec §3 "Stream response").
pub struct StreamResponse {
    pub model: ModelDescriptor,
    pub cancel: CancelHandle,
    receiver: ReceiverStream<Result<Chunk, LlmError>>,
    task: tokio::task::JoinHandle<()>,
}

impl StreamResponse {
    /// Pulls the next chunk, or `None` once the sequence has halted.
    pub async fn next(&mut self) -> Option<Result<Chunk, LlmError>> {
        use tokio_stream::StreamExt;
        self.receiver.next().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Drives one transport exchange through the state machine, forwarding
/// decoded chunks over a bounded channel to the returned `StreamResponse`
/// (spec §5 "Scheduling model": one background task per request).
pub fn drive_stream(
    model: ModelDescriptor,
    wire: Box<dyn WireProtocol + Send>,
    mut events: mpsc::Receiver<TransportEvent>,
    mut recorder: Option<Recorder>,
    receive_timeout: Duration,
) -> StreamResponse {
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancelHandle::new();
    let task_cancel = cancel.clone();
    let returned_model = model.clone();

    let task = tokio::spawn(async move {
        let mut framer = SseFramer::new();

        loop {
            if task_cancel.is_cancelled() {
                break;
            }
            let event = tokio::time::timeout(receive_timeout, events.recv()).await;
            let event = match event {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(_) => {
                    if let Some(rec) = recorder.take() {
                        let _ = rec.flush();
                    }
                    let _ = tx.send(Err(LlmError::ApiStream("receive timeout".to_string()))).await;
                    break;
                }
            };

            match event {
                TransportEvent::Status(code) => {
                    if let Some(rec) = &mut recorder {
                        rec.set_status(code);
                    }
                    if !(200..300).contains(&code) {
                        if let Some(rec) = recorder.take() {
                            let _ = rec.flush();
                        }
                        let _ = tx
                            .send(Err(LlmError::ApiRequest { status: code, body: String::new() }))
                            .await;
                        break;
                    }
                }
                TransportEvent::Headers(headers) => {
                    if let Some(rec) = &mut recorder {
                        rec.set_headers(headers);
                    }
                }
                TransportEvent::Data(bytes) => {
                    if let Some(rec) = &mut recorder {
                        rec.push_chunk(&bytes);
                    }
                    framer.push(&bytes);
                    for sse_event in framer.drain_events() {
                        for chunk in wire.decode(&sse_event, &model) {
                            if task_cancel.is_cancelled() {
                                break;
                            }
                            if tx.send(Ok(chunk)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                TransportEvent::Done => {
                    if let Some(rec) = recorder.take() {
                        let _ = rec.flush();
                    }
                    break;
                }
            }
        }
    });

    StreamResponse { model: returned_model, cancel, receiver: ReceiverStream::new(rx), task }
}
