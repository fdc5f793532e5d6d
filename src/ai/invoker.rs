//! Timeout-bounded remote invocation
//!
//! Each call runs in its own short-lived task. The caller waits for the
//! task's single result record or for the timeout, whichever comes first; on
//! timeout the task's token is cancelled and the task aborted, which drops the
//! in-flight request and its connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ai::metadata::{self, ResponseMetadata};
use crate::ai::openai::{ChatRequest, ChatTransport};
use crate::config::AssistantMode;
use crate::error::InvokeError;

const FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Drop every character outside letters, digits, whitespace and `-_.~`,
/// then turn each newline into a space.
pub fn sanitize(message: &str) -> String {
    message
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || matches!(c, '-' | '_' | '.' | '~')
        })
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/// Convert a user-facing timeout to a `Duration`, rejecting nonsense values
pub fn timeout_duration(secs: f32) -> Duration {
    match Duration::try_from_secs_f32(secs) {
        Ok(d) if !d.is_zero() => d,
        _ => {
            warn!("Invalid timeout {} seconds, using {:?}", secs, FALLBACK_TIMEOUT);
            FALLBACK_TIMEOUT
        }
    }
}

/// Facts about the engine recorded alongside the response
#[derive(Debug, Clone)]
pub struct Provenance {
    pub mode: Option<AssistantMode>,
    pub instruction: Option<String>,
    pub file_names: Vec<String>,
}

/// The outcome of one successful call
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Text of the first completion
    pub content: String,
    /// Prompt as actually transmitted
    pub sent_prompt: String,
    pub metadata: ResponseMetadata,
}

/// Dispatches chat requests over a transport, one task per call
pub struct RemoteInvoker<T> {
    transport: Arc<T>,
}

impl<T: ChatTransport> RemoteInvoker<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` and wait at most `timeout` for the decoded response
    pub async fn invoke(
        &self,
        request: ChatRequest,
        provenance: Provenance,
        timeout: Duration,
    ) -> Result<Invocation, InvokeError> {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let transport = Arc::clone(&self.transport);

        let mut handle = tokio::spawn(async move {
            let start = Instant::now();
            let sent_prompt = request.content().to_string();

            let body = tokio::select! {
                _ = worker_token.cancelled() => return Err(InvokeError::Cancelled),
                result = transport.send(request) => result?,
            };

            decode_response(body, sent_prompt, start.elapsed(), &provenance)
        });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => {
                if let Err(e) = &result {
                    warn!("Remote call failed: {}", e);
                }
                result
            }
            Ok(Err(join_error)) => {
                warn!("Remote call task failed: {}", join_error);
                Err(InvokeError::Worker(join_error.to_string()))
            }
            Err(_) => {
                token.cancel();
                handle.abort();
                let err = InvokeError::Timeout(timeout.as_secs_f32());
                warn!("{}", err);
                Err(err)
            }
        }
    }
}

/// Build the invocation record from a decoded response body
pub fn decode_response(
    body: Value,
    sent_prompt: String,
    elapsed: Duration,
    provenance: &Provenance,
) -> Result<Invocation, InvokeError> {
    if !body.is_object() {
        return Err(InvokeError::Parse("response body is not an object".to_string()));
    }

    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| InvokeError::Parse("missing choices[0].message.content".to_string()))?;

    let total_tokens = match body.pointer("/usage/total_tokens").and_then(Value::as_u64) {
        Some(tokens) => tokens,
        None => {
            warn!("Response has no usage.total_tokens, recording 0");
            0
        }
    };

    let mut meta = ResponseMetadata::from_body(&body);
    meta.insert(metadata::PROCESSING_TIME_MS, elapsed.as_millis() as u64);
    meta.insert(metadata::TOTAL_TOKENS, total_tokens);
    if provenance.mode == Some(AssistantMode::FileSearch) && !provenance.file_names.is_empty() {
        meta.insert(metadata::FILE_NAMES, provenance.file_names.clone());
    }
    meta.insert(
        metadata::ASSISTANT_TYPE,
        provenance.mode.map(|m| m.as_str().to_string()),
    );
    meta.insert(metadata::INITIAL_INSTRUCTION, provenance.instruction.clone());
    meta.insert(
        metadata::RECEIVED_MESSAGE_LENGTH,
        content.trim().chars().count() as u64,
    );

    debug!(tokens = total_tokens, ms = elapsed.as_millis() as u64, "Response decoded");

    Ok(Invocation {
        content,
        sent_prompt,
        metadata: meta,
    })
}
