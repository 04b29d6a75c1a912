// ---------------------------------------------------------------------------
// streaming.rs - Simulated SSE streaming of a single tool invocation
// ---------------------------------------------------------------------------
//
// Frame sequence:
//   start {method}
//   data  {chunk}            per fragment, only for tools that stream
//   data  {chunk, offset}    120-char re-chunking of the final text (always)
//   end   {ok: true}         or a single `error {detail}` with no `end`
//
// The frame stream is lazy and driven by the HTTP body: when the client goes
// away the stream is dropped, and with it the in-flight tool future.

use std::sync::Arc;
use std::time::Instant;

use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::dispatch::Dispatcher;
use crate::error::ToolError;
use crate::params::Params;
use crate::registry::{Tool, ToolBody};
use crate::sanitize::sanitize;

pub const CHUNK_CHARS: usize = 120;
const MAX_ERROR_DETAIL_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Start { method: String },
    /// `offset` is `None` for fragments produced incrementally by the tool
    /// and the character index for re-chunked output.
    Data { chunk: String, offset: Option<usize> },
    Error { detail: String },
    End,
}

impl StreamFrame {
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamFrame::Start { .. } => "start",
            StreamFrame::Data { .. } => "data",
            StreamFrame::Error { .. } => "error",
            StreamFrame::End => "end",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            StreamFrame::Start { method } => json!({ "method": method }),
            StreamFrame::Data { chunk, offset: None } => json!({ "chunk": chunk }),
            StreamFrame::Data { chunk, offset: Some(offset) } => {
                json!({ "chunk": chunk, "offset": offset })
            }
            StreamFrame::Error { detail } => json!({ "detail": detail }),
            StreamFrame::End => json!({ "ok": true }),
        }
    }

    pub fn into_event(self) -> Event {
        Event::default()
            .event(self.event_name())
            .data(self.payload().to_string())
    }
}

/// Text form of a final result: structured values are sanitized and
/// pretty-printed, strings pass through, other scalars use their JSON text.
pub fn normalize(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            let clean = sanitize(value);
            serde_json::to_string_pretty(&clean).unwrap_or_else(|_| clean.to_string())
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split `text` into `size`-character pieces paired with their starting
/// character offset.
pub fn rechunk(text: &str, size: usize) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, piece)| (i * size.max(1), piece.iter().collect()))
        .collect()
}

/// Strip control characters and truncate a failure detail for an in-band
/// `error` frame.
pub fn clean_detail(detail: &str) -> String {
    detail
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_ERROR_DETAIL_CHARS)
        .collect()
}

fn error_frame(err: &ToolError) -> StreamFrame {
    let detail = match err {
        ToolError::Params(m) => format!("parameter error: {}", clean_detail(m)),
        other => format!("tool execution failed: {}", clean_detail(&other.to_string())),
    };
    StreamFrame::Error { detail }
}

/// Drive one invocation of `tool` and produce its frame sequence.
pub fn frames(
    dispatcher: Arc<Dispatcher>,
    tool: Arc<Tool>,
    params: Params,
) -> impl Stream<Item = StreamFrame> + Send + 'static {
    async_stream::stream! {
        let method = tool.name().to_string();
        yield StreamFrame::Start { method: method.clone() };

        let mut incremental = None;
        if let ToolBody::Streaming(_, produce) = tool.body() {
            match produce(params.clone()) {
                Ok(fragments) => incremental = fragments,
                Err(e) => {
                    tracing::warn!(tool = %method, "stream: {}", e);
                    yield error_frame(&e);
                    return;
                }
            }
        }

        let outcome = match incremental {
            Some(mut fragments) => {
                let started = Instant::now();
                let mut text = String::new();
                let mut failure = None;
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(fragment) => {
                            text.push_str(&fragment);
                            yield StreamFrame::Data { chunk: fragment, offset: None };
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                match failure {
                    Some(e) => Err(e),
                    None => {
                        dispatcher.record(&method, started);
                        Ok(Value::String(text))
                    }
                }
            }
            None => dispatcher.invoke(&tool, params).await,
        };

        let value = match outcome {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool = %method, "stream: tool failed: {}", e);
                yield error_frame(&e);
                return;
            }
        };

        for (offset, chunk) in rechunk(&normalize(&value), CHUNK_CHARS) {
            yield StreamFrame::Data { chunk, offset: Some(offset) };
        }
        yield StreamFrame::End;
    }
}
