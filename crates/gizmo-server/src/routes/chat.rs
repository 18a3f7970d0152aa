use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use gizmo::errors::{ToolError, ToolResult};
use gizmo::models::message::Message;
use gizmo::models::tool::{RawToolCall, ToolCallId};
use gizmo::orchestrator::{FinishReason, Orchestrator, TurnEvent};
use gizmo::providers::openai::OpenAiProvider;
use gizmo::tools::{parse_call, ToolCall, ToolOutput, Toolbox};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// Types matching the incoming useChat JSON structure
#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    #[serde(rename = "toolInvocations")]
    tool_invocations: Vec<IncomingInvocation>,
}

#[derive(Debug, Deserialize)]
struct IncomingInvocation {
    state: String,
    #[serde(rename = "toolCallId")]
    tool_call_id: String,
    #[serde(rename = "toolName")]
    tool_name: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    result: Option<Value>,
}

// Custom SSE response type that implements the Vercel AI SDK protocol
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let stream = self;
        let body = axum::body::Body::from_stream(stream);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header("x-vercel-ai-data-stream", "v1")
            .body(body)
            .unwrap()
    }
}

// Rebuild the core message log from the useChat wire format. Tool
// interactions ride inside assistant messages; a resolved invocation carries
// the result the client stored, a "call" state one is still pending.
fn convert_messages(incoming: Vec<IncomingMessage>) -> Vec<Message> {
    let mut messages = Vec::new();

    for msg in incoming {
        match msg.role.as_str() {
            "user" => {
                messages.push(Message::user().with_text(msg.content));
            }
            "assistant" => {
                let mut message = Message::assistant();
                if !msg.content.is_empty() {
                    message = message.with_text(msg.content);
                }

                for invocation in msg.tool_invocations {
                    let id = ToolCallId::new(invocation.tool_call_id);
                    let raw = RawToolCall::new(id.clone(), invocation.tool_name, invocation.args);
                    let call = parse_call(&raw);

                    match (invocation.state.as_str(), invocation.result) {
                        ("result", Some(result)) => {
                            let outcome = match &call {
                                Ok(call) => decode_result(call, result),
                                // An invalid call can only ever resolve to
                                // its own error.
                                Err(e) => Err(e.clone()),
                            };
                            message = message.with_tool_result(id, call, outcome);
                        }
                        _ => {
                            message = message.with_tool_call(id, call);
                        }
                    }
                }

                messages.push(message);
            }
            _ => {
                tracing::warn!("Unknown role: {}", msg.role);
            }
        }
    }

    messages
}

// A stored result only counts if it decodes as the shape this tool produces.
fn decode_result(call: &ToolCall, result: Value) -> ToolResult<ToolOutput> {
    let decoded = match call {
        ToolCall::Weather(_) => serde_json::from_value(result).map(ToolOutput::Weather),
        ToolCall::ThemePicker => serde_json::from_value(result).map(ToolOutput::Themes),
        ToolCall::Confirmation(_) => serde_json::from_value(result).map(ToolOutput::Confirmation),
        ToolCall::SelfDestruct => serde_json::from_value(result).map(ToolOutput::SelfDestruct),
    };
    decoded.map_err(|e| {
        ToolError::ExecutionFailed(format!("stored result did not match the tool: {}", e))
    })
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::new());
        format!("0:{}\n", encoded_text)
    }

    fn format_tool_call(id: &str, name: &str, args: &Value) -> String {
        // Tool calls start with "9:"
        let tool_call = json!({
            "toolCallId": id,
            "toolName": name,
            "args": args
        });
        format!("9:{}\n", tool_call)
    }

    fn format_tool_response(id: &str, result: &Value) -> String {
        // Tool responses start with "a:"
        let response = json!({
            "toolCallId": id,
            "result": result,
        });
        format!("a:{}\n", response)
    }

    fn format_error(message: &str) -> String {
        // Errors start with "3:"
        let encoded = serde_json::to_string(message).unwrap_or_else(|_| String::new());
        format!("3:{}\n", encoded)
    }

    fn format_finish(reason: &str) -> String {
        // Finish messages start with "d:"
        let finish = json!({
            "finishReason": reason,
            "usage": {
                "promptTokens": 0,
                "completionTokens": 0
            }
        });
        format!("d:{}\n", finish)
    }
}

fn finish_reason_str(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        // A spent round budget looks the same to the client as a turn that
        // ended on tool calls: no closing prose.
        FinishReason::ToolCalls | FinishReason::RoundLimit => "tool-calls",
        FinishReason::Error => "error",
    }
}

// Map one turn event to the protocol frames it produces
fn frames_for(event: &TurnEvent) -> Vec<String> {
    match event {
        TurnEvent::TextDelta(text) => text
            .lines()
            .map(|line| ProtocolFormatter::format_text(&format!("{}\n", line)))
            .collect(),
        TurnEvent::ToolCall { id, call } => match call {
            Ok(call) => vec![ProtocolFormatter::format_tool_call(
                id.as_str(),
                call.name(),
                &call.arguments(),
            )],
            // An invalid call still reaches the client under its attempted
            // name; the paired error result follows with the same id.
            Err(e) => vec![ProtocolFormatter::format_tool_call(
                id.as_str(),
                e.tool_name().unwrap_or("invalid name"),
                &json!({}),
            )],
        },
        TurnEvent::ToolResult { id, outcome } => match outcome {
            Ok(output) => vec![ProtocolFormatter::format_tool_response(
                id.as_str(),
                &output.to_wire(),
            )],
            Err(e) => vec![ProtocolFormatter::format_tool_response(
                id.as_str(),
                &json!({ "error": e.to_string() }),
            )],
        },
        TurnEvent::TurnError(message) => vec![ProtocolFormatter::format_error(message)],
        TurnEvent::Finished(reason) => {
            vec![ProtocolFormatter::format_finish(finish_reason_str(*reason))]
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    // Check protocol header (optional in our case)
    if let Some(protocol) = headers.get("x-protocol") {
        if protocol.to_str().map(|p| p != "data").unwrap_or(true) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let max_rounds = state.max_rounds;
    let provider = OpenAiProvider::new(state.provider_config)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let toolbox = Toolbox::from_env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let orchestrator =
        Orchestrator::new(Arc::new(provider), Arc::new(toolbox)).with_max_rounds(max_rounds);

    // Convert incoming messages
    let messages = convert_messages(request.messages);

    // Spawn task to run the turn and forward frames
    tokio::spawn(async move {
        let (event_tx, mut event_rx) = mpsc::channel(100);
        let turn = tokio::spawn(async move {
            orchestrator.run_turn(&messages, event_tx).await;
        });

        while let Some(event) = event_rx.recv().await {
            for frame in frames_for(&event) {
                if tx.send(frame).await.is_err() {
                    // Client went away; dropping the receiver stops the turn.
                    return;
                }
            }
        }

        let _ = turn.await;
    });

    Ok(SseResponse::new(stream))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
