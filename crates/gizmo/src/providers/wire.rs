//! Conversions between the internal message log and the OpenAI
//! chat-completions wire format.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{RawToolCall, ToolCallId, ToolSpec};
use crate::providers::base::Completion;

/// Stands in as the tool result for a confirmation the user has not answered
/// yet, so a follow-up turn still sends a well-formed history.
pub const PENDING_TOOL_NOTE: &str = "The user has not answered this confirmation yet.";

/// Convert internal messages to OpenAI's API message specification.
///
/// Every tool invocation expands to an assistant `tool_calls` entry plus the
/// `role: "tool"` message OpenAI requires after it; invocations that failed
/// validation keep their attempted name so the model can see what went wrong.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::User => {
                let text = message.text();
                if !text.is_empty() {
                    messages_spec.push(json!({
                        "role": "user",
                        "content": text
                    }));
                }
            }
            Role::Assistant => {
                let mut converted = json!({
                    "role": "assistant"
                });

                let text = message.text();
                if !text.is_empty() {
                    converted["content"] = json!(text);
                }

                let mut tool_calls = Vec::new();
                let mut tool_messages = Vec::new();

                for invocation in message.invocations() {
                    let (name, arguments) = match &invocation.call {
                        Ok(call) => (call.name().to_string(), call.arguments().to_string()),
                        Err(e) => (
                            e.tool_name().unwrap_or("unknown").to_string(),
                            "{}".to_string(),
                        ),
                    };
                    tool_calls.push(json!({
                        "id": invocation.id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments,
                        }
                    }));

                    let content = match invocation.outcome() {
                        Some(Ok(output)) => output.to_wire().to_string(),
                        // A tool error is shown as output so the model can interpret the message
                        Some(Err(e)) => {
                            format!("The tool call returned the following error:\n{}", e)
                        }
                        None => PENDING_TOOL_NOTE.to_string(),
                    };
                    tool_messages.push(json!({
                        "role": "tool",
                        "content": content,
                        "tool_call_id": invocation.id
                    }));
                }

                if !tool_calls.is_empty() {
                    converted["tool_calls"] = json!(tool_calls);
                }
                if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
                    messages_spec.push(converted);
                }
                messages_spec.extend(tool_messages);
            }
        }
    }

    messages_spec
}

/// Convert internal tool specs to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[ToolSpec]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to a [`Completion`] (without usage, which
/// lives next to the choices rather than inside them)
pub fn response_to_completion(response: &Value) -> Result<Completion> {
    let message = response["choices"]
        .get(0)
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("Response contained no message"))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(str::to_string);

    let mut tool_calls = Vec::new();
    if let Some(requested) = message.get("tool_calls").and_then(Value::as_array) {
        for entry in requested {
            let id = ToolCallId::new(entry["id"].as_str().unwrap_or_default()).or_generated();
            let name = entry["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            // Arguments arrive as a JSON string; a string that does not parse
            // still produces a call, which validation then rejects with a
            // proper error the model gets to see.
            let arguments = entry["function"]["arguments"]
                .as_str()
                .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                .unwrap_or(Value::Null);
            tool_calls.push(RawToolCall { id, name, arguments });
        }
    }

    Ok(Completion {
        text,
        tool_calls,
        ..Default::default()
    })
}
