use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::{RawToolCall, ToolCallId, ToolSpec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One model reply: the assistant prose (if any) and the tool calls it
/// asked for, still unvalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<RawToolCall>,
    pub usage: Usage,
}

impl Completion {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Completion {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_call<I, S>(mut self, id: I, name: S, arguments: serde_json::Value) -> Self
    where
        I: Into<ToolCallId>,
        S: Into<String>,
    {
        self.tool_calls.push(RawToolCall::new(id, name, arguments));
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Base trait for chat model providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate the next reply given the system prompt, the conversation so
    /// far, and the tools on offer
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Completion>;
}
