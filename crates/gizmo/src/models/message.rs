use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use super::tool::ToolCallId;
use crate::errors::ToolResult;
use crate::tools::{ConfirmationRequest, ToolCall, ToolOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// A tool call tracked from the moment the model issued it until something
/// resolves it. Calls the client answers (confirmations) may stay pending
/// indefinitely; everything else is resolved within the same turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: ToolCallId,
    /// The validated call, or the error that made it unrunnable
    pub call: ToolResult<ToolCall>,
    pub state: InvocationState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvocationState {
    /// Issued, no outcome yet
    Call,
    /// The outcome is attached
    Resolved(ToolResult<ToolOutput>),
}

impl ToolInvocation {
    pub fn pending(id: ToolCallId, call: ToolResult<ToolCall>) -> Self {
        ToolInvocation {
            id,
            call,
            state: InvocationState::Call,
        }
    }

    pub fn resolved(
        id: ToolCallId,
        call: ToolResult<ToolCall>,
        outcome: ToolResult<ToolOutput>,
    ) -> Self {
        ToolInvocation {
            id,
            call,
            state: InvocationState::Resolved(outcome),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, InvocationState::Call)
    }

    pub fn outcome(&self) -> Option<&ToolResult<ToolOutput>> {
        match &self.state {
            InvocationState::Call => None,
            InvocationState::Resolved(outcome) => Some(outcome),
        }
    }

    pub fn resolve(&mut self, outcome: ToolResult<ToolOutput>) {
        self.state = InvocationState::Resolved(outcome);
    }

    /// The confirmation request, if this is an unanswered `askForConfirmation`.
    pub fn pending_confirmation(&self) -> Option<&ConfirmationRequest> {
        if !self.is_pending() {
            return None;
        }
        match &self.call {
            Ok(ToolCall::Confirmation(request)) => Some(request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One ordered piece of a message, either prose or a tool interaction
pub enum Part {
    Text(TextPart),
    Invocation(ToolInvocation),
}

impl Part {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Part::Text(TextPart { text: text.into() })
    }

    /// Get the text content if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Part::Invocation(invocation) => Some(invocation),
            _ => None,
        }
    }

    pub fn as_invocation_mut(&mut self) -> Option<&mut ToolInvocation> {
        match self {
            Part::Invocation(invocation) => Some(invocation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub id: String,
    pub role: Role,
    pub created: i64,
    pub parts: Vec<Part>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            created: Utc::now().timestamp(),
            parts: Vec::new(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message::new(Role::Assistant)
    }

    /// Add any Part to the message
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Add text to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_part(Part::text(text))
    }

    /// Add a pending tool invocation to the message
    pub fn with_tool_call(self, id: ToolCallId, call: ToolResult<ToolCall>) -> Self {
        self.with_part(Part::Invocation(ToolInvocation::pending(id, call)))
    }

    /// Add an already resolved tool invocation to the message
    pub fn with_tool_result(
        self,
        id: ToolCallId,
        call: ToolResult<ToolCall>,
        outcome: ToolResult<ToolOutput>,
    ) -> Self {
        self.with_part(Part::Invocation(ToolInvocation::resolved(id, call, outcome)))
    }

    /// All text parts joined, for places that only care about prose
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(Part::as_invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::WeatherArgs;

    #[test]
    fn builders_keep_part_order() {
        let message = Message::assistant()
            .with_text("Checking the weather")
            .with_tool_call(
                ToolCallId::new("call_1"),
                Ok(ToolCall::Weather(WeatherArgs {
                    city: "London".into(),
                    country: None,
                })),
            );

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.parts[0].as_text(), Some("Checking the weather"));
        assert!(message.parts[1].as_invocation().unwrap().is_pending());
    }

    #[test]
    fn text_joins_only_text_parts() {
        let message = Message::assistant()
            .with_text("one")
            .with_tool_call(ToolCallId::new("call_1"), Ok(ToolCall::ThemePicker))
            .with_text("two");

        assert_eq!(message.text(), "one\ntwo");
    }

    #[test]
    fn pending_confirmation_requires_pending_state() {
        let request = ConfirmationRequest {
            message: "Delete everything?".into(),
        };

        let pending = ToolInvocation::pending(
            ToolCallId::new("call_1"),
            Ok(ToolCall::Confirmation(request.clone())),
        );
        assert_eq!(pending.pending_confirmation(), Some(&request));

        let mut resolved = pending.clone();
        resolved.resolve(Ok(ToolOutput::Confirmation(
            crate::tools::ConfirmationAnswer::Confirmed,
        )));
        assert_eq!(resolved.pending_confirmation(), None);

        let other_tool =
            ToolInvocation::pending(ToolCallId::new("call_2"), Ok(ToolCall::ThemePicker));
        assert_eq!(other_tool.pending_confirmation(), None);
    }

    #[test]
    fn messages_have_unique_ids() {
        assert_ne!(Message::user().id, Message::user().id);
    }
}
