//! The ordered message log a conversation renders from.
//!
//! The log is append-only: turn events only ever add parts to the trailing
//! assistant message or resolve a pending invocation in place. Nothing here
//! reorders or rewrites history, which is what keeps the client render and
//! the provider wire view consistent with each other.

use tracing::warn;

use crate::errors::ToolResult;
use crate::models::message::{Message, Part, ToolInvocation};
use crate::models::role::Role;
use crate::models::tool::ToolCallId;
use crate::orchestrator::TurnEvent;
use crate::tools::{ConfirmationAnswer, ToolOutput};

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_user<S: Into<String>>(&mut self, text: S) {
        self.messages.push(Message::user().with_text(text));
    }

    /// Fold one turn event into the log.
    ///
    /// A `ToolResult` that matches no pending invocation is dropped with a
    /// warning; the producer's contract is call-before-result, so an orphan
    /// result is a bug upstream, not something to guess a home for.
    pub fn apply(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::TextDelta(text) => {
                let message = self.tail_assistant();
                match message.parts.last_mut() {
                    Some(Part::Text(existing)) => existing.text.push_str(text),
                    _ => message.parts.push(Part::text(text.clone())),
                }
            }
            TurnEvent::ToolCall { id, call } => {
                let message = self.tail_assistant();
                message
                    .parts
                    .push(Part::Invocation(ToolInvocation::pending(
                        id.clone(),
                        call.clone(),
                    )));
            }
            TurnEvent::ToolResult { id, outcome } => {
                if !self.resolve_pending(id, outcome.clone()) {
                    warn!(%id, "dropping tool result with no matching pending call");
                }
            }
            // Turn errors are shown, not stored; Finished carries no content.
            TurnEvent::TurnError(_) | TurnEvent::Finished(_) => {}
        }
    }

    /// Record the user's answer to a pending confirmation. Returns false if
    /// `id` does not name a pending confirmation, and changes nothing.
    pub fn resolve_confirmation(&mut self, id: &ToolCallId, answer: ConfirmationAnswer) -> bool {
        for message in self.messages.iter_mut().rev() {
            for part in message.parts.iter_mut() {
                if let Some(invocation) = part.as_invocation_mut() {
                    if invocation.id == *id && invocation.pending_confirmation().is_some() {
                        invocation.resolve(Ok(ToolOutput::Confirmation(answer)));
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Unanswered confirmations, oldest first.
    pub fn pending_confirmations(&self) -> Vec<(ToolCallId, String)> {
        self.messages
            .iter()
            .flat_map(|message| message.invocations())
            .filter_map(|invocation| {
                invocation
                    .pending_confirmation()
                    .map(|request| (invocation.id.clone(), request.message.clone()))
            })
            .collect()
    }

    /// Drop the trailing assistant output and the user message that
    /// triggered it. Resets the interaction to before the interrupted
    /// user request.
    pub fn rollback_last_exchange(&mut self) {
        while let Some(message) = self.messages.pop() {
            if message.role == Role::User {
                break;
            }
        }
    }

    fn tail_assistant(&mut self) -> &mut Message {
        match self.messages.last() {
            Some(message) if message.role == Role::Assistant => {}
            _ => self.messages.push(Message::assistant()),
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    fn resolve_pending(&mut self, id: &ToolCallId, outcome: ToolResult<ToolOutput>) -> bool {
        for message in self.messages.iter_mut().rev() {
            for part in message.parts.iter_mut() {
                if let Some(invocation) = part.as_invocation_mut() {
                    if invocation.id == *id && invocation.is_pending() {
                        invocation.resolve(outcome);
                        return true;
                    }
                }
            }
        }
        false
    }
}
