use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{ToolError, ToolResult};
use crate::models::message::Message;
use crate::models::tool::ToolCallId;
use crate::prompt::SYSTEM_PROMPT;
use crate::providers::base::ChatProvider;
use crate::tools::{Dispatch, ToolCall, ToolOutput, Toolbox};

/// How many provider round-trips one user message may consume.
pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// Incremental output of one conversation turn, in the order a client
/// should render it. A `ToolCall` always precedes the `ToolResult` with the
/// same id; `Finished` is always last and appears exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A chunk of assistant prose
    TextDelta(String),
    /// The model asked for a tool; invalid calls arrive as `Err`
    ToolCall {
        id: ToolCallId,
        call: ToolResult<ToolCall>,
    },
    /// A server-executed call resolved
    ToolResult {
        id: ToolCallId,
        outcome: ToolResult<ToolOutput>,
    },
    /// The turn failed outside any single tool call
    TurnError(String),
    Finished(FinishReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model answered with prose and wants nothing more
    Stop,
    /// The turn ended with a call only the user can resolve
    ToolCalls,
    /// The round budget ran out while the model kept calling tools
    RoundLimit,
    /// The provider failed; a `TurnError` precedes this
    Error,
}

/// Drives the model/tool loop for one user turn at a time.
///
/// Cheap to clone; clones share the provider and toolbox.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    toolbox: Arc<Toolbox>,
    max_rounds: usize,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ChatProvider>, toolbox: Arc<Toolbox>) -> Self {
        Self {
            provider,
            toolbox,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Run one turn against `history`, emitting events until `Finished`.
    ///
    /// The caller owns the history; everything this turn produced reaches it
    /// only through the channel. If the receiver goes away the turn stops
    /// quietly instead of finishing work nobody will see.
    pub async fn run_turn(&self, history: &[Message], events: mpsc::Sender<TurnEvent>) {
        let reason = self.turn_loop(history, &events).await;
        let _ = events.send(TurnEvent::Finished(reason)).await;
    }

    async fn turn_loop(&self, history: &[Message], events: &mpsc::Sender<TurnEvent>) -> FinishReason {
        let mut messages = history.to_vec();

        for round in 0..self.max_rounds {
            let completion = match self
                .provider
                .complete(SYSTEM_PROMPT, &messages, self.toolbox.specs())
                .await
            {
                Ok(completion) => completion,
                Err(e) => {
                    warn!(error = %e, "provider completion failed");
                    let _ = events.send(TurnEvent::TurnError(e.to_string())).await;
                    return FinishReason::Error;
                }
            };
            debug!(
                round,
                tool_calls = completion.tool_calls.len(),
                usage = ?completion.usage,
                "completion received"
            );

            if let Some(text) = &completion.text {
                if events.send(TurnEvent::TextDelta(text.clone())).await.is_err() {
                    return FinishReason::Stop;
                }
            }

            if completion.tool_calls.is_empty() {
                return FinishReason::Stop;
            }

            // Announce every call before any of them runs, so clients can
            // show in-flight state.
            let mut parsed: Vec<(ToolCallId, ToolResult<ToolCall>)> = Vec::new();
            for raw in &completion.tool_calls {
                let id = raw.id.clone().or_generated();
                let call = self.toolbox.parse(raw);
                let event = TurnEvent::ToolCall {
                    id: id.clone(),
                    call: call.clone(),
                };
                if events.send(event).await.is_err() {
                    return FinishReason::Stop;
                }
                parsed.push((id, call));
            }

            // Server-side calls run in parallel; confirmations come back as
            // AwaitsUser and stay unresolved.
            let dispatches = futures::future::join_all(
                parsed.iter().map(|(_, call)| self.dispatch_call(call)),
            )
            .await;

            let mut assistant = Message::assistant();
            if let Some(text) = completion.text {
                assistant = assistant.with_text(text);
            }
            let mut awaiting_user = false;

            for ((id, call), dispatch) in parsed.into_iter().zip(dispatches) {
                match dispatch {
                    Dispatch::Completed(outcome) => {
                        let event = TurnEvent::ToolResult {
                            id: id.clone(),
                            outcome: outcome.clone(),
                        };
                        if events.send(event).await.is_err() {
                            return FinishReason::Stop;
                        }
                        assistant = assistant.with_tool_result(id, call, outcome);
                    }
                    Dispatch::AwaitsUser(_) => {
                        awaiting_user = true;
                        assistant = assistant.with_tool_call(id, call);
                    }
                }
            }

            if awaiting_user {
                // The user answers out of band; a later turn picks it up.
                return FinishReason::ToolCalls;
            }

            messages.push(assistant);
        }

        debug!(max_rounds = self.max_rounds, "round budget exhausted");
        FinishReason::RoundLimit
    }

    /// Resolve one parsed call to a dispatch, never panicking the turn: a
    /// call that failed validation resolves to its error, and a tool that
    /// panics is caught and reported as an execution failure.
    async fn dispatch_call(&self, call: &ToolResult<ToolCall>) -> Dispatch {
        match call {
            Err(e) => Dispatch::Completed(Err(e.clone())),
            Ok(call) => match AssertUnwindSafe(self.toolbox.dispatch(call)).catch_unwind().await {
                Ok(dispatch) => dispatch,
                Err(_) => Dispatch::Completed(Err(ToolError::ExecutionFailed(
                    "tool panicked during execution".to_string(),
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::Completion;
    use crate::providers::mock::MockProvider;
    use crate::tools::{
        ConfirmationAnswer, ConfirmationRequest, ThemeId, CONFIRMATION_TOOL, SELF_DESTRUCT_TOOL,
        THEME_TOOL, WEATHER_TOOL,
    };
    use crate::weather::WeatherClient;
    use serde_json::json;

    fn orchestrator(replies: Vec<Completion>) -> Orchestrator {
        let toolbox = Toolbox::new(WeatherClient::new("http://unused.invalid", None).unwrap());
        Orchestrator::new(Arc::new(MockProvider::new(replies)), Arc::new(toolbox))
    }

    async fn collect_events(orchestrator: &Orchestrator, history: &[Message]) -> Vec<TurnEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        orchestrator.run_turn(history, tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn finish_reason(events: &[TurnEvent]) -> FinishReason {
        match events.last() {
            Some(TurnEvent::Finished(reason)) => *reason,
            other => panic!("expected a Finished event last, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn text_only_turn_stops_after_one_round() {
        let orchestrator = orchestrator(vec![Completion::text("Hello!")]);
        let history = vec![Message::user().with_text("Hi")];

        let events = collect_events(&orchestrator, &history).await;

        assert_eq!(
            events,
            vec![
                TurnEvent::TextDelta("Hello!".to_string()),
                TurnEvent::Finished(FinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn tool_round_trip_orders_call_before_result() {
        let orchestrator = orchestrator(vec![
            Completion::text("Let me get those themes").with_tool_call(
                "call_1",
                THEME_TOOL,
                json!({}),
            ),
            Completion::text("Pick one!"),
        ]);
        let history = vec![Message::user().with_text("Change the theme")];

        let events = collect_events(&orchestrator, &history).await;

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            TurnEvent::TextDelta("Let me get those themes".to_string())
        );
        let TurnEvent::ToolCall { id, call } = &events[1] else {
            panic!("expected a tool call event");
        };
        assert_eq!(id.as_str(), "call_1");
        assert_eq!(call.as_ref().unwrap(), &ToolCall::ThemePicker);

        let TurnEvent::ToolResult { id, outcome } = &events[2] else {
            panic!("expected a tool result event");
        };
        assert_eq!(id.as_str(), "call_1");
        let Ok(ToolOutput::Themes(list)) = outcome else {
            panic!("expected a theme list");
        };
        assert_eq!(list.themes.len(), 5);
        assert_eq!(list.themes[4].value, ThemeId::Ocean);

        assert_eq!(events[3], TurnEvent::TextDelta("Pick one!".to_string()));
        assert_eq!(finish_reason(&events), FinishReason::Stop);
    }

    #[tokio::test]
    async fn unknown_tool_resolves_to_error_and_the_turn_continues() {
        let orchestrator = orchestrator(vec![
            Completion::default().with_tool_call("call_1", "launchMissiles", json!({})),
            Completion::text("That tool does not exist, sorry."),
        ]);
        let history = vec![Message::user().with_text("Launch the missiles")];

        let events = collect_events(&orchestrator, &history).await;

        let TurnEvent::ToolCall { call, .. } = &events[0] else {
            panic!("expected a tool call event");
        };
        assert_eq!(
            call.as_ref().unwrap_err(),
            &ToolError::UnknownTool("launchMissiles".to_string())
        );

        let TurnEvent::ToolResult { outcome, .. } = &events[1] else {
            panic!("expected a tool result event");
        };
        assert!(outcome.is_err());

        assert_eq!(
            events[2],
            TurnEvent::TextDelta("That tool does not exist, sorry.".to_string())
        );
        assert_eq!(finish_reason(&events), FinishReason::Stop);
    }

    #[tokio::test]
    async fn invalid_arguments_resolve_to_error() {
        let orchestrator = orchestrator(vec![
            Completion::default().with_tool_call("call_1", WEATHER_TOOL, json!({"town": "Leeds"})),
            Completion::text("I need a city name."),
        ]);
        let history = vec![Message::user().with_text("Weather please")];

        let events = collect_events(&orchestrator, &history).await;

        let TurnEvent::ToolResult { outcome, .. } = &events[1] else {
            panic!("expected a tool result event");
        };
        assert!(matches!(
            outcome.as_ref().unwrap_err(),
            ToolError::InvalidArguments { tool, .. } if tool == WEATHER_TOOL
        ));
        assert_eq!(finish_reason(&events), FinishReason::Stop);
    }

    #[tokio::test]
    async fn parallel_calls_all_announce_before_any_result() {
        let orchestrator = orchestrator(vec![
            Completion::default()
                .with_tool_call("call_1", THEME_TOOL, json!({}))
                .with_tool_call("call_2", SELF_DESTRUCT_TOOL, json!({})),
            Completion::text("Done"),
        ]);
        let history = vec![Message::user().with_text("Both please")];

        let events = collect_events(&orchestrator, &history).await;

        assert!(matches!(events[0], TurnEvent::ToolCall { .. }));
        assert!(matches!(events[1], TurnEvent::ToolCall { .. }));
        let TurnEvent::ToolResult { id, .. } = &events[2] else {
            panic!("expected a tool result event");
        };
        assert_eq!(id.as_str(), "call_1");
        let TurnEvent::ToolResult { id, .. } = &events[3] else {
            panic!("expected a tool result event");
        };
        assert_eq!(id.as_str(), "call_2");
    }

    #[tokio::test]
    async fn round_budget_caps_tool_rounds() {
        let endless: Vec<Completion> = (0..10)
            .map(|i| {
                Completion::default().with_tool_call(
                    format!("call_{}", i).as_str(),
                    THEME_TOOL,
                    json!({}),
                )
            })
            .collect();
        let orchestrator = orchestrator(endless).with_max_rounds(3);
        let history = vec![Message::user().with_text("Loop forever")];

        let events = collect_events(&orchestrator, &history).await;

        let calls = events
            .iter()
            .filter(|event| matches!(event, TurnEvent::ToolCall { .. }))
            .count();
        assert_eq!(calls, 3);
        assert_eq!(finish_reason(&events), FinishReason::RoundLimit);
    }

    #[tokio::test]
    async fn confirmation_suspends_the_turn_without_a_result() {
        let orchestrator = orchestrator(vec![Completion::default().with_tool_call(
            "call_1",
            CONFIRMATION_TOOL,
            json!({"message": "Really self-destruct?"}),
        )]);
        let history = vec![Message::user().with_text("Self destruct")];

        let events = collect_events(&orchestrator, &history).await;

        assert_eq!(events.len(), 2);
        let TurnEvent::ToolCall { call, .. } = &events[0] else {
            panic!("expected a tool call event");
        };
        assert_eq!(
            call.as_ref().unwrap(),
            &ToolCall::Confirmation(ConfirmationRequest {
                message: "Really self-destruct?".to_string()
            })
        );
        assert_eq!(finish_reason(&events), FinishReason::ToolCalls);
    }

    #[tokio::test]
    async fn mixed_round_resolves_executables_then_suspends() {
        let orchestrator = orchestrator(vec![Completion::default()
            .with_tool_call("call_1", THEME_TOOL, json!({}))
            .with_tool_call("call_2", CONFIRMATION_TOOL, json!({"message": "Ok?"}))]);
        let history = vec![Message::user().with_text("Theme and confirm")];

        let events = collect_events(&orchestrator, &history).await;

        assert!(matches!(events[0], TurnEvent::ToolCall { .. }));
        assert!(matches!(events[1], TurnEvent::ToolCall { .. }));
        let TurnEvent::ToolResult { id, .. } = &events[2] else {
            panic!("expected the theme result");
        };
        assert_eq!(id.as_str(), "call_1");
        assert_eq!(finish_reason(&events), FinishReason::ToolCalls);
        // No result for call_2: it belongs to the user.
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn self_destruct_runs_even_without_a_prior_confirmation() {
        // The confirm-first rule lives in the system prompt only; a model
        // that skips it still gets the notice back.
        let orchestrator = orchestrator(vec![
            Completion::default().with_tool_call("call_1", SELF_DESTRUCT_TOOL, json!({})),
            Completion::text("Boom."),
        ]);
        let history = vec![Message::user().with_text("Skip the formalities")];

        let events = collect_events(&orchestrator, &history).await;

        let TurnEvent::ToolResult { outcome, .. } = &events[1] else {
            panic!("expected a tool result event");
        };
        assert!(matches!(outcome, Ok(ToolOutput::SelfDestruct(_))));
        assert_eq!(finish_reason(&events), FinishReason::Stop);
    }

    #[tokio::test]
    async fn continuation_runs_normally_after_a_resolved_confirmation() {
        let orchestrator = orchestrator(vec![Completion::text("Self-destruct it is!")]);
        let history = vec![
            Message::user().with_text("Self destruct"),
            Message::assistant().with_tool_result(
                ToolCallId::new("call_1"),
                Ok(ToolCall::Confirmation(ConfirmationRequest {
                    message: "Really?".to_string(),
                })),
                Ok(ToolOutput::Confirmation(ConfirmationAnswer::Confirmed)),
            ),
        ];

        let events = collect_events(&orchestrator, &history).await;

        assert_eq!(
            events,
            vec![
                TurnEvent::TextDelta("Self-destruct it is!".to_string()),
                TurnEvent::Finished(FinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn provider_failure_emits_turn_error_then_error_finish() {
        let toolbox = Toolbox::new(WeatherClient::new("http://unused.invalid", None).unwrap());
        let orchestrator = Orchestrator::new(
            Arc::new(MockProvider::failing("model fell over")),
            Arc::new(toolbox),
        );
        let history = vec![Message::user().with_text("Hi")];

        let events = collect_events(&orchestrator, &history).await;

        assert_eq!(
            events,
            vec![
                TurnEvent::TurnError("model fell over".to_string()),
                TurnEvent::Finished(FinishReason::Error),
            ]
        );
    }

    #[tokio::test]
    async fn empty_completion_counts_as_stop() {
        let orchestrator = orchestrator(vec![]);
        let history = vec![Message::user().with_text("Hi")];

        let events = collect_events(&orchestrator, &history).await;
        assert_eq!(events, vec![TurnEvent::Finished(FinishReason::Stop)]);
    }
}
