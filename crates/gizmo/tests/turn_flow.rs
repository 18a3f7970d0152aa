//! End-to-end turns against mocked OpenAI and OpenWeatherMap endpoints,
//! using only the public API.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gizmo::models::message::Message;
use gizmo::orchestrator::{FinishReason, Orchestrator, TurnEvent};
use gizmo::providers::configs::OpenAiProviderConfig;
use gizmo::providers::openai::OpenAiProvider;
use gizmo::tools::{ConfirmationAnswer, ToolCall, ToolOutput, Toolbox};
use gizmo::transcript::Transcript;
use gizmo::weather::WeatherClient;

fn chat_completion(message: serde_json::Value) -> serde_json::Value {
    json!({
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 10, "total_tokens": 20}
    })
}

async fn mount_weather(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "London",
            "sys": {"country": "GB"},
            "main": {"temp": 17.6, "feels_like": 17.2, "humidity": 72, "pressure": 1012},
            "weather": [{"main": "Clouds", "description": "scattered clouds", "icon": "03d"}],
            "wind": {"speed": 4.1, "deg": 240},
            "clouds": {"all": 40},
            "visibility": 10000
        })))
        .mount(server)
        .await;
}

fn orchestrator_for(openai: &MockServer, weather: &MockServer) -> Orchestrator {
    let config = OpenAiProviderConfig {
        host: openai.uri(),
        api_key: "test_key".to_string(),
        model: "gpt-4o".to_string(),
        temperature: None,
        max_tokens: None,
    };
    let provider = OpenAiProvider::new(config).unwrap();
    let toolbox = Toolbox::new(
        WeatherClient::new(weather.uri(), Some("weather_key".to_string())).unwrap(),
    );
    Orchestrator::new(Arc::new(provider), Arc::new(toolbox))
}

async fn run_turn(orchestrator: &Orchestrator, transcript: &mut Transcript) -> Vec<TurnEvent> {
    let (tx, mut rx) = mpsc::channel(64);
    orchestrator.run_turn(transcript.messages(), tx).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        transcript.apply(&event);
        events.push(event);
    }
    events
}

#[tokio::test]
async fn weather_question_runs_the_tool_and_answers() {
    let openai = MockServer::start().await;
    let weather = MockServer::start().await;
    mount_weather(&weather).await;

    // Once the history carries a tool result, the model answers in prose.
    // Mounted first so it wins over the catch-all below.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(json!({
            "role": "assistant",
            "content": "It's 18 degrees and cloudy in London."
        }))))
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_w1",
                "type": "function",
                "function": {"name": "displayWeather", "arguments": "{\"city\":\"London\"}"}
            }]
        }))))
        .mount(&openai)
        .await;

    let orchestrator = orchestrator_for(&openai, &weather);
    let mut transcript = Transcript::new();
    transcript.push_user("What's the weather in London?");

    let events = run_turn(&orchestrator, &mut transcript).await;

    assert!(matches!(&events[0], TurnEvent::ToolCall { call: Ok(ToolCall::Weather(_)), .. }));
    let TurnEvent::ToolResult { outcome, .. } = &events[1] else {
        panic!("expected a tool result, got {:?}", events[1]);
    };
    let Ok(ToolOutput::Weather(outcome)) = outcome else {
        panic!("expected a weather outcome");
    };
    assert_eq!(outcome.as_report().unwrap().temperature, 18);
    assert_eq!(
        events[2],
        TurnEvent::TextDelta("It's 18 degrees and cloudy in London.".to_string())
    );
    assert_eq!(events.last(), Some(&TurnEvent::Finished(FinishReason::Stop)));

    // The transcript folded the whole exchange into one assistant message.
    let messages = transcript.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].invocations().count(), 1);
    assert!(messages[1].text().contains("cloudy"));
}

#[tokio::test]
async fn confirmation_suspends_and_resumes_with_the_users_answer() {
    let openai = MockServer::start().await;
    let weather = MockServer::start().await;

    // Turn two: the history now contains the literal answer phrase.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Yes, confirmed."))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(json!({
            "role": "assistant",
            "content": "Initiating. Goodbye, cruel world."
        }))))
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_c1",
                "type": "function",
                "function": {
                    "name": "askForConfirmation",
                    "arguments": "{\"message\":\"Are you sure you want to self-destruct?\"}"
                }
            }]
        }))))
        .mount(&openai)
        .await;

    let orchestrator = orchestrator_for(&openai, &weather);
    let mut transcript = Transcript::new();
    transcript.push_user("Please self-destruct");

    let events = run_turn(&orchestrator, &mut transcript).await;
    assert_eq!(
        events.last(),
        Some(&TurnEvent::Finished(FinishReason::ToolCalls))
    );
    assert!(!events
        .iter()
        .any(|event| matches!(event, TurnEvent::ToolResult { .. })));

    let pending = transcript.pending_confirmations();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].1, "Are you sure you want to self-destruct?");

    // The user says yes; the continuation turn sees the resolved result.
    assert!(transcript.resolve_confirmation(&pending[0].0, ConfirmationAnswer::Confirmed));
    let events = run_turn(&orchestrator, &mut transcript).await;

    assert_eq!(
        events,
        vec![
            TurnEvent::TextDelta("Initiating. Goodbye, cruel world.".to_string()),
            TurnEvent::Finished(FinishReason::Stop),
        ]
    );
    assert!(transcript.pending_confirmations().is_empty());
}

#[tokio::test]
async fn weather_error_reaches_the_model_not_the_turn() {
    let openai = MockServer::start().await;
    let weather = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"cod": "404", "message": "city not found"})),
        )
        .mount(&weather)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Could not find weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(json!({
            "role": "assistant",
            "content": "I couldn't find that city, sorry."
        }))))
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_w2",
                "type": "function",
                "function": {"name": "displayWeather", "arguments": "{\"city\":\"Narnia\"}"}
            }]
        }))))
        .mount(&openai)
        .await;

    let orchestrator = orchestrator_for(&openai, &weather);
    let mut transcript = Transcript::new();
    transcript.push_user("Weather in Narnia?");

    let events = run_turn(&orchestrator, &mut transcript).await;

    // The lookup failed but the tool call itself succeeded, carrying the
    // failure as its payload, and the model got to apologize.
    let TurnEvent::ToolResult { outcome, .. } = &events[1] else {
        panic!("expected a tool result, got {:?}", events[1]);
    };
    let Ok(ToolOutput::Weather(outcome)) = outcome else {
        panic!("expected a weather outcome");
    };
    assert!(outcome.as_error().unwrap().contains("Narnia"));
    assert_eq!(events.last(), Some(&TurnEvent::Finished(FinishReason::Stop)));
}
