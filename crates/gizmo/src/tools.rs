//! The fixed registry of tools the model can call.
//!
//! The set is closed on purpose: calls and outputs are enums, so every
//! consumer (orchestrator, CLI renderer, server protocol) can match
//! exhaustively instead of switching on strings. `askForConfirmation` has no
//! execution here at all; answering it is the client's job, which the
//! [`Dispatch`] type makes impossible to forget.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{RawToolCall, ToolSpec};
use crate::weather::{WeatherClient, WeatherOutcome};

pub const WEATHER_TOOL: &str = "displayWeather";
pub const THEME_TOOL: &str = "displayThemeChanger";
pub const CONFIRMATION_TOOL: &str = "askForConfirmation";
pub const SELF_DESTRUCT_TOOL: &str = "selfDestruct";

pub const SELF_DESTRUCT_WARNING: &str = "WARNING: Self-destruct sequence initiated.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherArgs {
    /// The city name (e.g. "London" or "Bogota")
    pub city: String,
    /// The country code (e.g. "UK" or "CO")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    /// The question shown to the user
    pub message: String,
}

/// A validated request against one of the built-in tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolCall {
    Weather(WeatherArgs),
    ThemePicker,
    Confirmation(ConfirmationRequest),
    SelfDestruct,
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Weather(_) => WEATHER_TOOL,
            ToolCall::ThemePicker => THEME_TOOL,
            ToolCall::Confirmation(_) => CONFIRMATION_TOOL,
            ToolCall::SelfDestruct => SELF_DESTRUCT_TOOL,
        }
    }

    /// The arguments as the JSON object the model originally filled in.
    pub fn arguments(&self) -> Value {
        match self {
            ToolCall::Weather(args) => serde_json::to_value(args).unwrap_or_default(),
            ToolCall::Confirmation(request) => serde_json::to_value(request).unwrap_or_default(),
            ToolCall::ThemePicker | ToolCall::SelfDestruct => json!({}),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    Light,
    Dark,
    System,
    Forest,
    Ocean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeOption {
    pub name: String,
    pub value: ThemeId,
}

/// The theme choices offered to the user, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeList {
    pub themes: Vec<ThemeOption>,
}

impl ThemeList {
    pub fn builtin() -> Self {
        let themes = [
            ("Light", ThemeId::Light),
            ("Dark", ThemeId::Dark),
            ("System", ThemeId::System),
            ("Forest", ThemeId::Forest),
            ("Ocean", ThemeId::Ocean),
        ];

        ThemeList {
            themes: themes
                .into_iter()
                .map(|(name, value)| ThemeOption {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }
}

/// The user's answer to a confirmation. Serializes as the exact phrase the
/// model is shown, so "what the model saw" and "what the log stores" agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationAnswer {
    #[serde(rename = "Yes, confirmed.")]
    Confirmed,
    #[serde(rename = "No, denied.")]
    Denied,
}

impl ConfirmationAnswer {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmationAnswer::Confirmed => "Yes, confirmed.",
            ConfirmationAnswer::Denied => "No, denied.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestructNotice {
    pub message: String,
}

impl DestructNotice {
    pub fn armed() -> Self {
        DestructNotice {
            message: SELF_DESTRUCT_WARNING.to_string(),
        }
    }
}

/// What a resolved tool call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolOutput {
    Weather(WeatherOutcome),
    Themes(ThemeList),
    Confirmation(ConfirmationAnswer),
    SelfDestruct(DestructNotice),
}

impl ToolOutput {
    /// The JSON a model (or a useChat client) sees as the tool result.
    /// Note this is flatter than the enum's own serde form: each tool has
    /// the result shape its renderer expects, with no variant tag.
    pub fn to_wire(&self) -> Value {
        match self {
            ToolOutput::Weather(outcome) => serde_json::to_value(outcome).unwrap_or_default(),
            ToolOutput::Themes(list) => serde_json::to_value(list).unwrap_or_default(),
            ToolOutput::Confirmation(answer) => Value::String(answer.as_str().to_string()),
            ToolOutput::SelfDestruct(notice) => serde_json::to_value(notice).unwrap_or_default(),
        }
    }
}

/// How the registry answered a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Executed here; the outcome goes straight back into the turn.
    Completed(ToolResult<ToolOutput>),
    /// Only the user can resolve this; the turn must end and leave it open.
    AwaitsUser(ConfirmationRequest),
}

/// Validate a raw model call against the registry.
///
/// This is pure and needs no execution state, so history reconstruction can
/// use it without building a [`Toolbox`].
pub fn parse_call(raw: &RawToolCall) -> ToolResult<ToolCall> {
    match raw.name.as_str() {
        WEATHER_TOOL => {
            let args: WeatherArgs = serde_json::from_value(raw.arguments.clone()).map_err(|e| {
                ToolError::InvalidArguments {
                    tool: WEATHER_TOOL.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if args.city.trim().is_empty() {
                return Err(ToolError::InvalidArguments {
                    tool: WEATHER_TOOL.to_string(),
                    reason: "city must not be empty".to_string(),
                });
            }
            Ok(ToolCall::Weather(args))
        }
        THEME_TOOL => Ok(ToolCall::ThemePicker),
        CONFIRMATION_TOOL => {
            let request: ConfirmationRequest =
                serde_json::from_value(raw.arguments.clone()).map_err(|e| {
                    ToolError::InvalidArguments {
                        tool: CONFIRMATION_TOOL.to_string(),
                        reason: e.to_string(),
                    }
                })?;
            Ok(ToolCall::Confirmation(request))
        }
        SELF_DESTRUCT_TOOL => Ok(ToolCall::SelfDestruct),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

pub struct Toolbox {
    weather: WeatherClient,
    specs: Vec<ToolSpec>,
}

impl Toolbox {
    pub fn new(weather: WeatherClient) -> Self {
        Toolbox {
            weather,
            specs: builtin_specs(),
        }
    }

    pub fn from_env() -> reqwest::Result<Self> {
        Ok(Toolbox::new(WeatherClient::from_env()?))
    }

    /// The tool manifest advertised to the model.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn parse(&self, raw: &RawToolCall) -> ToolResult<ToolCall> {
        parse_call(raw)
    }

    /// Run a validated call, or report that it is the user's to answer.
    pub async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        match call {
            ToolCall::Weather(args) => {
                let outcome = self.weather.lookup(&args.city, args.country.as_deref()).await;
                Dispatch::Completed(Ok(ToolOutput::Weather(outcome)))
            }
            ToolCall::ThemePicker => {
                Dispatch::Completed(Ok(ToolOutput::Themes(ThemeList::builtin())))
            }
            ToolCall::Confirmation(request) => Dispatch::AwaitsUser(request.clone()),
            ToolCall::SelfDestruct => {
                Dispatch::Completed(Ok(ToolOutput::SelfDestruct(DestructNotice::armed())))
            }
        }
    }
}

fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            WEATHER_TOOL,
            "Get current weather information for a city",
            json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The city name (e.g., \"London\" or \"Bogota\")"
                    },
                    "country": {
                        "type": "string",
                        "description": "The country code (e.g., \"UK\" or \"CO\")"
                    }
                },
                "required": ["city"]
            }),
        ),
        ToolSpec::new(
            THEME_TOOL,
            "Display a theme selector interface that allows users to switch between light, dark, and system color themes",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
        ToolSpec::new(
            CONFIRMATION_TOOL,
            "Ask the user for confirmation.",
            json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to ask for confirmation."
                    }
                },
                "required": ["message"]
            }),
        ),
        ToolSpec::new(
            SELF_DESTRUCT_TOOL,
            "Initiate a fun self-destruct sequence that shows confetti when confirmed, always ask for confirmation first.",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
    ]
}
