use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Correlates a tool call with its eventual result across messages,
/// streams and clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallId(String);

impl ToolCallId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        ToolCallId(id.into())
    }

    /// Mint a fresh id, for providers that do not supply one.
    pub fn generate() -> Self {
        ToolCallId(format!("call_{}", Uuid::new_v4().simple()))
    }

    /// Replace an empty id with a generated one so correlation never breaks.
    pub fn or_generated(self) -> Self {
        if self.0.is_empty() {
            ToolCallId::generate()
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolCallId {
    fn from(id: &str) -> Self {
        ToolCallId::new(id)
    }
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the parameters the tool accepts
    pub parameters: Value,
}

impl ToolSpec {
    /// Create a new tool spec with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool call exactly as the model issued it, before any validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawToolCall {
    pub id: ToolCallId,
    /// The name of the tool the model asked for
    pub name: String,
    /// The arguments, parsed from the provider's JSON string
    pub arguments: Value,
}

impl RawToolCall {
    pub fn new<I: Into<ToolCallId>, S: Into<String>>(id: I, name: S, arguments: Value) -> Self {
        RawToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}
