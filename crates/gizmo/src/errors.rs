use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ways a tool call can fail. These travel inside messages (and over the
/// wire to clients), so they serialize and compare like plain data.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// The tool the failure is attributable to, when one is known.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolError::UnknownTool(name) => Some(name),
            ToolError::InvalidArguments { tool, .. } => Some(tool),
            ToolError::ExecutionFailed(_) => None,
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
