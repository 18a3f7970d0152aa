use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::ToolSpec;
use crate::providers::base::{ChatProvider, Completion};

/// A mock provider that returns pre-configured completions for testing
pub struct MockProvider {
    replies: Arc<Mutex<Vec<Completion>>>,
    /// When set, `complete` fails with this message instead of replying
    failure: Option<String>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of completions
    pub fn new(replies: Vec<Completion>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            failure: None,
        }
    }

    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<Completion> {
        if let Some(message) = &self.failure {
            return Err(anyhow!("{}", message));
        }

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            // Return an empty completion if no more pre-configured replies
            Ok(Completion::default())
        } else {
            Ok(replies.remove(0))
        }
    }
}
