use std::env;

use anyhow::{Context, Result};

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const HOST_ENV: &str = "OPENAI_HOST";
const MODEL_ENV: &str = "OPENAI_MODEL";

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<K: Into<String>, M: Into<String>>(api_key: K, model: M) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Read the config from the environment. Unlike the weather key, the
    /// model key is required: without it there is no conversation at all.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var(API_KEY_ENV)
            .with_context(|| format!("{} must be set to talk to the model", API_KEY_ENV))?;
        let mut config = Self::new(api_key, OPENAI_DEFAULT_MODEL);

        if let Ok(host) = env::var(HOST_ENV) {
            config.host = host;
        }
        if let Ok(model) = env::var(MODEL_ENV) {
            config.model = model;
        }

        Ok(config)
    }
}
