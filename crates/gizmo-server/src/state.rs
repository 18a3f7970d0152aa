use gizmo::providers::configs::OpenAiProviderConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider_config: OpenAiProviderConfig,
    pub max_rounds: usize,
}
