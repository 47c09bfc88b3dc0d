//! Workspace-related handlers.

use tower_lsp::lsp_types::{
    DidChangeConfigurationParams,
    MessageType,
};

use super::super::backend::Backend;
use crate::config::{
    I18nSettings,
    ServerSettings,
};

pub async fn handle_did_change_configuration(
    backend: &Backend,
    params: DidChangeConfigurationParams,
) {
    tracing::info!(settings = %params.settings, "didChangeConfiguration received");

    // `{ "layeredI18n": { ... } }` と設定そのものの両方を受け付ける
    let new_settings = serde_json::from_value::<ServerSettings>(params.settings.clone())
        .map(|wrapped| wrapped.layered_i18n)
        .or_else(|_| serde_json::from_value::<I18nSettings>(params.settings));

    let new_settings = match new_settings {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!(%error, "Ignoring unreadable configuration");
            return;
        }
    };

    let mut config_manager = backend.config_manager.lock().await;
    match config_manager.update_settings(new_settings) {
        Ok(true) => {
            drop(config_manager);
            tracing::info!("configuration updated successfully");
            backend.start_engine_and_report().await;
        }
        Ok(false) => {
            tracing::debug!("configuration unchanged");
        }
        Err(error) => {
            drop(config_manager);
            tracing::error!(%error, "configuration validation error");
            backend
                .client
                .log_message(MessageType::ERROR, format!("Configuration error: {error}"))
                .await;
        }
    }
}
