//! LSP Backend 実装

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{
    Mutex,
    RwLock,
};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    DidChangeConfigurationParams,
    ExecuteCommandParams,
    InitializeParams,
    InitializeResult,
    InitializedParams,
    MessageType,
};
use tower_lsp::{
    Client,
    LanguageServer,
};

use super::handlers;
use crate::config::ConfigManager;
use crate::engine::{
    EngineError,
    EngineParts,
    TranslationEngine,
};
use crate::types::CancelToken;

/// LSP Backend
#[derive(Clone)]
pub struct Backend {
    /// LSP クライアント
    pub client: Client,
    /// 設定管理
    pub config_manager: Arc<Mutex<ConfigManager>>,
    /// `initialized` で起動し、設定変更で作り直すエンジン
    pub engine: Arc<RwLock<Option<Arc<TranslationEngine>>>>,
    /// 差し替え用のコラボレーター。`None` ならファイルストアと外部コマンドを使う
    pub parts: Option<EngineParts>,
    /// 実行中のバッチ処理が共有するキャンセルトークン
    pub batch_cancel: Arc<Mutex<CancelToken>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("config_manager", &"<ConfigManager>")
            .field("engine", &"<TranslationEngine>")
            .field("parts", &self.parts)
            .finish_non_exhaustive()
    }
}

impl Backend {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            config_manager: Arc::new(Mutex::new(ConfigManager::new())),
            engine: Arc::new(RwLock::new(None)),
            parts: None,
            batch_cancel: Arc::new(Mutex::new(CancelToken::new())),
        }
    }

    /// Backend whose engine uses `parts` instead of the configured store and
    /// generator.
    #[must_use]
    pub fn with_parts(client: Client, parts: EngineParts) -> Self {
        Self { parts: Some(parts), ..Self::new(client) }
    }

    /// 起動済みのエンジンを取得
    ///
    /// # Errors
    /// エンジンが未初期化の場合
    pub async fn engine(&self) -> Result<Arc<TranslationEngine>> {
        self.engine.read().await.clone().ok_or_else(|| {
            let mut error = tower_lsp::jsonrpc::Error::internal_error();
            error.message = "Translation engine is not initialized".into();
            error
        })
    }

    /// 現在の設定でエンジンを構築
    async fn build_engine(&self) -> std::result::Result<TranslationEngine, EngineError> {
        let (settings, root): (_, Option<PathBuf>) = {
            let config_manager = self.config_manager.lock().await;
            (config_manager.get_settings().clone(), config_manager.workspace_root().cloned())
        };

        match &self.parts {
            Some(parts) => TranslationEngine::init(settings, root.as_deref(), parts.clone()).await,
            None => TranslationEngine::open(settings, root.as_deref()).await,
        }
    }

    /// エンジンを (再) 起動
    ///
    /// 失敗した場合は古いエンジンを残す。
    pub async fn start_engine(&self) -> std::result::Result<(), EngineError> {
        let engine = Arc::new(self.build_engine().await?);

        let previous = self.engine.write().await.replace(engine);
        if let Some(previous) = previous
            && let Err(error) = previous.shutdown().await
        {
            tracing::warn!(%error, "Failed to shut down the previous engine");
        }
        Ok(())
    }

    /// 起動してクライアントに結果を通知
    pub async fn start_engine_and_report(&self) {
        match self.start_engine().await {
            Ok(()) => {
                self.client.log_message(MessageType::INFO, "Translation engine ready").await;
            }
            Err(error) => {
                tracing::error!(%error, "Failed to start the translation engine");
                self.client
                    .log_message(MessageType::ERROR, format!("Failed to start the translation engine: {error}"))
                    .await;
            }
        }
    }

    /// バッチ処理用のトークン
    pub async fn batch_token(&self) -> CancelToken {
        self.batch_cancel.lock().await.clone()
    }

    /// 実行中のバッチをすべてキャンセルし、以降のバッチ用に新しいトークンを用意
    pub async fn cancel_batches(&self) {
        let mut current = self.batch_cancel.lock().await;
        current.cancel();
        *current = CancelToken::new();
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        handlers::lifecycle::handle_initialize(self, params).await
    }

    async fn initialized(&self, params: InitializedParams) {
        handlers::lifecycle::handle_initialized(self, params).await;
    }

    async fn shutdown(&self) -> Result<()> {
        handlers::lifecycle::handle_shutdown(self).await
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        handlers::workspace::handle_did_change_configuration(self, params).await;
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        handlers::execute_command::handle_execute_command(self, params).await
    }
}
