//! 結合テスト用の共通ヘルパー

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_docs_in_private_items)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::time::Duration;

use async_trait::async_trait;
use layered_i18n_server::autofill::{
    GenerateError,
    TextGenerator,
};
use layered_i18n_server::cache::{
    CacheBackend,
    CacheError,
    MemoryCache,
};
use layered_i18n_server::config::I18nSettings;
use layered_i18n_server::engine::{
    EngineParts,
    TranslationEngine,
};
use layered_i18n_server::overrides::{
    MemoryOverrideStore,
    OverrideFilter,
    OverrideRecord,
    OverrideStore,
    OverrideWrite,
    StoreError,
    WriteOutcome,
};
use layered_i18n_server::types::Scope;
use tempfile::TempDir;

pub const ES_BUNDLE: &str = r#"{
  "common": { "save": "Guardar", "cancel": "Cancelar" },
  "admin": { "users": { "title": "Usuarios" } },
  "title": "Inicio"
}"#;

pub const EN_BUNDLE: &str = r#"{
  "common": { "save": "Save", "empty": "" },
  "title": "Home"
}"#;

/// `messages/` 以下にバンドルを置いたワークスペース
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let workspace = Self { dir: TempDir::new().unwrap() };
        std::fs::create_dir_all(workspace.messages()).unwrap();
        workspace.write_bundle("es.json", ES_BUNDLE);
        workspace.write_bundle("en.json", EN_BUNDLE);
        workspace
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn messages(&self) -> std::path::PathBuf {
        self.dir.path().join("messages")
    }

    /// `messages/` からの相対パスにファイルを書く
    pub fn write_bundle(&self, relative: &str, content: &str) {
        let path = self.messages().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn settings(&self) -> I18nSettings {
        I18nSettings { tenants: vec!["tenantA".to_string()], ..I18nSettings::default() }
    }
}

/// 組み立て済みのエンジンと差し替え可能な協調オブジェクト
pub struct Harness {
    pub workspace: Workspace,
    pub engine: TranslationEngine,
    pub store: Arc<MemoryOverrideStore>,
    pub cache: Arc<MemoryCache>,
    pub generator: Arc<DictionaryGenerator>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_workspace(Workspace::new()).await
    }

    pub async fn with_workspace(workspace: Workspace) -> Self {
        let store = Arc::new(MemoryOverrideStore::new());
        let settings = workspace.settings();
        Self::build(workspace, settings, Arc::clone(&store) as Arc<dyn OverrideStore>, store).await
    }

    /// 書き込みが `delay` 遅れて反映され、エンジン側は `timeout_ms` で諦める
    pub async fn with_late_writes(delay: Duration, timeout_ms: u64) -> (Self, Arc<LateStore>) {
        let workspace = Workspace::new();
        let mut settings = workspace.settings();
        settings.store.timeout_ms = timeout_ms;
        let late = Arc::new(LateStore::new(delay));
        let harness =
            Self::build(workspace, settings, Arc::clone(&late) as Arc<dyn OverrideStore>, Arc::clone(&late.inner))
                .await;
        (harness, late)
    }

    async fn build(
        workspace: Workspace,
        settings: I18nSettings,
        engine_store: Arc<dyn OverrideStore>,
        store: Arc<MemoryOverrideStore>,
    ) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let generator = Arc::new(DictionaryGenerator::new(&[("Cancelar", "Cancel"), ("Usuarios", "Users")]));
        let parts = EngineParts {
            store: engine_store,
            cache: Arc::clone(&cache) as Arc<dyn CacheBackend>,
            generator: Some(Arc::clone(&generator) as Arc<dyn TextGenerator>),
        };
        let engine = TranslationEngine::init(settings, Some(workspace.root()), parts).await.unwrap();

        Self { workspace, engine, store, cache, generator }
    }
}

/// 既知の原文だけを訳す生成器。プロンプトの最後の `Text: ` 以降を原文とみなす。
#[derive(Debug, Default)]
pub struct DictionaryGenerator {
    pub pairs: Vec<(String, String)>,
    pub calls: AtomicUsize,
}

impl DictionaryGenerator {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs.iter().map(|(s, t)| ((*s).to_string(), (*t).to_string())).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for DictionaryGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = prompt.rsplit("Text: ").next().unwrap_or_default().trim();
        self.pairs
            .iter()
            .find(|(source, _)| source == text)
            .map(|(_, target)| target.clone())
            .ok_or_else(|| GenerateError::InvalidOutput(format!("no translation for '{text}'")))
    }
}

/// 常に失敗するキャッシュ
#[derive(Debug, Default)]
pub struct DownCache;

#[async_trait]
impl CacheBackend for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: std::time::Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

/// 読み込みだけ失敗するストア
#[derive(Debug, Default)]
pub struct UnreadableStore {
    pub inner: MemoryOverrideStore,
}

#[async_trait]
impl OverrideStore for UnreadableStore {
    async fn upsert(&self, write: OverrideWrite) -> Result<WriteOutcome, StoreError> {
        self.inner.upsert(write).await
    }

    async fn mark_deleted(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.inner.mark_deleted(locale, scope, key, actor).await
    }

    async fn find_all(&self, _filter: &OverrideFilter) -> Result<Vec<OverrideRecord>, StoreError> {
        Err(StoreError::Unavailable("read replica down".to_string()))
    }

    async fn debug_rows(&self, key: &str) -> Result<Vec<OverrideRecord>, StoreError> {
        self.inner.debug_rows(key).await
    }

    async fn has_scope(&self, scope: &Scope) -> Result<bool, StoreError> {
        self.inner.has_scope(scope).await
    }
}

/// 書き込みが `delay` 後に反映されるストア。呼び出し側が待つのをやめても書き込みは続く。
#[derive(Debug)]
pub struct LateStore {
    pub inner: Arc<MemoryOverrideStore>,
    pub delay: Duration,
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl LateStore {
    pub fn new(delay: Duration) -> Self {
        Self { inner: Arc::new(MemoryOverrideStore::new()), delay, in_flight: Arc::default() }
    }
}

#[async_trait]
impl OverrideStore for LateStore {
    async fn upsert(&self, write: OverrideWrite) -> Result<WriteOutcome, StoreError> {
        let (inner, in_flight, delay) = (Arc::clone(&self.inner), Arc::clone(&self.in_flight), self.delay);
        tokio::spawn(async move {
            let _guard = in_flight.lock().await;
            tokio::time::sleep(delay).await;
            inner.upsert(write).await
        })
        .await
        .unwrap()
    }

    async fn mark_deleted(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let (inner, in_flight, delay) = (Arc::clone(&self.inner), Arc::clone(&self.in_flight), self.delay);
        let (locale, scope, key, actor) = (locale.to_string(), scope.clone(), key.to_string(), actor.to_string());
        tokio::spawn(async move {
            let _guard = in_flight.lock().await;
            tokio::time::sleep(delay).await;
            inner.mark_deleted(&locale, &scope, &key, &actor).await
        })
        .await
        .unwrap()
    }

    async fn find_all(&self, filter: &OverrideFilter) -> Result<Vec<OverrideRecord>, StoreError> {
        self.inner.find_all(filter).await
    }

    async fn debug_rows(&self, key: &str) -> Result<Vec<OverrideRecord>, StoreError> {
        self.inner.debug_rows(key).await
    }

    async fn has_scope(&self, scope: &Scope) -> Result<bool, StoreError> {
        self.inner.has_scope(scope).await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.in_flight.lock().await;
        Ok(())
    }
}
