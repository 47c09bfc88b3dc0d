//! Engine operations.
//!
//! Reads go cache first; a miss composes bundles and overrides and stores the
//! result. Writes go to the override store and invalidate the affected cache
//! entries once acknowledged. A timed-out write may still land, so it
//! invalidates as well, and again once the store has settled.

use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::error::EngineError;
use crate::autofill::{
    AutoFillService,
    CommandGenerator,
    FillReport,
    FillRequest,
    KeyFailure,
    TextGenerator,
};
use crate::bundle::{
    BundleHandle,
    BundleLoader,
    BundleStore,
};
use crate::cache::{
    CacheBackend,
    CacheLayer,
    MemoryCache,
};
use crate::config::{
    I18nSettings,
    ValidationError,
};
use crate::inspect::{
    DebugReport,
    EntryFilter,
    EntryRow,
    debug_report,
    list_entries,
    namespace_stats,
};
use crate::keys::{
    KeyIndex,
    to_nested,
    validate_key,
};
use crate::overrides::{
    FileOverrideStore,
    OverrideFilter,
    OverrideRecord,
    OverrideStore,
    OverrideWrite,
    TimeoutOverrideStore,
    WriteOutcome,
};
use crate::resolver::{
    ResolveInputs,
    ResolvedTree,
    resolve,
};
use crate::sync::{
    SeedReport,
    SyncEngine,
    SyncReport,
};
use crate::types::{
    CancelToken,
    FlatTree,
    Scope,
};

/// Collaborators plugged into the engine.
#[derive(Debug, Clone)]
pub struct EngineParts {
    pub store: Arc<dyn OverrideStore>,
    pub cache: Arc<dyn CacheBackend>,
    /// `None` disables auto-fill
    pub generator: Option<Arc<dyn TextGenerator>>,
}

/// Result of `apply_overrides`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    /// Entries the store acknowledged
    pub count: usize,
    /// Entries that changed stored state
    pub changed: usize,
    pub failed: Vec<KeyFailure>,
}

#[derive(Debug)]
pub struct TranslationEngine {
    /// Validated settings the engine was built from
    settings: I18nSettings,
    /// Current bundle snapshot
    bundles: Arc<BundleHandle>,
    /// Timeout-bounded override store
    store: Arc<dyn OverrideStore>,
    /// Fail-open cache of resolved trees
    cache: Arc<CacheLayer>,
    /// Seeding and resync
    sync: SyncEngine,
    /// `None` when no generator is configured
    auto_fill: Option<AutoFillService>,
}

impl TranslationEngine {
    /// Validates `settings`, loads every bundle and wires the collaborators.
    ///
    /// # Errors
    /// - Invalid settings
    /// - Missing or malformed default-locale bundle
    pub async fn init(
        settings: I18nSettings,
        workspace_root: Option<&Path>,
        parts: EngineParts,
    ) -> Result<Self, EngineError> {
        settings.validate().map_err(EngineError::Validation)?;

        let loader = BundleLoader::new(settings.bundle_path(workspace_root), settings.key_separator.as_str());
        let bundle_store = {
            let loader = loader.clone();
            let default_locale = settings.default_locale.clone();
            let supported = settings.supported_locales.clone();
            tokio::task::spawn_blocking(move || BundleStore::load(&loader, &default_locale, &supported))
                .await
                .map_err(|e| EngineError::Task(e.to_string()))??
        };
        let bundles = Arc::new(BundleHandle::new(bundle_store));

        let store: Arc<dyn OverrideStore> =
            Arc::new(TimeoutOverrideStore::new(parts.store, settings.store.timeout()));
        let cache = Arc::new(CacheLayer::new(parts.cache, settings.cache.ttl(), settings.cache.timeout()));
        let sync = SyncEngine::new(loader, Arc::clone(&bundles), Arc::clone(&store), Arc::clone(&cache));
        let auto_fill = parts.generator.map(|generator| {
            AutoFillService::new(
                generator,
                Arc::clone(&store),
                Arc::clone(&cache),
                settings.auto_fill.prompt_template.as_str(),
                settings.auto_fill.effective_concurrency(),
            )
        });

        tracing::info!(
            default_locale = %settings.default_locale,
            locales = ?settings.supported_locales,
            auto_fill = auto_fill.is_some(),
            "Translation engine initialized"
        );

        Ok(Self { settings, bundles, store, cache, sync, auto_fill })
    }

    /// Builds the engine with the file-backed store, the in-process cache and,
    /// when configured, the command generator.
    pub async fn open(settings: I18nSettings, workspace_root: Option<&Path>) -> Result<Self, EngineError> {
        settings.validate().map_err(EngineError::Validation)?;

        let store = FileOverrideStore::open(settings.store_path(workspace_root)).await?;
        let generator = CommandGenerator::new(&settings.auto_fill.command, settings.auto_fill.timeout())
            .map(|g| Arc::new(g) as Arc<dyn TextGenerator>);
        let parts = EngineParts { store: Arc::new(store), cache: Arc::new(MemoryCache::new()), generator };

        Self::init(settings, workspace_root, parts).await
    }

    /// Waits for in-flight writes to become durable.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.store.flush().await?;
        tracing::info!("Translation engine shut down");
        Ok(())
    }

    #[must_use]
    pub const fn settings(&self) -> &I18nSettings {
        &self.settings
    }

    /// Bundle fingerprint of `locale`, if it has a bundle of its own.
    pub async fn bundle_version(&self, locale: &str) -> Option<String> {
        let snapshot = self.bundles.snapshot().await;
        snapshot.bundle(locale).ok().flatten().map(|b| b.version.clone())
    }

    /// Flat resolved tree of (locale, scope), served from the cache when
    /// possible.
    ///
    /// Unsupported locales resolve as the default locale; unknown tenants
    /// resolve GLOBAL only.
    ///
    /// # Errors
    /// The locale's bundle is malformed.
    pub async fn resolve(&self, locale: &str, scope: &Scope) -> Result<FlatTree, EngineError> {
        let snapshot = self.bundles.snapshot().await;
        let locale = self.serving_locale(locale);
        // 壊れたロケールはキャッシュがあっても提供しない
        snapshot.bundle(locale)?;
        let scope = self.effective_scope(scope).await;

        if let Some(tree) = self.cache.get(locale, &scope).await {
            return Ok(tree);
        }

        let generation = self.cache.generation();
        let (tree, complete) = self.compose(&snapshot, locale, &scope).await?;
        let flat = tree.to_flat();
        if complete {
            self.cache.set_if_current(locale, &scope, &flat, generation).await;
        }
        Ok(flat)
    }

    /// Nested JSON form of `resolve`.
    pub async fn resolve_nested(&self, locale: &str, scope: &Scope) -> Result<Value, EngineError> {
        let flat = self.resolve(locale, scope).await?;
        Ok(to_nested(&flat, &self.settings.key_separator))
    }

    /// Resolved tree with the winning tier of every key. Bypasses the cache.
    pub async fn resolve_detailed(&self, locale: &str, scope: &Scope) -> Result<ResolvedTree, EngineError> {
        let snapshot = self.bundles.snapshot().await;
        let locale = self.serving_locale(locale);
        let scope = self.effective_scope(scope).await;
        let (tree, _) = self.compose(&snapshot, locale, &scope).await?;
        Ok(tree)
    }

    /// Writes administrator overrides to one (locale, scope).
    ///
    /// The whole batch is validated first: key syntax and leaf/branch
    /// collisions against both bundles, the live overrides of GLOBAL and
    /// `scope`, and the batch itself. Nothing is written if any entry is
    /// invalid.
    pub async fn apply_overrides(
        &self,
        locale: &str,
        scope: &Scope,
        entries: BTreeMap<String, String>,
        actor: &str,
    ) -> Result<ApplyReport, EngineError> {
        let mut errors = self.check_write_target(locale, actor);
        if entries.is_empty() {
            errors.push(ValidationError::new("entries", "At least one entry is required"));
        }
        if errors.is_empty() {
            errors.extend(self.check_new_keys(locale, scope, entries.keys()).await?);
        }
        if !errors.is_empty() {
            return Err(EngineError::Validation(errors));
        }

        let writes: Vec<OverrideWrite> = entries
            .into_iter()
            .map(|(key, value)| OverrideWrite::manual(locale, scope.clone(), key, value, actor))
            .collect();
        let keys: Vec<String> = writes.iter().map(|w| w.key.clone()).collect();
        let results = self.store.bulk_upsert(writes).await;

        let mut report = ApplyReport::default();
        let mut unsettled = false;
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(outcome) => {
                    report.count += 1;
                    if outcome.is_change() {
                        report.changed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(locale = %locale, scope = %scope, key = %key, error = %e, "Override write failed");
                    unsettled |= e.outcome_unknown();
                    report.failed.push(KeyFailure { key, reason: e.to_string() });
                }
            }
        }

        if unsettled {
            self.cache.invalidate_after_unsettled_write(&self.store, locale, scope).await;
        } else if report.changed > 0 {
            self.cache.invalidate_after_write(locale, scope).await;
        }

        tracing::info!(
            locale = %locale,
            scope = %scope,
            actor = %actor,
            count = report.count,
            changed = report.changed,
            failed = report.failed.len(),
            "Overrides applied"
        );
        Ok(report)
    }

    /// Marks an override deleted; resolution falls through to the next tier.
    pub async fn delete_override(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, EngineError> {
        let mut errors = self.check_write_target(locale, actor);
        if let Err(e) = validate_key(key, &self.settings.key_separator) {
            errors.push(ValidationError::new("key", e.to_string()));
        }
        if !errors.is_empty() {
            return Err(EngineError::Validation(errors));
        }

        let outcome = match self.store.mark_deleted(locale, scope, key, actor).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.outcome_unknown() {
                    self.cache.invalidate_after_unsettled_write(&self.store, locale, scope).await;
                }
                return Err(e.into());
            }
        };
        if outcome.is_change() {
            self.cache.invalidate_after_write(locale, scope).await;
        }

        tracing::info!(locale = %locale, scope = %scope, key = %key, actor = %actor, outcome = ?outcome, "Override deleted");
        Ok(outcome)
    }

    /// Provenance of `key` across every tier. Pure read.
    pub async fn debug(&self, locale: &str, key: &str, scope: Option<&Scope>) -> Result<DebugReport, EngineError> {
        let snapshot = self.bundles.snapshot().await;
        let locale = self.serving_locale(locale);
        let scope = scope.cloned().unwrap_or(Scope::Global);

        // 読み込みに失敗したロケールは解決できないので有効値を持たない
        let (locale_bundle, serving) = match snapshot.bundle(locale) {
            Ok(bundle) => (bundle, true),
            Err(e) => {
                tracing::warn!(locale = %locale, error = %e, "Inspecting a locale that is not serving");
                (None, false)
            }
        };
        let rows = self.store.debug_rows(key).await?;

        let in_scope = |s: &Scope| -> Vec<OverrideRecord> {
            rows.iter().filter(|r| r.locale == locale && r.scope == *s).cloned().collect()
        };
        let global = in_scope(&Scope::Global);
        let tenant = if scope.is_global() { Vec::new() } else { in_scope(&scope) };
        let cached = self.cache.contains(locale, &self.effective_scope(&scope).await).await;

        let inputs = ResolveInputs {
            locale_bundle: locale_bundle.as_deref().map(|b| &b.entries),
            default_bundle: &snapshot.default_bundle().entries,
            global_overrides: &global,
            tenant_overrides: &tenant,
        };
        let mut report = debug_report(key, locale, &scope, &inputs, rows, cached);
        if !serving {
            report.active_value = None;
            report.active_tier = None;
        }
        Ok(report)
    }

    /// Key count per namespace of the resolved tree.
    pub async fn stats(&self, locale: &str, scope: &Scope) -> Result<BTreeMap<String, usize>, EngineError> {
        let tree = self.resolve_detailed(locale, scope).await?;
        Ok(namespace_stats(&tree, &self.settings.key_separator))
    }

    /// Resolved leaves with their tier, filtered.
    pub async fn list_entries(
        &self,
        locale: &str,
        scope: &Scope,
        filter: &EntryFilter,
    ) -> Result<Vec<EntryRow>, EngineError> {
        let tree = self.resolve_detailed(locale, scope).await?;
        Ok(list_entries(&tree, filter, &self.settings.key_separator))
    }

    /// Fills keys missing natively in `target_locale` from `source_locale`.
    pub async fn auto_fill(
        &self,
        source_locale: &str,
        target_locale: &str,
        keys: &[String],
        cancel: &CancelToken,
    ) -> Result<FillReport, EngineError> {
        let service = self.auto_fill.as_ref().ok_or(EngineError::AutoFillDisabled)?;

        let mut errors = Vec::new();
        self.check_locale("sourceLocale", source_locale, &mut errors);
        self.check_locale("targetLocale", target_locale, &mut errors);
        if source_locale == target_locale {
            errors.push(ValidationError::new("targetLocale", "Source and target locale must differ"));
        }
        if keys.is_empty() {
            errors.push(ValidationError::new("keys", "At least one key is required"));
        }
        for (i, key) in keys.iter().enumerate() {
            if let Err(e) = validate_key(key, &self.settings.key_separator) {
                errors.push(ValidationError::new(format!("keys[{i}]"), e.to_string()));
            }
        }
        if !errors.is_empty() {
            return Err(EngineError::Validation(errors));
        }

        // 既存の葉や枝とぶつかるキーは書かずに失敗として返す
        let mut index = self.collision_index(target_locale, &Scope::Global).await?;
        let mut fillable = Vec::new();
        let mut colliding = Vec::new();
        for key in keys.iter().collect::<BTreeSet<_>>() {
            if let Some(existing) = index.conflict_for(key) {
                tracing::warn!(key = %key, existing = %existing, target = %target_locale, "Auto-fill key collides");
                colliding.push(KeyFailure { key: key.clone(), reason: collision_reason(key, &existing) });
            } else {
                index.insert(key.as_str());
                fillable.push(key.clone());
            }
        }

        let source = self.resolve_detailed(source_locale, &Scope::Global).await?;
        let target = self.resolve_detailed(target_locale, &Scope::Global).await?;
        let request =
            FillRequest { source_locale, target_locale, source: &source, target: &target, keys: &fillable };

        let mut report = service.fill(&request, cancel).await;
        if !colliding.is_empty() {
            report.failed.extend(colliding);
            report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        }
        Ok(report)
    }

    /// Seeds bundle values of `locale` into `scope` without overwriting.
    pub async fn seed_missing(
        &self,
        locale: &str,
        scope: &Scope,
        cancel: &CancelToken,
    ) -> Result<SeedReport, EngineError> {
        let mut errors = Vec::new();
        self.check_locale("locale", locale, &mut errors);
        if !errors.is_empty() {
            return Err(EngineError::Validation(errors));
        }
        Ok(self.sync.seed_missing(locale, scope, cancel).await?)
    }

    /// Reloads bundles, reconciles seed overrides and clears the cache.
    pub async fn force_full_resync(&self, scope: &Scope, cancel: &CancelToken) -> SyncReport {
        self.sync.force_full_resync(scope, cancel).await
    }

    /// Locale actually served for a request.
    fn serving_locale<'a>(&'a self, locale: &'a str) -> &'a str {
        if self.settings.is_supported(locale) {
            locale
        } else {
            tracing::debug!(locale = %locale, "Unsupported locale, serving the default locale");
            &self.settings.default_locale
        }
    }

    /// Unknown tenants resolve GLOBAL only.
    ///
    /// A tenant is known when configured or when it owns an override.
    async fn effective_scope(&self, scope: &Scope) -> Scope {
        let Some(tenant) = scope.tenant_id() else {
            return Scope::Global;
        };
        if self.settings.is_known_tenant(tenant) {
            return scope.clone();
        }

        match self.store.has_scope(scope).await {
            Ok(true) => scope.clone(),
            Ok(false) => {
                tracing::debug!(scope = %scope, "Unknown tenant, resolving GLOBAL only");
                Scope::Global
            }
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "Could not look up tenant, resolving GLOBAL only");
                Scope::Global
            }
        }
    }

    /// Merges every tier of (locale, scope).
    ///
    /// Override read failures degrade to bundle-only resolution; the second
    /// value is `false` then and the tree must not be cached.
    async fn compose(
        &self,
        snapshot: &BundleStore,
        locale: &str,
        scope: &Scope,
    ) -> Result<(ResolvedTree, bool), EngineError> {
        let locale_bundle = snapshot.bundle(locale)?;
        let (global, global_ok) = self.live_overrides(locale, &Scope::Global).await;
        let (tenant, tenant_ok) = if scope.is_global() {
            (Vec::new(), true)
        } else {
            self.live_overrides(locale, scope).await
        };

        let tree = resolve(&ResolveInputs {
            locale_bundle: locale_bundle.as_deref().map(|b| &b.entries),
            default_bundle: &snapshot.default_bundle().entries,
            global_overrides: &global,
            tenant_overrides: &tenant,
        });
        tracing::debug!(locale = %locale, scope = %scope, keys = tree.len(), "Resolved tree composed");

        Ok((tree, global_ok && tenant_ok))
    }

    /// Live overrides of (locale, scope); empty on store failure.
    async fn live_overrides(&self, locale: &str, scope: &Scope) -> (Vec<OverrideRecord>, bool) {
        match self.store.find_all(&OverrideFilter::for_scope(locale, scope.clone())).await {
            Ok(records) => (records, true),
            Err(e) => {
                tracing::warn!(
                    locale = %locale,
                    scope = %scope,
                    error = %e,
                    "Override store unavailable, resolving from bundles only"
                );
                (Vec::new(), false)
            }
        }
    }

    /// Pushes an error when `locale` is not supported.
    fn check_locale(&self, field: &str, locale: &str, errors: &mut Vec<ValidationError>) {
        if !self.settings.is_supported(locale) {
            errors.push(ValidationError::new(
                field,
                format!("Unsupported locale '{locale}', expected one of {:?}", self.settings.supported_locales),
            ));
        }
    }

    /// Checks locale and actor of a write.
    fn check_write_target(&self, locale: &str, actor: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.check_locale("locale", locale, &mut errors);
        if actor.trim().is_empty() {
            errors.push(ValidationError::new("actor", "Actor cannot be empty"));
        }
        errors
    }

    /// Every key a new override of (locale, scope) must not collide with:
    /// both bundles and the live overrides of GLOBAL and `scope`.
    async fn collision_index(&self, locale: &str, scope: &Scope) -> Result<KeyIndex, EngineError> {
        let snapshot = self.bundles.snapshot().await;

        let mut index = KeyIndex::new(&self.settings.key_separator);
        index.extend(snapshot.default_bundle().entries.keys().cloned());
        if let Some(bundle) = snapshot.bundle(locale)? {
            index.extend(bundle.entries.keys().cloned());
        }
        let mut scopes = vec![Scope::Global];
        if !scope.is_global() {
            scopes.push(scope.clone());
        }
        for s in scopes {
            let records = self.store.find_all(&OverrideFilter::for_scope(locale, s)).await?;
            index.extend(records.into_iter().filter(OverrideRecord::is_effective).map(|r| r.key));
        }
        Ok(index)
    }

    /// Rejects malformed keys and keys colliding with the existing tree of
    /// (locale, scope) or with each other.
    async fn check_new_keys<'a>(
        &self,
        locale: &str,
        scope: &Scope,
        keys: impl Iterator<Item = &'a String>,
    ) -> Result<Vec<ValidationError>, EngineError> {
        let separator = self.settings.key_separator.as_str();
        let mut index = self.collision_index(locale, scope).await?;

        let mut errors = Vec::new();
        for key in keys {
            let field = format!("entries.{key}");
            if let Err(e) = validate_key(key, separator) {
                errors.push(ValidationError::new(field, e.to_string()));
                continue;
            }
            if let Some(existing) = index.conflict_for(key) {
                errors.push(ValidationError::new(field, collision_reason(key, &existing)));
                continue;
            }
            index.insert(key.as_str());
        }
        Ok(errors)
    }
}

/// Message of a leaf/branch collision.
fn collision_reason(key: &str, existing: &str) -> String {
    format!("Key '{key}' collides with existing key '{existing}'")
}
