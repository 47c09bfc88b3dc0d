//! Bundle to override-store reconciliation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::bundle::{
    BundleError,
    BundleHandle,
    BundleLoader,
    LocaleState,
};
use crate::cache::CacheLayer;
use crate::keys::KeyIndex;
use crate::overrides::{
    OverrideFilter,
    OverrideStore,
    OverrideWrite,
    StoreError,
    WriteMode,
    WriteOutcome,
};
use crate::types::{
    CancelToken,
    FlatTree,
    Scope,
};

/// Writes sent to the store per call; cancellation is checked between batches.
const SEED_BATCH_SIZE: usize = 500;

/// Result of `seed_missing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// How a locale's bundle came out of a resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LocaleSyncStatus {
    Ready,
    Missing,
    Broken,
}

/// Per-locale counts of a resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleSyncReport {
    pub locale: String,
    pub status: LocaleSyncStatus,
    /// Bundle fingerprint after reload
    pub version: Option<String>,
    pub error: Option<String>,
    pub bundle_keys: usize,
    /// Colliding paths inside the bundle itself
    pub collisions: Vec<String>,
    /// Colliding paths once live overrides are merged in
    pub merged_collisions: Vec<String>,
    pub inserted: usize,
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl LocaleSyncReport {
    /// Report for a locale that was not seeded.
    fn unseeded(locale: &str, status: LocaleSyncStatus) -> Self {
        Self {
            locale: locale.to_string(),
            status,
            version: None,
            error: None,
            bundle_keys: 0,
            collisions: Vec::new(),
            merged_collisions: Vec::new(),
            inserted: 0,
            refreshed: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Result of `force_full_resync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub scope: Scope,
    pub locales: Vec<LocaleSyncReport>,
    pub cancelled: bool,
}

/// Outcome counts of a run of seed writes.
#[derive(Debug, Clone, Copy, Default)]
struct WriteTally {
    /// New records
    inserted: usize,
    /// Stale seed records brought up to date
    refreshed: usize,
    /// Left alone (already present, customized or unchanged)
    skipped: usize,
    /// Store errors
    failed: usize,
    /// Some failed write timed out and may still land
    unsettled: bool,
    /// Stopped before every batch was written
    cancelled: bool,
}

impl WriteTally {
    /// Counts one store result.
    fn record(&mut self, result: &Result<WriteOutcome, StoreError>) {
        match result {
            Ok(WriteOutcome::Inserted) => self.inserted += 1,
            Ok(WriteOutcome::Updated) => self.refreshed += 1,
            Ok(WriteOutcome::Unchanged | WriteOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                self.unsettled |= e.outcome_unknown();
            }
        }
    }

    /// Invalidates the cache entries the counted writes may have changed.
    async fn invalidate(&self, cache: &Arc<CacheLayer>, store: &Arc<dyn OverrideStore>, locale: &str, scope: &Scope) {
        if self.unsettled {
            cache.invalidate_after_unsettled_write(store, locale, scope).await;
        } else if self.changed() {
            cache.invalidate_after_write(locale, scope).await;
        }
    }

    /// Whether any stored record changed.
    const fn changed(&self) -> bool {
        self.inserted > 0 || self.refreshed > 0
    }
}

/// Seeds bundle content into the override store and reloads bundles.
#[derive(Debug)]
pub struct SyncEngine {
    /// Reads bundle files on resync
    loader: BundleLoader,
    /// Snapshot swapped by resync
    bundles: Arc<BundleHandle>,
    /// Seed target
    store: Arc<dyn OverrideStore>,
    /// Invalidated after writes
    cache: Arc<CacheLayer>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        loader: BundleLoader,
        bundles: Arc<BundleHandle>,
        store: Arc<dyn OverrideStore>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        Self { loader, bundles, store, cache }
    }

    /// Inserts an override equal to the bundle value for every bundle key of
    /// `locale` that has no record at `scope`. Never overwrites.
    ///
    /// A locale without a bundle of its own seeds nothing.
    pub async fn seed_missing(
        &self,
        locale: &str,
        scope: &Scope,
        cancel: &CancelToken,
    ) -> Result<SeedReport, BundleError> {
        let snapshot = self.bundles.snapshot().await;
        let Some(bundle) = snapshot.bundle(locale)? else {
            tracing::debug!(locale = %locale, "No bundle of its own, nothing to seed");
            return Ok(SeedReport::default());
        };

        let tally = self.write_seeds(locale, scope, &bundle.entries, WriteMode::InsertIfAbsent, cancel).await;
        tally.invalidate(&self.cache, &self.store, locale, scope).await;

        tracing::info!(
            locale = %locale,
            scope = %scope,
            inserted = tally.inserted,
            skipped = tally.skipped,
            failed = tally.failed,
            cancelled = tally.cancelled,
            "Seeding finished"
        );

        Ok(SeedReport {
            inserted: tally.inserted,
            skipped: tally.skipped,
            failed: tally.failed,
            cancelled: tally.cancelled,
        })
    }

    /// Reloads every supported locale, seeds missing keys, refreshes stale
    /// seed-origin overrides and clears the cache.
    ///
    /// Manual and auto-fill overrides are never touched. Readers keep using
    /// the previous snapshot until the reloaded one is swapped in.
    pub async fn force_full_resync(&self, scope: &Scope, cancel: &CancelToken) -> SyncReport {
        let snapshot = self.bundles.snapshot().await;
        let locales: Vec<String> = snapshot.locales().map(str::to_string).collect();

        let mut reloaded = BTreeMap::new();
        let mut reports = Vec::with_capacity(locales.len());
        let mut cancelled = false;

        for locale in locales {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let state = self.reload(&locale).await;
            let report = self.resync_locale(&locale, scope, &state, cancel).await;
            cancelled = cancel.is_cancelled();
            reports.push(report);
            reloaded.insert(locale, state);
            if cancelled {
                break;
            }
        }

        self.bundles.replace(snapshot.with_reloaded(reloaded)).await;
        self.cache.invalidate_all().await;

        tracing::info!(
            scope = %scope,
            locales = reports.len(),
            inserted = reports.iter().map(|r| r.inserted).sum::<usize>(),
            refreshed = reports.iter().map(|r| r.refreshed).sum::<usize>(),
            cancelled,
            "Full resync finished"
        );

        SyncReport { scope: scope.clone(), locales: reports, cancelled }
    }

    /// Reads a locale's bundle files off the async runtime.
    async fn reload(&self, locale: &str) -> LocaleState {
        let loader = self.loader.clone();
        let owned = locale.to_string();
        match tokio::task::spawn_blocking(move || LocaleState::load(&loader, &owned)).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(locale = %locale, error = %e, "Bundle reload task failed");
                LocaleState::Broken(BundleError::Io {
                    path: self.loader.dir().to_path_buf(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Seeds and refreshes one reloaded locale.
    async fn resync_locale(
        &self,
        locale: &str,
        scope: &Scope,
        state: &LocaleState,
        cancel: &CancelToken,
    ) -> LocaleSyncReport {
        let bundle = match state {
            LocaleState::Ready(bundle) => bundle,
            LocaleState::Missing => return LocaleSyncReport::unseeded(locale, LocaleSyncStatus::Missing),
            LocaleState::Broken(e) => {
                let mut report = LocaleSyncReport::unseeded(locale, LocaleSyncStatus::Broken);
                report.error = Some(e.to_string());
                if let BundleError::Malformed { paths, .. } = e {
                    report.collisions.clone_from(paths);
                }
                return report;
            }
        };

        let tally = self.write_seeds(locale, scope, &bundle.entries, WriteMode::RefreshSeed, cancel).await;
        if tally.unsettled {
            tally.invalidate(&self.cache, &self.store, locale, scope).await;
        }
        let merged_collisions = self.merged_collisions(locale, scope, &bundle.entries).await;
        if !merged_collisions.is_empty() {
            tracing::warn!(
                locale = %locale,
                scope = %scope,
                paths = ?merged_collisions,
                "Overrides collide with bundle keys"
            );
        }

        LocaleSyncReport {
            locale: locale.to_string(),
            status: LocaleSyncStatus::Ready,
            version: Some(bundle.version.clone()),
            error: None,
            bundle_keys: bundle.len(),
            collisions: Vec::new(),
            merged_collisions,
            inserted: tally.inserted,
            refreshed: tally.refreshed,
            skipped: tally.skipped,
            failed: tally.failed,
        }
    }

    /// Leaf/branch collisions between the bundle and live overrides of the
    /// GLOBAL and requested scopes.
    async fn merged_collisions(&self, locale: &str, scope: &Scope, entries: &FlatTree) -> Vec<String> {
        let mut index = KeyIndex::new(self.loader.separator());
        index.extend(entries.keys().cloned());

        let mut scopes = vec![Scope::Global];
        if !scope.is_global() {
            scopes.push(scope.clone());
        }
        for s in scopes {
            match self.store.find_all(&OverrideFilter::for_scope(locale, s)).await {
                Ok(records) => {
                    index.extend(records.into_iter().filter(|r| r.is_effective()).map(|r| r.key));
                }
                Err(e) => {
                    tracing::warn!(locale = %locale, error = %e, "Skipping merged collision check");
                    return Vec::new();
                }
            }
        }

        index.leaf_branch_collisions().into_paths()
    }

    /// Writes one seed per bundle entry in batches.
    async fn write_seeds(
        &self,
        locale: &str,
        scope: &Scope,
        entries: &FlatTree,
        mode: WriteMode,
        cancel: &CancelToken,
    ) -> WriteTally {
        let mut tally = WriteTally::default();
        let writes: Vec<OverrideWrite> = entries
            .iter()
            .map(|(key, value)| OverrideWrite::seed(locale, scope.clone(), key.as_str(), value.as_str(), mode))
            .collect();

        for batch in writes.chunks(SEED_BATCH_SIZE) {
            if cancel.is_cancelled() {
                tracing::info!(locale = %locale, scope = %scope, "Seeding cancelled");
                tally.cancelled = true;
                break;
            }
            for result in self.store.bulk_upsert(batch.to_vec()).await {
                if let Err(e) = &result {
                    tracing::warn!(locale = %locale, scope = %scope, error = %e, "Seed write failed");
                }
                tally.record(&result);
            }
        }

        tally
    }
}
