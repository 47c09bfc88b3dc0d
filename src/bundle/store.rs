//! Per-locale bundle snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::loader::BundleLoader;
use super::types::{
    BundleError,
    FlatBundle,
};

/// Load state of one supported locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleState {
    Ready(Arc<FlatBundle>),
    /// No bundle file; requests fall back to the default locale.
    Missing,
    /// Malformed or unreadable; the locale stops serving.
    Broken(BundleError),
}

impl LocaleState {
    /// Loads `locale` and logs the outcome.
    #[must_use]
    pub fn load(loader: &BundleLoader, locale: &str) -> Self {
        match loader.load(locale) {
            Ok(bundle) => Self::Ready(Arc::new(bundle)),
            Err(e) if e.is_missing() => {
                tracing::warn!(locale = %locale, "No bundle for locale, falling back to the default locale");
                Self::Missing
            }
            Err(e) => {
                tracing::error!(locale = %locale, error = %e, "Bundle is unusable, locale stops serving");
                Self::Broken(e)
            }
        }
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Immutable snapshot of every supported locale's bundle.
///
/// The default locale is always `Ready`.
#[derive(Debug, Clone)]
pub struct BundleStore {
    /// Locale every other locale falls back to
    default_locale: String,
    /// Bundle of the default locale
    default_bundle: Arc<FlatBundle>,
    /// State of every supported locale, default included
    locales: BTreeMap<String, LocaleState>,
}

impl BundleStore {
    /// Loads every supported locale.
    ///
    /// # Errors
    /// Fails when the default locale's bundle is missing or malformed.
    pub fn load(
        loader: &BundleLoader,
        default_locale: &str,
        supported_locales: &[String],
    ) -> Result<Self, BundleError> {
        let locales = supported_locales
            .iter()
            .map(|locale| (locale.clone(), LocaleState::load(loader, locale)))
            .collect();

        Self::from_states(default_locale, locales, loader)
    }

    /// Builds a snapshot from already loaded states.
    ///
    /// # Errors
    /// Fails when the default locale is not `Ready`.
    pub fn from_states(
        default_locale: &str,
        locales: BTreeMap<String, LocaleState>,
        loader: &BundleLoader,
    ) -> Result<Self, BundleError> {
        let default_bundle = match locales.get(default_locale) {
            Some(LocaleState::Ready(bundle)) => Arc::clone(bundle),
            Some(LocaleState::Broken(e)) => return Err(e.clone()),
            Some(LocaleState::Missing) | None => {
                return Err(BundleError::Missing {
                    locale: default_locale.to_string(),
                    dir: loader.dir().to_path_buf(),
                });
            }
        };

        Ok(Self { default_locale: default_locale.to_string(), default_bundle, locales })
    }

    /// New snapshot with `reloaded` states replacing the current ones.
    ///
    /// The default locale keeps its previous bundle when its reload failed.
    #[must_use]
    pub fn with_reloaded(&self, reloaded: BTreeMap<String, LocaleState>) -> Self {
        let mut next = self.clone();

        for (locale, state) in reloaded {
            if locale == self.default_locale {
                if let LocaleState::Ready(bundle) = state {
                    next.default_bundle = Arc::clone(&bundle);
                    next.locales.insert(locale, LocaleState::Ready(bundle));
                } else {
                    tracing::error!(
                        locale = %locale,
                        "Default locale bundle failed to reload, keeping the previous version"
                    );
                }
            } else if next.locales.contains_key(&locale) {
                next.locales.insert(locale, state);
            }
        }

        next
    }

    #[must_use]
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    #[must_use]
    pub const fn default_bundle(&self) -> &Arc<FlatBundle> {
        &self.default_bundle
    }

    #[must_use]
    pub fn is_supported(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    #[must_use]
    pub fn state(&self, locale: &str) -> Option<&LocaleState> {
        self.locales.get(locale)
    }

    /// Bundle of `locale`.
    ///
    /// `Ok(None)` means the locale has no bundle of its own and every key
    /// falls through to the default locale.
    ///
    /// # Errors
    /// The locale's bundle is malformed.
    pub fn bundle(&self, locale: &str) -> Result<Option<Arc<FlatBundle>>, BundleError> {
        match self.locales.get(locale) {
            Some(LocaleState::Ready(bundle)) => Ok(Some(Arc::clone(bundle))),
            Some(LocaleState::Broken(e)) => Err(e.clone()),
            Some(LocaleState::Missing) | None => Ok(None),
        }
    }
}

/// Shared, swappable handle to the current [`BundleStore`].
///
/// Readers clone the `Arc` and release the lock immediately.
#[derive(Debug)]
pub struct BundleHandle {
    /// Current snapshot
    current: RwLock<Arc<BundleStore>>,
}

impl BundleHandle {
    #[must_use]
    pub fn new(store: BundleStore) -> Self {
        Self { current: RwLock::new(Arc::new(store)) }
    }

    pub async fn snapshot(&self) -> Arc<BundleStore> {
        Arc::clone(&*self.current.read().await)
    }

    pub async fn replace(&self, store: BundleStore) {
        *self.current.write().await = Arc::new(store);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use googletest::prelude::*;
    use rstest::*;
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn bundle_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("es.json"), r#"{"common": {"save": "Guardar"}}"#).unwrap();
        fs::write(dir.path().join("en.json"), r#"{"common": {"save": "Save"}}"#).unwrap();
        fs::write(dir.path().join("de.json"), r#"{"a": "x", "a": {"b": "y"}}"#).unwrap();
        dir
    }

    fn locales(list: &[&str]) -> Vec<String> {
        list.iter().map(|l| (*l).to_string()).collect()
    }

    #[rstest]
    fn test_load_supported_locales(bundle_dir: TempDir) {
        let loader = BundleLoader::new(bundle_dir.path(), ".");

        let store = BundleStore::load(&loader, "es", &locales(&["es", "en", "fr", "de"])).unwrap();

        let en = store.bundle("en").unwrap().unwrap();

        assert_that!(store.default_bundle().get("common.save"), some(eq("Guardar")));
        assert_that!(en.get("common.save"), some(eq("Save")));
        // 未配置のロケールはデフォルトにフォールバック
        assert!(matches!(store.bundle("fr"), Ok(None)));
        // 壊れたロケールはエラー
        assert!(matches!(store.bundle("de"), Err(BundleError::Malformed { .. })));
        assert_that!(store.is_supported("it"), eq(false));
    }

    #[rstest]
    fn test_missing_default_locale_is_fatal(bundle_dir: TempDir) {
        let loader = BundleLoader::new(bundle_dir.path(), ".");

        let result = BundleStore::load(&loader, "fr", &locales(&["fr", "es"]));

        assert!(result.is_err_and(|e| e.is_missing()));
    }

    #[rstest]
    fn test_malformed_default_locale_is_fatal(bundle_dir: TempDir) {
        let loader = BundleLoader::new(bundle_dir.path(), ".");

        let result = BundleStore::load(&loader, "de", &locales(&["de", "es"]));

        assert!(matches!(result, Err(BundleError::Malformed { .. })));
    }

    #[rstest]
    fn test_reload_keeps_default_when_broken(bundle_dir: TempDir) {
        let loader = BundleLoader::new(bundle_dir.path(), ".");
        let store = BundleStore::load(&loader, "es", &locales(&["es", "en"])).unwrap();

        fs::write(bundle_dir.path().join("es.json"), r#"{"x": "1", "x": "2"}"#).unwrap();
        fs::write(bundle_dir.path().join("en.json"), r#"{"common": {"save": "Store"}}"#).unwrap();
        let reloaded: BTreeMap<String, LocaleState> = ["es", "en"]
            .iter()
            .map(|l| ((*l).to_string(), LocaleState::load(&loader, l)))
            .collect();

        let next = store.with_reloaded(reloaded);
        let en = next.bundle("en").unwrap().unwrap();

        assert_that!(next.default_bundle().get("common.save"), some(eq("Guardar")));
        assert_that!(en.get("common.save"), some(eq("Store")));
    }

    #[rstest]
    #[tokio::test]
    async fn test_handle_swaps_snapshot(bundle_dir: TempDir) {
        let dir = bundle_dir;
        let loader = BundleLoader::new(dir.path(), ".");
        let handle =
            BundleHandle::new(BundleStore::load(&loader, "es", &locales(&["es"])).unwrap());
        let before = handle.snapshot().await;

        fs::write(dir.path().join("es.json"), r#"{"common": {"save": "Salvar"}}"#).unwrap();
        handle.replace(BundleStore::load(&loader, "es", &locales(&["es"])).unwrap()).await;
        let after = handle.snapshot().await;

        assert_eq!(before.default_bundle().get("common.save"), Some("Guardar"));
        assert_eq!(after.default_bundle().get("common.save"), Some("Salvar"));
    }
}
