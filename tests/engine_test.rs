//! 翻訳エンジンのエンドツーエンドテスト

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::time::Duration;

use common::{
    DownCache,
    Harness,
    UnreadableStore,
    Workspace,
};
use googletest::prelude::*;
use layered_i18n_server::autofill::KeyFailure;
use layered_i18n_server::bundle::BundleError;
use layered_i18n_server::cache::MemoryCache;
use layered_i18n_server::engine::{
    EngineError,
    EngineParts,
    TranslationEngine,
};
use layered_i18n_server::inspect::EntryFilter;
use layered_i18n_server::overrides::{
    OverrideFilter,
    OverrideOrigin,
    OverrideRecord,
    OverrideStore,
    OverrideWrite,
    WriteOutcome,
};
use layered_i18n_server::types::{
    CancelToken,
    Scope,
    Tier,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn tenant_a() -> Scope {
    Scope::tenant("tenantA")
}

#[rstest]
#[tokio::test]
async fn test_tenant_override_does_not_leak_into_global() {
    let harness = Harness::new().await;
    let engine = &harness.engine;

    let global = engine.resolve("es", &Scope::Global).await.unwrap();
    assert_that!(global.get("common.save"), some(eq("Guardar")));

    let report = engine
        .apply_overrides("es", &tenant_a(), entries(&[("common.save", "Guardar cambios")]), "admin")
        .await
        .unwrap();
    assert_eq!(report.count, 1);
    assert_eq!(report.changed, 1);

    let tenant = engine.resolve("es", &tenant_a()).await.unwrap();
    assert_that!(tenant.get("common.save"), some(eq("Guardar cambios")));

    let global = engine.resolve("es", &Scope::Global).await.unwrap();
    assert_that!(global.get("common.save"), some(eq("Guardar")));
}

#[rstest]
#[tokio::test]
async fn test_precedence_follows_tiers() {
    let harness = Harness::new().await;
    let engine = &harness.engine;

    engine.apply_overrides("en", &Scope::Global, entries(&[("common.save", "Save all")]), "admin").await.unwrap();
    engine.apply_overrides("en", &tenant_a(), entries(&[("title", "Dashboard")]), "admin").await.unwrap();

    let tree = engine.resolve_detailed("en", &tenant_a()).await.unwrap();

    let tier_of = |key: &str| tree.get(key).map(|v| v.tier);
    assert_eq!(tier_of("title"), Some(Tier::TenantOverride));
    assert_eq!(tier_of("common.save"), Some(Tier::GlobalOverride));
    assert_eq!(tier_of("common.empty"), Some(Tier::LocaleBundle));
    assert_eq!(tier_of("common.cancel"), Some(Tier::DefaultLocaleBundle));
    assert_that!(tree.value("common.cancel"), some(eq("Cancelar")));
}

#[rstest]
#[tokio::test]
async fn test_empty_override_is_absent() {
    let harness = Harness::new().await;
    let engine = &harness.engine;

    engine.apply_overrides("en", &Scope::Global, entries(&[("common.save", "")]), "admin").await.unwrap();

    let tree = engine.resolve("en", &Scope::Global).await.unwrap();
    assert_that!(tree.get("common.save"), some(eq("Save")));
    // バンドルの空文字は値として扱う
    assert_that!(tree.get("common.empty"), some(eq("")));
}

#[rstest]
#[tokio::test]
async fn test_writes_invalidate_cached_trees() {
    let harness = Harness::new().await;
    let engine = &harness.engine;

    engine.resolve("en", &Scope::Global).await.unwrap();
    engine.resolve("en", &tenant_a()).await.unwrap();
    assert_eq!(harness.cache.len().await, 2);

    engine.apply_overrides("en", &Scope::Global, entries(&[("title", "Start")]), "admin").await.unwrap();

    // GLOBAL への書き込みはロケールの全エントリを無効化する
    assert!(harness.cache.is_empty().await);
    let global = engine.resolve("en", &Scope::Global).await.unwrap();
    let tenant = engine.resolve("en", &tenant_a()).await.unwrap();
    assert_that!(global.get("title"), some(eq("Start")));
    assert_that!(tenant.get("title"), some(eq("Start")));
}

#[rstest]
#[tokio::test]
async fn test_tenant_write_keeps_other_entries_cached() {
    let harness = Harness::new().await;
    let engine = &harness.engine;

    engine.resolve("en", &Scope::Global).await.unwrap();
    engine.resolve("en", &tenant_a()).await.unwrap();

    engine.apply_overrides("en", &tenant_a(), entries(&[("title", "Mine")]), "admin").await.unwrap();

    assert_eq!(harness.cache.len().await, 1);
    let tenant = engine.resolve("en", &tenant_a()).await.unwrap();
    assert_that!(tenant.get("title"), some(eq("Mine")));
}

#[rstest]
#[tokio::test]
async fn test_unchanged_write_keeps_cache() {
    let harness = Harness::new().await;
    let engine = &harness.engine;

    engine.apply_overrides("en", &Scope::Global, entries(&[("title", "Start")]), "admin").await.unwrap();
    engine.resolve("en", &Scope::Global).await.unwrap();

    let report =
        engine.apply_overrides("en", &Scope::Global, entries(&[("title", "Start")]), "admin").await.unwrap();

    assert_eq!(report.changed, 0);
    assert_eq!(harness.cache.len().await, 1);
}

#[rstest]
#[tokio::test]
async fn test_timed_out_write_invalidates_once_it_lands() {
    let (harness, late) = Harness::with_late_writes(Duration::from_millis(200), 20).await;
    let engine = &harness.engine;
    engine.resolve("es", &Scope::Global).await.unwrap();

    let report = engine
        .apply_overrides("es", &Scope::Global, entries(&[("common.save", "Guardar cambios")]), "admin")
        .await
        .unwrap();
    assert_eq!(report.count, 0);
    assert_that!(report.failed, elements_are![field!(KeyFailure.key, eq("common.save"))]);

    // 反映前に組み立てた木が再びキャッシュされる
    let before = engine.resolve("es", &Scope::Global).await.unwrap();
    assert_that!(before.get("common.save"), some(eq("Guardar")));

    late.settle().await.unwrap();
    let visible = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let tree = engine.resolve("es", &Scope::Global).await.unwrap();
            if tree.get("common.save").is_some_and(|v| v == "Guardar cambios") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(visible.is_ok(), "late write never became visible");
}

#[rstest]
#[tokio::test]
async fn test_timed_out_delete_invalidates_once_it_lands() {
    let (harness, late) = Harness::with_late_writes(Duration::from_millis(200), 20).await;
    let engine = &harness.engine;
    harness
        .store
        .upsert(OverrideWrite::manual("es", Scope::Global, "title", "Portada", "admin"))
        .await
        .unwrap();
    assert_that!(engine.resolve("es", &Scope::Global).await.unwrap().get("title"), some(eq("Portada")));

    let result = engine.delete_override("es", &Scope::Global, "title", "admin").await;
    assert!(result.is_err());
    engine.resolve("es", &Scope::Global).await.unwrap();

    late.settle().await.unwrap();
    let visible = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let tree = engine.resolve("es", &Scope::Global).await.unwrap();
            if tree.get("title").is_some_and(|v| v == "Inicio") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(visible.is_ok(), "late delete never became visible");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_and_writes_end_coherent() {
    let Harness { workspace: _workspace, engine, store, .. } = Harness::new().await;
    let engine = Arc::new(engine);
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = [Scope::Global, tenant_a(), Scope::Global, tenant_a()]
        .into_iter()
        .map(|scope| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                while !done.load(Ordering::SeqCst) {
                    engine.resolve("es", &scope).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    let writers: Vec<_> = [("common.save", Scope::Global), ("common.cancel", Scope::Global), ("title", tenant_a())]
        .into_iter()
        .map(|(key, scope)| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for n in 0..25 {
                    let value = format!("{key}-{n}");
                    engine.apply_overrides("es", &scope, entries(&[(key, value.as_str())]), "admin").await.unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.await.unwrap();
    }

    let global = engine.resolve("es", &Scope::Global).await.unwrap();
    let tenant = engine.resolve("es", &tenant_a()).await.unwrap();
    let records = store.find_all(&OverrideFilter::default()).await.unwrap();
    assert_that!(records, len(eq(3)));
    for record in &records {
        let tree = if record.scope.is_global() { &global } else { &tenant };
        assert_that!(tree.get(&record.key), some(eq(&record.value)));
    }
    assert_that!(global.get("common.save"), some(eq("common.save-24")));
    assert_that!(tenant.get("common.cancel"), some(eq("common.cancel-24")));
    assert_that!(tenant.get("title"), some(eq("title-24")));
}

#[rstest]
#[tokio::test]
async fn test_stats_add_up_to_resolved_size() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    engine.apply_overrides("es", &Scope::Global, entries(&[("admin.roles.title", "Roles")]), "admin").await.unwrap();

    let stats = engine.stats("es", &Scope::Global).await.unwrap();
    let tree = engine.resolve("es", &Scope::Global).await.unwrap();

    assert_eq!(stats.values().sum::<usize>(), tree.len());
    assert_eq!(stats.get("admin"), Some(&2));
    assert_eq!(stats.get("common"), Some(&2));
}

#[rstest]
#[tokio::test]
async fn test_seeding_twice_inserts_nothing_new() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    let cancel = CancelToken::new();

    let first = engine.seed_missing("es", &Scope::Global, &cancel).await.unwrap();
    let second = engine.seed_missing("es", &Scope::Global, &cancel).await.unwrap();

    assert_eq!(first.inserted, 4);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 4);
}

#[rstest]
#[tokio::test]
async fn test_seeding_keeps_manual_overrides() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    engine.apply_overrides("es", &Scope::Global, entries(&[("title", "Portada")]), "admin").await.unwrap();

    let report = engine.seed_missing("es", &Scope::Global, &CancelToken::new()).await.unwrap();

    assert_eq!(report.inserted, 3);
    let tree = engine.resolve("es", &Scope::Global).await.unwrap();
    assert_that!(tree.get("title"), some(eq("Portada")));
}

#[rstest]
#[tokio::test]
async fn test_colliding_bundle_stops_serving_the_locale() {
    let workspace = Workspace::new();
    workspace.write_bundle("en.json", r#"{ "a": "x", "a": { "b": "y" } }"#);
    let harness = Harness::with_workspace(workspace).await;

    let result = harness.engine.resolve("en", &Scope::Global).await;

    assert!(matches!(
        &result,
        Err(EngineError::Bundle(BundleError::Malformed { locale, paths }))
            if locale == "en" && paths.contains(&"a".to_string())
    ));
    // 既定ロケールは影響を受けない
    tokio_test::assert_ok!(harness.engine.resolve("es", &Scope::Global).await);
}

#[rstest]
#[tokio::test]
async fn test_colliding_default_bundle_fails_init() {
    let workspace = Workspace::new();
    workspace.write_bundle("es.json", r#"{ "a": "x", "a": { "b": "y" } }"#);
    let parts = EngineParts {
        store: Arc::new(layered_i18n_server::overrides::MemoryOverrideStore::new()),
        cache: Arc::new(MemoryCache::new()),
        generator: None,
    };

    let result = TranslationEngine::init(workspace.settings(), Some(workspace.root()), parts).await;

    assert!(matches!(result, Err(EngineError::Bundle(BundleError::Malformed { .. }))));
}

#[rstest]
#[tokio::test]
async fn test_override_colliding_with_bundle_is_rejected() {
    let harness = Harness::new().await;

    let result = harness
        .engine
        .apply_overrides("es", &Scope::Global, entries(&[("common.save.label", "x"), ("title", "y")]), "admin")
        .await;

    let Err(EngineError::Validation(errors)) = result else {
        panic!("expected validation errors, got {result:?}");
    };
    assert_that!(errors, len(eq(1)));
    assert_that!(errors[0].message, contains_substring("common.save"));
    // 1件でも不正ならバッチ全体を書き込まない
    let rows = harness.engine.debug("es", "title", None).await.unwrap().rows;
    assert_that!(rows, is_empty());
}

#[rstest]
#[tokio::test]
async fn test_invalid_write_reports_every_problem() {
    let harness = Harness::new().await;

    let result = harness.engine.apply_overrides("fr", &Scope::Global, BTreeMap::new(), " ").await;

    assert!(result.as_ref().is_err_and(EngineError::is_invalid_request));
    let Err(EngineError::Validation(errors)) = result else {
        panic!("expected validation errors, got {result:?}");
    };
    let fields: Vec<&str> = errors.iter().map(|e| e.field_path.as_str()).collect();
    assert_eq!(fields, vec!["locale", "actor", "entries"]);
}

#[rstest]
#[tokio::test]
async fn test_deleted_override_falls_through() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    engine.apply_overrides("es", &tenant_a(), entries(&[("title", "Portada")]), "admin").await.unwrap();

    let outcome = engine.delete_override("es", &tenant_a(), "title", "admin").await.unwrap();
    let again = engine.delete_override("es", &tenant_a(), "title", "admin").await.unwrap();

    assert_eq!(outcome, WriteOutcome::Updated);
    assert_eq!(again, WriteOutcome::Unchanged);
    let tree = engine.resolve("es", &tenant_a()).await.unwrap();
    assert_that!(tree.get("title"), some(eq("Inicio")));

    let report = engine.debug("es", "title", Some(&tenant_a())).await.unwrap();
    assert_eq!(report.tenant_override.map(|r| r.deleted), Some(true));
}

#[rstest]
#[tokio::test]
async fn test_debug_reports_every_tier() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    engine.apply_overrides("en", &Scope::Global, entries(&[("common.save", "Save all")]), "admin").await.unwrap();
    engine.resolve("en", &Scope::Global).await.unwrap();

    let report = engine.debug("en", "common.save", None).await.unwrap();

    assert_that!(report.bundle_value, some(eq("Save")));
    assert_that!(report.default_bundle_value, some(eq("Guardar")));
    assert_that!(report.global_override, some(field!(OverrideRecord.value, eq("Save all"))));
    assert_that!(report.active_value, some(eq("Save all")));
    assert_eq!(report.active_tier, Some(Tier::GlobalOverride));
    assert!(report.cached);
}

#[rstest]
#[tokio::test]
async fn test_debug_of_broken_locale_has_no_active_value() {
    let workspace = Workspace::new();
    workspace.write_bundle("en.json", r#"{ "a": "x", "a": { "b": "y" } }"#);
    let harness = Harness::with_workspace(workspace).await;

    let report = harness.engine.debug("en", "common.save", None).await.unwrap();

    assert_that!(report.default_bundle_value, some(eq("Guardar")));
    assert_that!(report.bundle_value, none());
    assert_that!(report.active_value, none());
    assert_eq!(report.active_tier, None);
}

#[rstest]
#[tokio::test]
async fn test_debug_of_unknown_tenant_reports_global_cache() {
    let harness = Harness::new().await;
    let ghost = Scope::tenant("ghost");
    harness.engine.resolve("es", &ghost).await.unwrap();

    let report = harness.engine.debug("es", "title", Some(&ghost)).await.unwrap();

    assert!(report.cached);
    assert_that!(report.active_value, some(eq("Inicio")));
}

#[rstest]
#[tokio::test]
async fn test_list_entries_filters_by_namespace() {
    let harness = Harness::new().await;
    let filter = EntryFilter { namespace: Some("common".to_string()), search: None };

    let rows = harness.engine.list_entries("en", &Scope::Global, &filter).await.unwrap();

    let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["common.cancel", "common.empty", "common.save"]);
}

#[rstest]
#[tokio::test]
async fn test_auto_fill_translates_missing_keys() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    let keys = vec!["common.cancel".to_string(), "common.save".to_string()];

    let report = engine.auto_fill("es", "en", &keys, &CancelToken::new()).await.unwrap();

    assert_eq!(report.filled, vec!["common.cancel".to_string()]);
    assert_eq!(report.skipped, vec!["common.save".to_string()]);
    assert_that!(report.failed, is_empty());
    assert_eq!(harness.generator.calls(), 1);

    let tree = engine.resolve("en", &Scope::Global).await.unwrap();
    assert_that!(tree.get("common.cancel"), some(eq("Cancel")));
    let debug = engine.debug("en", "common.cancel", None).await.unwrap();
    assert_eq!(debug.global_override.map(|r| r.origin), Some(OverrideOrigin::AutoFill));
}

#[rstest]
#[tokio::test]
async fn test_auto_fill_rejects_key_under_a_leaf() {
    let workspace = Workspace::new();
    workspace.write_bundle("en.json", r#"{ "common": "Common", "title": "Home" }"#);
    let harness = Harness::with_workspace(workspace).await;
    let keys = vec!["common.cancel".to_string()];

    let report = harness.engine.auto_fill("es", "en", &keys, &CancelToken::new()).await.unwrap();

    assert_that!(report.filled, is_empty());
    assert_that!(
        report.failed,
        elements_are![all!(
            field!(KeyFailure.key, eq("common.cancel")),
            field!(KeyFailure.reason, contains_substring("collides with existing key 'common'"))
        )]
    );
    assert_eq!(harness.generator.calls(), 0);
    assert!(harness.store.find_all(&OverrideFilter::default()).await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_auto_fill_skips_keys_present_natively() {
    let harness = Harness::new().await;
    let keys = vec!["title".to_string(), "admin.users.title".to_string()];

    let report = harness.engine.auto_fill("es", "en", &keys, &CancelToken::new()).await.unwrap();

    // title は en に存在するためスキップ、admin.users.title は訳せる
    assert_eq!(report.filled, vec!["admin.users.title".to_string()]);
    assert_eq!(report.skipped, vec!["title".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_cancelled_auto_fill_attempts_nothing() {
    let harness = Harness::new().await;
    let cancel = CancelToken::new();
    cancel.cancel();

    let report =
        harness.engine.auto_fill("es", "en", &["common.cancel".to_string()], &cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.not_attempted, vec!["common.cancel".to_string()]);
    assert_eq!(harness.generator.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn test_unknown_tenant_resolves_global() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    engine.apply_overrides("es", &Scope::Global, entries(&[("title", "Portada")]), "admin").await.unwrap();

    let ghost = engine.resolve("es", &Scope::tenant("ghost")).await.unwrap();
    let global = engine.resolve("es", &Scope::Global).await.unwrap();

    assert_eq!(ghost, global);
}

#[rstest]
#[tokio::test]
async fn test_unsupported_locale_serves_default_locale() {
    let harness = Harness::new().await;

    let fr = harness.engine.resolve("fr", &Scope::Global).await.unwrap();

    assert_that!(fr.get("title"), some(eq("Inicio")));
}

#[rstest]
#[tokio::test]
async fn test_resolve_survives_cache_outage() {
    let workspace = Workspace::new();
    let parts = EngineParts {
        store: Arc::new(layered_i18n_server::overrides::MemoryOverrideStore::new()),
        cache: Arc::new(DownCache),
        generator: None,
    };
    let engine = TranslationEngine::init(workspace.settings(), Some(workspace.root()), parts).await.unwrap();

    engine.apply_overrides("es", &Scope::Global, entries(&[("title", "Portada")]), "admin").await.unwrap();
    let tree = engine.resolve("es", &Scope::Global).await.unwrap();

    assert_that!(tree.get("title"), some(eq("Portada")));
}

#[rstest]
#[tokio::test]
async fn test_store_read_failure_falls_back_to_bundles_uncached() {
    let workspace = Workspace::new();
    let cache = Arc::new(MemoryCache::new());
    let parts = EngineParts {
        store: Arc::new(UnreadableStore::default()),
        cache: Arc::clone(&cache) as Arc<dyn layered_i18n_server::cache::CacheBackend>,
        generator: None,
    };
    let engine = TranslationEngine::init(workspace.settings(), Some(workspace.root()), parts).await.unwrap();

    let tree = engine.resolve("en", &Scope::Global).await.unwrap();

    assert_that!(tree.get("common.save"), some(eq("Save")));
    assert!(cache.is_empty().await);
}

#[rstest]
#[tokio::test]
async fn test_auto_fill_without_generator_is_rejected() {
    let workspace = Workspace::new();
    let parts = EngineParts {
        store: Arc::new(layered_i18n_server::overrides::MemoryOverrideStore::new()),
        cache: Arc::new(MemoryCache::new()),
        generator: None,
    };
    let engine = TranslationEngine::init(workspace.settings(), Some(workspace.root()), parts).await.unwrap();

    let result = engine.auto_fill("es", "en", &["title".to_string()], &CancelToken::new()).await;

    assert!(matches!(result, Err(EngineError::AutoFillDisabled)));
}

#[rstest]
#[tokio::test]
async fn test_resync_picks_up_bundle_changes() {
    let harness = Harness::new().await;
    let engine = &harness.engine;
    let cancel = CancelToken::new();
    engine.seed_missing("es", &Scope::Global, &cancel).await.unwrap();
    engine.resolve("es", &Scope::Global).await.unwrap();

    harness.workspace.write_bundle("es.json", &common::ES_BUNDLE.replace("Inicio", "Portada"));
    let report = engine.force_full_resync(&Scope::Global, &cancel).await;

    assert!(!report.cancelled);
    let es = report.locales.iter().find(|l| l.locale == "es").unwrap();
    assert_eq!(es.refreshed, 1);
    assert!(harness.cache.is_empty().await);
    let tree = engine.resolve("es", &Scope::Global).await.unwrap();
    assert_that!(tree.get("title"), some(eq("Portada")));
}

#[rstest]
#[tokio::test]
async fn test_namespace_files_are_prefixed() {
    let workspace = Workspace::new();
    std::fs::remove_file(workspace.messages().join("en.json")).unwrap();
    workspace.write_bundle("en/common.json", r#"{ "save": "Save" }"#);
    workspace.write_bundle("en/admin.json", r#"{ "users": { "title": "Users" } }"#);
    let harness = Harness::with_workspace(workspace).await;

    let tree = harness.engine.resolve("en", &Scope::Global).await.unwrap();

    assert_that!(tree.get("common.save"), some(eq("Save")));
    assert_that!(tree.get("admin.users.title"), some(eq("Users")));
    assert_that!(tree.get("title"), some(eq("Inicio")));
}

#[rstest]
#[tokio::test]
async fn test_nested_resolve_rebuilds_objects() {
    let harness = Harness::new().await;

    let nested = harness.engine.resolve_nested("es", &Scope::Global).await.unwrap();

    assert_eq!(nested["common"]["save"], "Guardar");
    assert_eq!(nested["admin"]["users"]["title"], "Usuarios");
}
