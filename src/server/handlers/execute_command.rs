//! Execute Command ハンドラー
//!
//! `workspace/executeCommand` で受けたコマンドをエンジンの操作に振り分けます。
//! 引数は `arguments[0]` の JSON オブジェクト 1 つです。

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_lsp::jsonrpc::{
    Error,
    ErrorCode,
    Result,
};
use tower_lsp::lsp_types::ExecuteCommandParams;

use super::super::backend::Backend;
use crate::engine::EngineError;
use crate::inspect::EntryFilter;
use crate::types::Scope;

/// Commands advertised in the server capabilities.
pub const COMMANDS: &[&str] = &[
    "i18n.resolve",
    "i18n.applyOverrides",
    "i18n.deleteOverride",
    "i18n.debug",
    "i18n.stats",
    "i18n.listEntries",
    "i18n.autoFill",
    "i18n.seedMissing",
    "i18n.forceFullResync",
    "i18n.cancelBatches",
];

/// `i18n.resolve`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveArgs {
    /// Requested locale
    locale: String,
    /// GLOBAL when omitted
    scope: Option<Scope>,
    /// Return the nested JSON form
    #[serde(default)]
    nested: bool,
}

/// `i18n.applyOverrides`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyOverridesArgs {
    /// Target locale
    locale: String,
    /// Target scope
    scope: Scope,
    /// Flat key -> value
    entries: BTreeMap<String, String>,
    /// Recorded as `updatedBy`
    actor: String,
}

/// `i18n.deleteOverride`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteOverrideArgs {
    /// Target locale
    locale: String,
    /// Target scope
    scope: Scope,
    /// Flat key
    key: String,
    /// Recorded as `updatedBy`
    actor: String,
}

/// `i18n.debug`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugArgs {
    /// Inspected locale
    locale: String,
    /// Inspected key
    key: String,
    /// Tenant to include; GLOBAL when omitted
    scope: Option<Scope>,
}

/// `i18n.stats`, `i18n.seedMissing`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocaleScopeArgs {
    /// Target locale
    locale: String,
    /// GLOBAL when omitted
    scope: Option<Scope>,
}

/// `i18n.listEntries`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesArgs {
    /// Listed locale
    locale: String,
    /// GLOBAL when omitted
    scope: Option<Scope>,
    /// `namespace` / `search`
    #[serde(flatten)]
    filter: EntryFilter,
}

/// `i18n.autoFill`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoFillArgs {
    /// Locale the text is read from
    source_locale: String,
    /// Locale the overrides are written to
    target_locale: String,
    /// Keys to fill
    keys: Vec<String>,
}

/// `i18n.forceFullResync`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ResyncArgs {
    /// Seed target; GLOBAL when omitted
    scope: Option<Scope>,
}

/// `workspace/executeCommand` リクエストを処理
pub async fn handle_execute_command(
    backend: &Backend,
    params: ExecuteCommandParams,
) -> Result<Option<Value>> {
    tracing::debug!(command = %params.command, "Execute Command request");

    let argument = params.arguments.into_iter().next().unwrap_or(Value::Null);

    if params.command == "i18n.cancelBatches" {
        backend.cancel_batches().await;
        return Ok(None);
    }
    if !COMMANDS.contains(&params.command.as_str()) {
        tracing::warn!("Unknown command: {}", params.command);
        return Ok(None);
    }

    let engine = backend.engine().await?;

    let result = match params.command.as_str() {
        "i18n.resolve" => {
            let args: ResolveArgs = parse_args(argument)?;
            let scope = args.scope.unwrap_or(Scope::Global);
            if args.nested {
                engine.resolve_nested(&args.locale, &scope).await.map_err(engine_error)?
            } else {
                to_json(&engine.resolve(&args.locale, &scope).await.map_err(engine_error)?)?
            }
        }
        "i18n.applyOverrides" => {
            let args: ApplyOverridesArgs = parse_args(argument)?;
            let report = engine
                .apply_overrides(&args.locale, &args.scope, args.entries, &args.actor)
                .await
                .map_err(engine_error)?;
            to_json(&report)?
        }
        "i18n.deleteOverride" => {
            let args: DeleteOverrideArgs = parse_args(argument)?;
            let outcome = engine
                .delete_override(&args.locale, &args.scope, &args.key, &args.actor)
                .await
                .map_err(engine_error)?;
            to_json(&outcome)?
        }
        "i18n.debug" => {
            let args: DebugArgs = parse_args(argument)?;
            let report =
                engine.debug(&args.locale, &args.key, args.scope.as_ref()).await.map_err(engine_error)?;
            to_json(&report)?
        }
        "i18n.stats" => {
            let args: LocaleScopeArgs = parse_args(argument)?;
            let scope = args.scope.unwrap_or(Scope::Global);
            to_json(&engine.stats(&args.locale, &scope).await.map_err(engine_error)?)?
        }
        "i18n.listEntries" => {
            let args: ListEntriesArgs = parse_args(argument)?;
            let scope = args.scope.unwrap_or(Scope::Global);
            let rows = engine.list_entries(&args.locale, &scope, &args.filter).await.map_err(engine_error)?;
            to_json(&rows)?
        }
        "i18n.autoFill" => {
            let args: AutoFillArgs = parse_args(argument)?;
            let cancel = backend.batch_token().await;
            let report = engine
                .auto_fill(&args.source_locale, &args.target_locale, &args.keys, &cancel)
                .await
                .map_err(engine_error)?;
            to_json(&report)?
        }
        "i18n.seedMissing" => {
            let args: LocaleScopeArgs = parse_args(argument)?;
            let scope = args.scope.unwrap_or(Scope::Global);
            let cancel = backend.batch_token().await;
            let report = engine.seed_missing(&args.locale, &scope, &cancel).await.map_err(engine_error)?;
            to_json(&report)?
        }
        "i18n.forceFullResync" => {
            let args: ResyncArgs = if argument.is_null() { ResyncArgs::default() } else { parse_args(argument)? };
            let scope = args.scope.unwrap_or(Scope::Global);
            let cancel = backend.batch_token().await;
            to_json(&engine.force_full_resync(&scope, &cancel).await)?
        }
        _ => return Ok(None),
    };

    Ok(Some(result))
}

/// `arguments[0]` をコマンド引数として読む
fn parse_args<T: DeserializeOwned>(argument: Value) -> Result<T> {
    serde_json::from_value(argument).map_err(|e| Error {
        code: ErrorCode::InvalidParams,
        message: format!("Invalid command arguments: {e}").into(),
        data: None,
    })
}

/// Serializes a command result.
fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error {
        code: ErrorCode::InternalError,
        message: format!("Failed to serialize result: {e}").into(),
        data: None,
    })
}

/// Validation problems become `InvalidParams` with the field list as data,
/// everything else `InternalError`.
#[allow(clippy::needless_pass_by_value)]
fn engine_error(error: EngineError) -> Error {
    let code = if error.is_invalid_request() { ErrorCode::InvalidParams } else { ErrorCode::InternalError };
    let data = match &error {
        EngineError::Validation(errors) => serde_json::to_value(errors).ok(),
        _ => None,
    };
    Error { code, message: error.to_string().into(), data }
}
