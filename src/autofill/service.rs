//! Auto-fill batch: one generator call and one GLOBAL override per missing key.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::StreamExt as _;
use serde::Serialize;

use super::generator::TextGenerator;
use crate::cache::CacheLayer;
use crate::overrides::{
    OverrideOrigin,
    OverrideStore,
    OverrideWrite,
};
use crate::resolver::ResolvedTree;
use crate::types::{
    CancelToken,
    Scope,
    Tier,
};

/// `updated_by` of auto-filled overrides.
pub const AUTO_FILL_ACTOR: &str = "auto-fill";

/// A key that could not be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFailure {
    pub key: String,
    pub reason: String,
}

/// Result of one fill batch. Keys are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillReport {
    pub filled: Vec<String>,
    /// Already present natively in the target locale
    pub skipped: Vec<String>,
    pub failed: Vec<KeyFailure>,
    /// Keys not attempted because the batch was cancelled
    pub not_attempted: Vec<String>,
    pub cancelled: bool,
}

/// Inputs of one fill batch.
#[derive(Debug, Clone, Copy)]
pub struct FillRequest<'a> {
    pub source_locale: &'a str,
    pub target_locale: &'a str,
    /// GLOBAL resolution of the source locale
    pub source: &'a ResolvedTree,
    /// GLOBAL resolution of the target locale
    pub target: &'a ResolvedTree,
    pub keys: &'a [String],
}

/// Placeholder values of a prompt template.
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub key: &'a str,
    pub text: &'a str,
}

impl PromptVars<'_> {
    /// Value of a `{name}` placeholder.
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "source" => Some(self.source),
            "target" => Some(self.target),
            "key" => Some(self.key),
            "text" => Some(self.text),
            _ => None,
        }
    }
}

/// Substitutes placeholders in a single pass.
///
/// Substituted values are never rescanned, `{{` and `}}` are literal braces
/// and unknown placeholders are kept as written.
#[must_use]
pub fn render_prompt(template: &str, vars: &PromptVars<'_>) -> String {
    let mut out = String::with_capacity(template.len() + vars.text.len());
    let mut rest = template;

    while let Some(start) = rest.find(['{', '}']) {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if let Some((value, after)) = placeholder(tail, vars) {
            out.push_str(value);
            rest = after;
        } else {
            let (brace, after) = tail.split_at(1);
            out.push_str(brace);
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

/// Known `{name}` at the start of `tail`: its value and the text after it.
fn placeholder<'a>(tail: &'a str, vars: &'a PromptVars<'a>) -> Option<(&'a str, &'a str)> {
    let (name, after) = tail.strip_prefix('{')?.split_once('}')?;
    vars.get(name).map(|value| (value, after))
}

/// Outcome of one key.
#[derive(Debug)]
enum KeyResult {
    /// Written as a GLOBAL override
    Filled(String),
    /// Present natively in the target locale
    Skipped(String),
    /// Failed with a reason
    Failed(KeyFailure),
    /// The write timed out and may still land
    Unsettled(KeyFailure),
    /// Batch cancelled before the key was attempted
    NotAttempted(String),
}

/// Fills missing keys through the text generator.
#[derive(Debug)]
pub struct AutoFillService {
    /// External collaborator
    generator: Arc<dyn TextGenerator>,
    /// Target of the GLOBAL writes
    store: Arc<dyn OverrideStore>,
    /// Invalidated once the batch completes
    cache: Arc<CacheLayer>,
    /// Rendered per key by `render_prompt`
    prompt_template: String,
    /// Generator calls in flight
    concurrency: usize,
}

impl AutoFillService {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn OverrideStore>,
        cache: Arc<CacheLayer>,
        prompt_template: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            generator,
            store,
            cache,
            prompt_template: prompt_template.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Fills every requested key that is absent or empty natively in the
    /// target locale. A per-key failure never aborts the batch.
    pub async fn fill(&self, request: &FillRequest<'_>, cancel: &CancelToken) -> FillReport {
        let keys: BTreeSet<&str> = request.keys.iter().map(String::as_str).collect();
        tracing::debug!(
            source = %request.source_locale,
            target = %request.target_locale,
            keys = keys.len(),
            "Auto-fill started"
        );

        let pending: Vec<_> = keys.into_iter().map(|key| self.fill_key(request, key, cancel)).collect();
        let results: Vec<KeyResult> = futures::stream::iter(pending)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = FillReport::default();
        let mut unsettled = false;
        for result in results {
            match result {
                KeyResult::Filled(key) => report.filled.push(key),
                KeyResult::Skipped(key) => report.skipped.push(key),
                KeyResult::Failed(failure) => report.failed.push(failure),
                KeyResult::Unsettled(failure) => {
                    unsettled = true;
                    report.failed.push(failure);
                }
                KeyResult::NotAttempted(key) => report.not_attempted.push(key),
            }
        }
        report.filled.sort();
        report.skipped.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        report.not_attempted.sort();
        report.cancelled = cancel.is_cancelled();

        if unsettled {
            self.cache.invalidate_after_unsettled_write(&self.store, request.target_locale, &Scope::Global).await;
        } else {
            self.cache.invalidate_after_write(request.target_locale, &Scope::Global).await;
        }

        tracing::info!(
            source = %request.source_locale,
            target = %request.target_locale,
            filled = report.filled.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Auto-fill finished"
        );
        report
    }

    /// Fills one key.
    async fn fill_key(&self, request: &FillRequest<'_>, key: &str, cancel: &CancelToken) -> KeyResult {
        let failure = |reason: String| {
            tracing::warn!(key = %key, target = %request.target_locale, reason = %reason, "Auto-fill failed for key");
            KeyFailure { key: key.to_string(), reason }
        };
        let fail = |reason: String| KeyResult::Failed(failure(reason));

        if cancel.is_cancelled() {
            return KeyResult::NotAttempted(key.to_string());
        }

        // 既定ロケールからのフォールバック値は「存在する」とみなさない
        let present = request
            .target
            .get(key)
            .is_some_and(|v| v.tier != Tier::DefaultLocaleBundle && !v.value.is_empty());
        if present {
            return KeyResult::Skipped(key.to_string());
        }

        let Some(text) = request.source.value(key).filter(|text| !text.is_empty()) else {
            return fail(format!("no source text in '{}'", request.source_locale));
        };

        let prompt = render_prompt(
            &self.prompt_template,
            &PromptVars { source: request.source_locale, target: request.target_locale, key, text },
        );
        let translated = match self.generator.generate(&prompt).await {
            Ok(translated) => translated,
            Err(e) => return fail(e.to_string()),
        };
        if translated.trim().is_empty() {
            return fail("empty response".to_string());
        }

        let write = OverrideWrite::manual(request.target_locale, Scope::Global, key, translated, AUTO_FILL_ACTOR)
            .with_origin(OverrideOrigin::AutoFill);
        match self.store.upsert(write).await {
            Ok(_) => KeyResult::Filled(key.to_string()),
            Err(e) if e.outcome_unknown() => KeyResult::Unsettled(failure(e.to_string())),
            Err(e) => fail(e.to_string()),
        }
    }
}
