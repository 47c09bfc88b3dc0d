use std::path::{
    Path,
    PathBuf,
};
use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::types::{
    GLOBAL_SCOPE,
    Scope,
};

/// Placeholder every prompt template must contain.
pub const PROMPT_TEXT_PLACEHOLDER: &str = "{text}";

/// Default instruction sent to the text generator for auto-fill.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Translate the following user interface text from {source} to {target}.\n\
Keep placeholders such as {{name}}, HTML tags and punctuation unchanged.\n\
Reply with the translated text only.\n\n\
Key: {key}\n\
Text: {text}";

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("Invalid value in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "supportedLocales[0]")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Configuration file is not valid JSONC: {0}")]
    SyntaxError(String),
}

/// Renders a list of validation errors as a numbered list.
pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    pub layered_i18n: I18nSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct I18nSettings {
    /// Directory holding `<locale>.json` and/or `<locale>/<namespace>.json`.
    /// Relative paths are resolved against the workspace root.
    pub bundle_dir: String,

    /// Locale every other locale falls back to. Its bundle must load.
    pub default_locale: String,

    pub supported_locales: Vec<String>,

    pub key_separator: String,

    /// Tenant ids known up front. Tenants owning at least one override are
    /// known as well.
    pub tenants: Vec<String>,

    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub auto_fill: AutoFillConfig,

    /// Directory for the daily-rotated log file. Stderr only when unset.
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    /// Upper bound for a single cache backend call.
    pub timeout_ms: u64,
}

impl CacheConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 24 * 60 * 60, timeout_ms: 250 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Override snapshot file. Relative paths are resolved against the
    /// workspace root.
    pub path: String,
    pub timeout_ms: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: ".layered-i18n/overrides.json".to_string(), timeout_ms: 2_000 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoFillConfig {
    /// Generator command line (program followed by its arguments). The prompt
    /// is written to stdin and the translation read from stdout.
    /// Auto-fill is disabled when empty.
    pub command: Vec<String>,

    /// Timeout for a single generation.
    pub timeout_ms: u64,

    /// Parallel generations.
    /// Default: 80% of CPU cores (minimum 1).
    pub concurrency: Option<usize>,

    /// Supports `{source}`, `{target}`, `{key}` and `{text}`.
    pub prompt_template: String,
}

impl AutoFillConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.command.is_empty()
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(|| (num_cpus::get() * 4 / 5).max(1))
    }
}

impl Default for AutoFillConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_ms: 60_000,
            concurrency: None,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Locale tags are restricted to ASCII letters, digits, `-` and `_`.
fn is_valid_locale(locale: &str) -> bool {
    !locale.is_empty() && locale.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Joins relative paths onto the workspace root.
fn resolve_against(root: Option<&Path>, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path,
    }
}

impl I18nSettings {
    #[must_use]
    pub fn is_supported(&self, locale: &str) -> bool {
        self.supported_locales.iter().any(|l| l == locale)
    }

    #[must_use]
    pub fn is_known_tenant(&self, tenant_id: &str) -> bool {
        self.tenants.iter().any(|t| t == tenant_id)
    }

    #[must_use]
    pub fn bundle_path(&self, workspace_root: Option<&Path>) -> PathBuf {
        resolve_against(workspace_root, &self.bundle_dir)
    }

    #[must_use]
    pub fn store_path(&self, workspace_root: Option<&Path>) -> PathBuf {
        resolve_against(workspace_root, &self.store.path)
    }

    #[must_use]
    pub fn log_path(&self, workspace_root: Option<&Path>) -> Option<PathBuf> {
        self.log_dir.as_deref().map(|dir| resolve_against(workspace_root, dir))
    }

    /// # Errors
    /// - Required field is empty
    /// - Invalid locale tag or tenant id
    /// - Default locale not in supported locales
    /// - Zero timeouts / concurrency
    /// - Prompt template without `{text}`
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.bundle_dir.trim().is_empty() {
            errors.push(ValidationError::new(
                "bundleDir",
                "The bundle directory cannot be empty. Example: \"messages\"",
            ));
        }

        if self.key_separator.is_empty() {
            errors.push(ValidationError::new(
                "keySeparator",
                "The separator cannot be empty. Please specify a separator, for example: \".\" (dot)",
            ));
        }

        if !is_valid_locale(&self.default_locale) {
            errors.push(ValidationError::new(
                "defaultLocale",
                format!(
                    "Invalid locale '{}'. Use letters, digits, '-' or '_' (e.g., \"es\", \"pt-BR\")",
                    self.default_locale
                ),
            ));
        }

        if self.supported_locales.is_empty() {
            errors.push(ValidationError::new(
                "supportedLocales",
                "At least one locale is required. Example: [\"es\", \"en\"]",
            ));
        }

        for (index, locale) in self.supported_locales.iter().enumerate() {
            if !is_valid_locale(locale) {
                errors.push(ValidationError::new(
                    format!("supportedLocales[{index}]"),
                    format!("Invalid locale '{locale}'. Use letters, digits, '-' or '_'"),
                ));
            } else if self.supported_locales.iter().take(index).any(|l| l == locale) {
                errors.push(ValidationError::new(
                    format!("supportedLocales[{index}]"),
                    format!("Locale '{locale}' is listed more than once"),
                ));
            }
        }

        if !self.supported_locales.is_empty() && !self.is_supported(&self.default_locale) {
            errors.push(ValidationError::new(
                "supportedLocales/defaultLocale",
                format!("'supportedLocales' must contain the default locale '{}'", self.default_locale),
            ));
        }

        for (index, tenant) in self.tenants.iter().enumerate() {
            match tenant.parse::<Scope>() {
                Ok(Scope::Tenant(id)) if id == *tenant => {}
                Ok(Scope::Global) => errors.push(ValidationError::new(
                    format!("tenants[{index}]"),
                    format!("'{GLOBAL_SCOPE}' is reserved and cannot be used as a tenant id"),
                )),
                _ => errors.push(ValidationError::new(
                    format!("tenants[{index}]"),
                    format!("Invalid tenant id '{tenant}': must be non-empty and contain no whitespace"),
                )),
            }
        }

        if self.cache.timeout_ms == 0 {
            errors.push(ValidationError::new("cache.timeoutMs", "The timeout must be greater than 0"));
        }

        if self.store.path.trim().is_empty() {
            errors.push(ValidationError::new("store.path", "The store path cannot be empty"));
        }

        if self.store.timeout_ms == 0 {
            errors.push(ValidationError::new("store.timeoutMs", "The timeout must be greater than 0"));
        }

        if self.auto_fill.command.first().is_some_and(|program| program.trim().is_empty()) {
            errors.push(ValidationError::new("autoFill.command[0]", "The program cannot be empty"));
        }

        if self.auto_fill.timeout_ms == 0 {
            errors.push(ValidationError::new("autoFill.timeoutMs", "The timeout must be greater than 0"));
        }

        if self.auto_fill.concurrency == Some(0) {
            errors.push(ValidationError::new(
                "autoFill.concurrency",
                "The concurrency must be at least 1, or remove this field",
            ));
        }

        if !self.auto_fill.prompt_template.contains(PROMPT_TEXT_PLACEHOLDER) {
            errors.push(ValidationError::new(
                "autoFill.promptTemplate",
                format!("The prompt template must contain the {PROMPT_TEXT_PLACEHOLDER} placeholder"),
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl Default for I18nSettings {
    fn default() -> Self {
        Self {
            bundle_dir: "messages".to_string(),
            default_locale: "es".to_string(),
            supported_locales: vec!["es".to_string(), "en".to_string()],
            key_separator: ".".to_string(),
            tenants: Vec::new(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            auto_fill: AutoFillConfig::default(),
            log_dir: None,
        }
    }
}
