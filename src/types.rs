//! Core types used throughout the project.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

/// Flattened translation tree (e.g., `"common.save"` -> `"Guardar"`).
///
/// Ordered so that serialized trees and reports are deterministic.
pub type FlatTree = BTreeMap<String, String>;

/// Wire name of the platform-wide scope.
pub const GLOBAL_SCOPE: &str = "GLOBAL";

/// Resolution boundary for overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// Platform-wide overrides shared by every tenant.
    Global,
    /// Overrides owned by a single tenant.
    Tenant(String),
}

impl Scope {
    #[must_use]
    pub fn tenant(id: impl Into<String>) -> Self {
        Self::Tenant(id.into())
    }

    #[must_use]
    pub const fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Tenant(id) => Some(id),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => GLOBAL_SCOPE,
            Self::Tenant(id) => id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a scope string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid scope '{0}': expected \"GLOBAL\" or a non-empty tenant id")]
pub struct ScopeParseError(pub String);

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ScopeParseError(s.to_string()));
        }
        if trimmed.eq_ignore_ascii_case(GLOBAL_SCOPE) {
            return Ok(Self::Global);
        }
        Ok(Self::Tenant(trimmed.to_string()))
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Global => GLOBAL_SCOPE.to_string(),
            Scope::Tenant(id) => id,
        }
    }
}

/// Source a resolved value was taken from, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    TenantOverride,
    GlobalOverride,
    LocaleBundle,
    /// Cross-locale fallback to the default locale's bundle.
    DefaultLocaleBundle,
}

impl Tier {
    #[must_use]
    pub const fn is_override(self) -> bool {
        matches!(self, Self::TenantOverride | Self::GlobalOverride)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TenantOverride => "tenant-override",
            Self::GlobalOverride => "global-override",
            Self::LocaleBundle => "bundle",
            Self::DefaultLocaleBundle => "default-locale-bundle",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cooperative cancellation flag for batch operations.
///
/// Checked between per-key / per-locale steps; every step is an idempotent
/// write so stopping in between leaves consistent state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
