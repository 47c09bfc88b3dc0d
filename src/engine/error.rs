use thiserror::Error;

use crate::bundle::BundleError;
use crate::config::{
    ConfigError,
    ValidationError,
    format_validation_errors,
};
use crate::overrides::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Rejected before touching the override store.
    #[error("Invalid request:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Auto-fill is not configured, set autoFill.command")]
    AutoFillDisabled,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl EngineError {
    #[must_use]
    pub fn validation(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::new(field_path, message)])
    }

    /// Whether the caller sent a bad request (as opposed to a server fault).
    #[must_use]
    pub const fn is_invalid_request(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::AutoFillDisabled)
    }
}
