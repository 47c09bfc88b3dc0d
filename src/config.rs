//! Engine settings: types, validation and workspace loading.

/// Config file loader
mod loader;
/// Configuration manager
mod manager;
/// Configuration types and settings
mod types;

pub use loader::CONFIG_FILE_NAME;
pub use manager::ConfigManager;
pub use types::{
    AutoFillConfig,
    CacheConfig,
    ConfigError,
    DEFAULT_PROMPT_TEMPLATE,
    I18nSettings,
    PROMPT_TEXT_PLACEHOLDER,
    ServerSettings,
    StoreConfig,
    ValidationError,
    format_validation_errors,
};
