//! `TranslationEngine`: the service object owned by the process bootstrap.

/// Engine error type
mod error;
/// Engine operations
mod service;

pub use error::EngineError;
pub use service::{
    ApplyReport,
    EngineParts,
    TranslationEngine,
};
