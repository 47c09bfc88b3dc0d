//! Filling keys missing in a locale through an external text generator.

/// External text generation collaborator
mod generator;
/// Per-key fill batch
mod service;

pub use generator::{
    CommandGenerator,
    GenerateError,
    TextGenerator,
};
pub use service::{
    AUTO_FILL_ACTOR,
    AutoFillService,
    FillReport,
    FillRequest,
    KeyFailure,
    PromptVars,
    render_prompt,
};
