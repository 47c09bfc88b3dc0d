//! Default message bundles shipped with the application.
//!
//! Bundles are nested JSON trees, one per supported locale, flattened to
//! dotted keys at load time and read-only afterwards. A resync replaces the
//! whole snapshot.

/// Bundle file discovery and loading
mod loader;
/// Strict bundle parser
mod parser;
/// Per-locale bundle snapshot
mod store;
/// Bundle types and errors
mod types;

pub use loader::BundleLoader;
pub use parser::{
    ParseFailure,
    ParsedBundle,
    parse_bundle_text,
};
pub use store::{
    BundleHandle,
    BundleStore,
    LocaleState,
};
pub use types::{
    BundleError,
    FlatBundle,
};
