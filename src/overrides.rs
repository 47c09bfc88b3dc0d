//! Persisted overrides scoped by (locale, scope).

/// Snapshot file backed store
mod file;
/// In-process store
mod memory;
/// Store trait and timeout wrapper
mod store;
/// In-memory record table shared by the store implementations
mod table;
/// Record and write types
mod types;

pub use file::FileOverrideStore;
pub use memory::MemoryOverrideStore;
pub use store::{
    OverrideStore,
    TimeoutOverrideStore,
};
pub use table::OverrideTable;
pub use types::{
    OverrideFilter,
    OverrideOrigin,
    OverrideRecord,
    OverrideWrite,
    StoreError,
    WriteMode,
    WriteOutcome,
};
