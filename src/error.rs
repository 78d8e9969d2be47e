//! Error taxonomy (§7). Recursive DD operations never return a `Result` — a table-full condition
//! that survives a GC is unrecoverable and the process aborts after logging occupancy, matching
//! "No partial results are returned." The only fallible public surfaces are engine initialization
//! and the I/O reader/writer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node store capacity must be a power of two in [{min}, {max}], got {actual}")]
    InvalidNodeCapacity { actual: u64, min: u64, max: u64 },

    #[error("operation cache capacity must be a power of two, got {actual}")]
    InvalidCacheCapacity { actual: u64 },

    #[error("worker count must be at least 1, got {actual}")]
    InvalidWorkerCount { actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("I/O error while {action}: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt DD stream: {0}")]
    CorruptStream(&'static str),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Raised internally when the node store's lookup probe budget is exhausted. Never escapes the
/// crate: the kernel catches it, triggers a GC, and retries (§4.2, §7 "Table full").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableFull;

/// Raised internally when GC rehash fails to reinsert a marked slot within its probe budget.
/// The GC coordinator treats this identically to `TableFull` (§4.2 "GC phases", step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RehashFailure;
