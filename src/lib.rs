//! Filename and path search over a pre-built, in-memory filesystem index.
//!
//! A [`SearchSession`] compiles a query into a [`Predicate`], scans the
//! index in contiguous partitions on a shared [`WorkerPool`], then filters,
//! caps and counts the matches in index order.
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod search;

pub use crate::config::Config;
pub use crate::error::{Result, SearchError};
pub use crate::index::{Entry, EntryId, EntryIndex, EntryKind, EntryList, SharedIndex};
pub use crate::logging::init_logging;
pub use crate::metrics::Metrics;
pub use crate::pool::WorkerPool;
pub use crate::search::{
    Predicate, QueryFlags, SearchOutcome, SearchResult, SearchSession, SearchSummary, Searcher,
    SessionState, TypeFilter,
};
