//! Query compilation, parallel matching, aggregation and the session that
//! ties them together.
pub mod aggregate;
pub mod driver;
pub mod matcher;
pub mod query;
pub mod session;

pub use aggregate::{Aggregate, SearchResult, TypeFilter};
pub use driver::{SearchOutcome, SearchSummary, Searcher};
pub use matcher::{partition_ranges, Match};
pub use query::{Predicate, QueryCompiler, QueryFlags};
pub use session::{SearchSession, SessionOptions, SessionState};
