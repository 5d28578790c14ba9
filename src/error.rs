use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid regular expression '{query}': {source}")]
    Compile {
        query: String,
        #[source]
        source: regex::Error,
    },

    #[error("Search pass failed in {failed_partitions} partition(s): {message}")]
    Match {
        failed_partitions: usize,
        message: String,
    },

    #[error("Index is locked by its owner")]
    IndexLocked,

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("An unexpected error occurred: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SearchError {
    /// True for errors after which the session still exposes its previous results.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SearchError::Compile { .. } | SearchError::Match { .. } | SearchError::IndexLocked
        )
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
