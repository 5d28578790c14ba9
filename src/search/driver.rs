//! Caller-side driver: one session per query box, created on first use and
//! updated on every later keystroke.
use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::index::{EntryIndex, EntryList, SharedIndex};
use crate::metrics::Metrics;
use crate::pool::WorkerPool;
use crate::search::aggregate::TypeFilter;
use crate::search::query::QueryFlags;
use crate::search::session::{SearchSession, SessionOptions};
use log::warn;
use std::sync::Arc;

/// What a results view should show after a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    EmptyQuery,
    NoResults,
    Results(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    pub outcome: SearchOutcome,
    pub num_results: usize,
    pub num_files: usize,
    pub num_folders: usize,
}

impl SearchSummary {
    /// Status line text, e.g. `"1,234 Items"`.
    pub fn status_text(&self) -> String {
        format!("{} Items", group_thousands(self.num_results))
    }
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub struct Searcher<I: EntryIndex = EntryList> {
    pool: Arc<WorkerPool>,
    index: SharedIndex<I>,
    config: Config,
    metrics: Option<Arc<Metrics>>,
    session: Option<SearchSession<I>>,
}

impl<I: EntryIndex> Searcher<I> {
    pub fn new(pool: Arc<WorkerPool>, index: SharedIndex<I>, config: Config) -> Self {
        Self {
            pool,
            index,
            config,
            metrics: None,
            session: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Points later searches at a rebuilt or different index.
    pub fn set_index(&mut self, index: SharedIndex<I>) {
        self.index = index;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn session(&self) -> Option<&SearchSession<I>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut SearchSession<I>> {
        self.session.as_mut()
    }

    /// Runs `query` with the configured flags and result limit.
    ///
    /// On error the previous session and its results stay as they were.
    pub fn search(&mut self, query: &str, filter: TypeFilter) -> Result<SearchSummary> {
        let flags = QueryFlags::new(
            self.config.search.enable_regex,
            self.config.search.search_in_path,
        );
        let max_results = self.config.search.max_results();

        let num_results = match self.session.as_mut() {
            Some(session) => session
                .update_with_view(self.index.clone(), query, flags, filter, max_results)
                .inspect_err(log_failure)?,
            None => {
                let mut options = SessionOptions::from_config(&self.config.performance)
                    .with_view(filter, max_results);
                if let Some(metrics) = &self.metrics {
                    options = options.with_metrics(Arc::clone(metrics));
                }
                let session = SearchSession::with_options(
                    Arc::clone(&self.pool),
                    self.index.clone(),
                    query,
                    flags.enable_regex,
                    flags.search_in_path,
                    options,
                )
                .inspect_err(log_failure)?;
                self.session.insert(session).num_results()
            }
        };
        let Some(session) = self.session.as_ref() else {
            return Err(SearchError::Other("search session missing".to_string()));
        };

        let outcome = if query.is_empty() {
            SearchOutcome::EmptyQuery
        } else if num_results == 0 {
            SearchOutcome::NoResults
        } else {
            SearchOutcome::Results(num_results)
        };

        Ok(SearchSummary {
            outcome,
            num_results,
            num_files: session.num_files(),
            num_folders: session.num_folders(),
        })
    }

    /// Same as [`Searcher::search`] using the filter from the configuration.
    pub fn search_configured(&mut self, query: &str) -> Result<SearchSummary> {
        let filter = self.config.search.filter;
        self.search(query, filter)
    }
}

fn log_failure(err: &SearchError) {
    if let SearchError::IndexLocked = err {
        warn!("search: index locked");
    }
}
