//! Stateful search session: owns the current query, its compiled predicate
//! and the last complete result set.
use crate::config::PerformanceConfig;
use crate::error::Result;
use crate::index::{Entry, EntryId, EntryIndex, EntryList, SharedIndex};
use crate::metrics::Metrics;
use crate::pool::WorkerPool;
use crate::search::aggregate::{Aggregate, SearchResult, TypeFilter};
use crate::search::matcher::{self, Match, DEFAULT_MIN_CHUNK_SIZE};
use crate::search::query::{Predicate, QueryCompiler, QueryFlags};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Compiling,
    Matching,
    Ready,
    /// The last pass failed; the previous result set is still exposed.
    Failed,
}

#[derive(Clone)]
pub struct SessionOptions {
    pub min_chunk_size: usize,
    pub regex_cache_size: usize,
    pub metrics: Option<Arc<Metrics>>,
    /// Filter and cap applied by the initial pass.
    pub filter: TypeFilter,
    pub max_results: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            regex_cache_size: 32,
            metrics: None,
            filter: TypeFilter::None,
            max_results: 0,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self {
            min_chunk_size: config.min_chunk_size,
            regex_cache_size: config.regex_cache_size,
            metrics: None,
            filter: TypeFilter::None,
            max_results: 0,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_view(mut self, filter: TypeFilter, max_results: usize) -> Self {
        self.filter = filter;
        self.max_results = max_results;
        self
    }
}

/// A search over one shared index.
///
/// Every pass is all-or-nothing: a rejected regex, a worker fault or a
/// locked index leaves the previous results, counts and query untouched.
/// Taking `&mut self` for every pass keeps at most one pass in flight; a
/// session shared between threads goes behind the caller's own lock.
pub struct SearchSession<I: EntryIndex = EntryList> {
    pool: Arc<WorkerPool>,
    index: SharedIndex<I>,
    compiler: QueryCompiler,
    min_chunk_size: usize,
    metrics: Option<Arc<Metrics>>,
    query: String,
    flags: QueryFlags,
    predicate: Predicate,
    filter: TypeFilter,
    max_results: usize,
    snapshot: Option<Arc<I>>,
    matches: Vec<Match>,
    aggregate: Aggregate,
    state: SessionState,
}

impl<I: EntryIndex> SearchSession<I> {
    pub fn new(
        pool: Arc<WorkerPool>,
        index: SharedIndex<I>,
        query: &str,
        regex_enabled: bool,
        search_in_path: bool,
    ) -> Result<Self> {
        Self::with_options(
            pool,
            index,
            query,
            regex_enabled,
            search_in_path,
            SessionOptions::default(),
        )
    }

    pub fn with_options(
        pool: Arc<WorkerPool>,
        index: SharedIndex<I>,
        query: &str,
        regex_enabled: bool,
        search_in_path: bool,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut session = Self {
            pool,
            index: index.clone(),
            compiler: QueryCompiler::new(options.regex_cache_size),
            min_chunk_size: options.min_chunk_size,
            metrics: options.metrics,
            query: String::new(),
            flags: QueryFlags::default(),
            predicate: Predicate::Nothing,
            filter: options.filter,
            max_results: options.max_results,
            snapshot: None,
            matches: Vec::new(),
            aggregate: Aggregate::default(),
            state: SessionState::Idle,
        };
        session.update(index, query, regex_enabled, search_in_path)?;
        info!("Search session created for '{query}'");
        Ok(session)
    }

    /// Replaces the index and every flag, then runs a full pass.
    pub fn update(
        &mut self,
        index: SharedIndex<I>,
        query: &str,
        regex_enabled: bool,
        search_in_path: bool,
    ) -> Result<usize> {
        self.run_pass(
            index,
            query.to_string(),
            QueryFlags::new(regex_enabled, search_in_path),
            (self.filter, self.max_results),
        )
    }

    /// Like [`SearchSession::update`], but the pass aggregates straight into
    /// `filter` and `max_results`. They are kept only if the pass succeeds.
    pub fn update_with_view(
        &mut self,
        index: SharedIndex<I>,
        query: &str,
        flags: QueryFlags,
        filter: TypeFilter,
        max_results: usize,
    ) -> Result<usize> {
        self.run_pass(index, query.to_string(), flags, (filter, max_results))
    }

    pub fn set_query(&mut self, query: &str) -> Result<usize> {
        let view = (self.filter, self.max_results);
        self.run_pass(self.index.clone(), query.to_string(), self.flags, view)
    }

    pub fn set_search_in_path(&mut self, search_in_path: bool) -> Result<usize> {
        let flags = QueryFlags {
            search_in_path,
            ..self.flags
        };
        let view = (self.filter, self.max_results);
        self.run_pass(self.index.clone(), self.query.clone(), flags, view)
    }

    /// Re-aggregates the last match set with a new filter and cap, without
    /// touching the index. Returns the new number of results.
    pub fn perform(&mut self, filter: TypeFilter, max_results: usize) -> usize {
        self.filter = filter;
        self.max_results = max_results;
        self.aggregate = Aggregate::build(&self.matches, filter, max_results);
        if self.snapshot.is_some() {
            self.state = SessionState::Ready;
        }
        self.aggregate.len()
    }

    /// Drops one entry from the current results without rescanning.
    pub fn remove_entry(&mut self, id: EntryId) -> bool {
        if let Ok(position) = self.matches.binary_search_by_key(&id, |m| m.id) {
            self.matches.remove(position);
        }
        self.aggregate.remove(id)
    }

    fn run_pass(
        &mut self,
        index: SharedIndex<I>,
        query: String,
        flags: QueryFlags,
        (filter, max_results): (TypeFilter, usize),
    ) -> Result<usize> {
        let guard = match index.try_read() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Index locked, skipping search for '{query}'");
                if let Some(metrics) = &self.metrics {
                    metrics.index_lock_conflicts.inc();
                }
                return Err(e);
            }
        };
        let snapshot = Arc::clone(&*guard);

        self.state = SessionState::Compiling;
        let predicate = match self.compiler.compile(&query, flags) {
            Ok(predicate) => predicate,
            Err(e) => {
                self.state = SessionState::Failed;
                if let Some(metrics) = &self.metrics {
                    metrics.compile_errors.inc();
                }
                return Err(e);
            }
        };

        self.state = SessionState::Matching;
        let started = Instant::now();
        let matches = match matcher::scan(
            &self.pool,
            &*snapshot,
            &predicate,
            flags.search_in_path,
            self.min_chunk_size,
        ) {
            Ok(matches) => matches,
            Err(e) => {
                self.state = SessionState::Failed;
                warn!("Search for '{query}' aborted: {e}");
                if let Some(metrics) = &self.metrics {
                    metrics.match_errors.inc();
                }
                return Err(e);
            }
        };
        drop(guard);

        if let Some(metrics) = &self.metrics {
            metrics.search_passes.inc();
            if !predicate.is_nothing() {
                metrics.entries_scanned.inc_by(snapshot.len() as u64);
            }
            metrics.entries_matched.inc_by(matches.len() as u64);
        }

        self.aggregate = Aggregate::build(&matches, filter, max_results);
        debug!(
            "Pass for '{query}' done in {:.2}ms: {} matches, {} results",
            started.elapsed().as_secs_f64() * 1000.0,
            matches.len(),
            self.aggregate.len()
        );

        self.index = index;
        self.query = query;
        self.flags = flags;
        self.filter = filter;
        self.max_results = max_results;
        self.predicate = predicate;
        self.snapshot = Some(snapshot);
        self.matches = matches;
        self.state = SessionState::Ready;
        Ok(self.aggregate.len())
    }

    pub fn results(&self) -> &[SearchResult] {
        self.aggregate.results()
    }

    pub fn num_results(&self) -> usize {
        self.aggregate.len()
    }

    pub fn num_files(&self) -> usize {
        self.aggregate.num_files()
    }

    pub fn num_folders(&self) -> usize {
        self.aggregate.num_folders()
    }

    /// Number of matches before filtering and truncation.
    pub fn num_matches(&self) -> usize {
        self.matches.len()
    }

    /// Resolves a result against the index snapshot its pass ran on.
    pub fn entry(&self, result: &SearchResult) -> Option<&Entry> {
        self.snapshot.as_ref()?.get(result.entry_id())
    }

    pub fn full_path(&self, result: &SearchResult) -> Option<String> {
        if let Some(path) = result.matched_path() {
            return Some(path.to_string());
        }
        let snapshot = self.snapshot.as_ref()?;
        snapshot
            .get(result.entry_id())
            .map(|entry| snapshot.full_path(entry))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn filter(&self) -> TypeFilter {
        self.filter
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn index(&self) -> &SharedIndex<I> {
        &self.index
    }
}

impl<I: EntryIndex> std::fmt::Debug for SearchSession<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("query", &self.query)
            .field("flags", &self.flags)
            .field("filter", &self.filter)
            .field("max_results", &self.max_results)
            .field("state", &self.state)
            .field("matches", &self.matches.len())
            .field("results", &self.aggregate.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::index::EntryKind;

    fn names(session: &SearchSession) -> Vec<String> {
        session
            .results()
            .iter()
            .map(|r| session.entry(r).unwrap().name().to_string())
            .collect()
    }

    fn setup() -> (Arc<WorkerPool>, SharedIndex) {
        let mut list = EntryList::new();
        let root = list.add_dir(None, "/").unwrap();
        let docs = list.add_dir(Some(root), "Documents").unwrap();
        list.add_file(docs, "report.pdf", 1).unwrap();
        list.add_file(docs, "report_draft.pdf", 2).unwrap();
        list.add_file(root, "readme.txt", 3).unwrap();
        (Arc::new(WorkerPool::new(2).unwrap()), SharedIndex::new(list))
    }

    #[test]
    fn test_new_runs_initial_pass() {
        let (pool, index) = setup();
        let session = SearchSession::new(pool, index, "report", false, false).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(names(&session), ["report.pdf", "report_draft.pdf"]);
        assert_eq!((session.num_files(), session.num_folders()), (2, 0));
    }

    #[test]
    fn test_invalid_regex_keeps_previous_results() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index, "re", true, false).unwrap();
        let before = session.results().to_vec();
        assert_eq!(before.len(), 3);

        let err = session.set_query("re(").unwrap_err();
        assert!(matches!(err, SearchError::Compile { .. }));
        assert!(err.is_recoverable());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.results(), before.as_slice());
        assert_eq!(session.query(), "re");

        session.set_query("pdf$").unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.num_results(), 2);
    }

    #[test]
    fn test_locked_index_is_reported_without_transition() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index.clone(), "txt", false, false).unwrap();
        testing_logger::setup();
        {
            let _writer = index.write();
            let err = session.set_query("pdf").unwrap_err();
            assert!(matches!(err, SearchError::IndexLocked));
        }
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.query(), "txt");
        assert_eq!(names(&session), ["readme.txt"]);
        testing_logger::validate(|logs| {
            assert!(logs
                .iter()
                .any(|l| l.level == log::Level::Warn && l.body.contains("Index locked")));
        });
    }

    #[test]
    fn test_set_search_in_path_reuses_query() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index, "documents", false, false).unwrap();
        assert_eq!(names(&session), ["Documents"]);

        session.set_search_in_path(true).unwrap();
        assert_eq!(names(&session), ["Documents", "report.pdf", "report_draft.pdf"]);
        assert!(session.flags().search_in_path);
        let first = &session.results()[1];
        assert_eq!(
            session.full_path(first).as_deref(),
            Some("/Documents/report.pdf")
        );
    }

    #[test]
    fn test_perform_rebuilds_without_rescan() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index.clone(), "e", false, false).unwrap();
        assert_eq!(session.num_results(), 4);

        // a writer holding the lock does not affect re-aggregation
        let _writer = index.write();
        assert_eq!(session.perform(TypeFilter::FoldersOnly, 0), 1);
        assert_eq!(session.num_files(), 0);
        assert_eq!(session.perform(TypeFilter::FilesOnly, 2), 2);
        assert_eq!(names(&session), ["report.pdf", "report_draft.pdf"]);
        assert_eq!(session.num_matches(), 4);
    }

    #[test]
    fn test_filter_survives_new_query() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index, "", false, false).unwrap();
        assert_eq!(session.num_results(), 0);
        session.perform(TypeFilter::FilesOnly, 1);
        session.set_query("r").unwrap();
        assert_eq!(names(&session), ["report.pdf"]);
    }

    #[test]
    fn test_update_with_view_applies_filter_in_same_pass() {
        let (pool, index) = setup();
        let options = SessionOptions::default().with_view(TypeFilter::FoldersOnly, 0);
        let mut session =
            SearchSession::with_options(pool, index.clone(), "e", false, false, options).unwrap();
        assert_eq!(session.filter(), TypeFilter::FoldersOnly);
        assert_eq!(names(&session), ["Documents"]);

        let flags = QueryFlags::default();
        let n = session
            .update_with_view(index.clone(), "pdf", flags, TypeFilter::FilesOnly, 1)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(names(&session), ["report.pdf"]);
        assert_eq!((session.filter(), session.max_results()), (TypeFilter::FilesOnly, 1));

        // a failed pass leaves the previous view in place
        let _writer = index.write();
        assert!(session
            .update_with_view(index.clone(), "txt", flags, TypeFilter::None, 0)
            .is_err());
        assert_eq!((session.filter(), session.max_results()), (TypeFilter::FilesOnly, 1));
        assert_eq!(names(&session), ["report.pdf"]);
    }

    #[test]
    fn test_remove_entry_adjusts_counts() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index, "e", false, false).unwrap();
        let removed = session.results()[1].entry_id();
        assert!(session.remove_entry(removed));
        assert_eq!(session.num_results(), 3);
        assert_eq!(session.num_files() + session.num_folders(), 3);
        assert!(session
            .results()
            .iter()
            .enumerate()
            .all(|(i, r)| r.ordinal() == i));
        // re-aggregating does not bring it back
        session.perform(TypeFilter::None, 0);
        assert!(session.results().iter().all(|r| r.entry_id() != removed));
    }

    #[test]
    fn test_update_swaps_index() {
        let (pool, index) = setup();
        let mut session = SearchSession::new(pool, index, "report", false, false).unwrap();
        let mut other = EntryList::new();
        let root = other.add_dir(None, "report archive").unwrap();
        other.push(Some(root), "old report.doc", EntryKind::File).unwrap();
        let other = SharedIndex::new(other);

        session.update(other.clone(), "report", false, false).unwrap();
        assert!(session.index().same_handle(&other));
        assert_eq!(names(&session), ["report archive", "old report.doc"]);
        assert_eq!((session.num_files(), session.num_folders()), (1, 1));
    }

    struct FaultyIndex {
        inner: EntryList,
        poisoned: usize,
    }

    impl EntryIndex for FaultyIndex {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn get(&self, id: EntryId) -> Option<&Entry> {
            if id.index() == self.poisoned {
                panic!("corrupt entry {id}");
            }
            self.inner.get(id)
        }
    }

    #[test]
    fn test_worker_fault_keeps_previous_results() {
        let mut inner = EntryList::new();
        let root = inner.add_dir(None, "root").unwrap();
        for i in 0..8 {
            inner.add_file(root, format!("file{i}.txt"), 0).unwrap();
        }
        let good = SharedIndex::new(FaultyIndex {
            inner: inner.clone(),
            poisoned: usize::MAX,
        });
        let bad = SharedIndex::new(FaultyIndex { inner, poisoned: 5 });

        let metrics = Arc::new(Metrics::new().unwrap());
        let options = SessionOptions {
            min_chunk_size: 1,
            ..Default::default()
        }
        .with_metrics(Arc::clone(&metrics));
        let pool = Arc::new(WorkerPool::new(3).unwrap());
        let mut session =
            SearchSession::with_options(pool, good, "file", false, false, options).unwrap();
        assert_eq!(session.num_results(), 8);

        let err = session.update(bad, "txt", false, false).unwrap_err();
        assert!(matches!(err, SearchError::Match { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.num_results(), 8);
        assert_eq!(session.query(), "file");
        assert_eq!(metrics.match_errors.get(), 1);
        assert_eq!(metrics.search_passes.get(), 1);
    }
}
