use crate::error::{Result, SearchError};
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub search_passes: IntCounter,
    pub entries_scanned: IntCounter,
    pub entries_matched: IntCounter,
    pub compile_errors: IntCounter,
    pub match_errors: IntCounter,
    pub index_lock_conflicts: IntCounter,
    registry: Arc<Registry>,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help)).map_err(metrics_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metrics_error)?;
    Ok(counter)
}

fn metrics_error(e: prometheus::Error) -> SearchError {
    SearchError::Other(format!("metrics: {e}"))
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        Ok(Metrics {
            search_passes: counter(&registry, "search_passes", "Number of completed search passes")?,
            entries_scanned: counter(&registry, "entries_scanned", "Number of index entries scanned")?,
            entries_matched: counter(&registry, "entries_matched", "Number of entries matched by a scan")?,
            compile_errors: counter(&registry, "compile_errors", "Number of rejected regex queries")?,
            match_errors: counter(&registry, "match_errors", "Number of scans aborted by a worker fault")?,
            index_lock_conflicts: counter(
                &registry,
                "index_lock_conflicts",
                "Number of passes skipped because the index was locked",
            )?,
            registry: Arc::new(registry),
        })
    }

    pub fn gather(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).map_err(metrics_error)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
