//! Long-lived worker pool shared by every search session.
use crate::config::PerformanceConfig;
use crate::error::{Result, SearchError};
use log::{debug, warn};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Bounded pool of OS threads that runs one job per partition.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    fault_isolation: bool,
}

impl WorkerPool {
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("fsearch-worker-{i}"))
            .build()?;
        debug!("Worker pool started with {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            fault_isolation: false,
        })
    }

    pub fn from_config(config: &PerformanceConfig) -> Result<Self> {
        Ok(Self::new(config.worker_threads())?.with_fault_isolation(config.fault_isolation))
    }

    /// With isolation on, a panicking partition contributes `R::default()`
    /// instead of failing the whole run.
    pub fn with_fault_isolation(mut self, enabled: bool) -> Self {
        self.fault_isolation = enabled;
        self
    }

    pub fn fault_isolation(&self) -> bool {
        self.fault_isolation
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `work` once per partition and returns the outputs in partition
    /// order, whatever order the workers finish in.
    pub fn run<F, R>(&self, partitions: usize, work: F) -> Result<Vec<R>>
    where
        F: Fn(usize) -> R + Send + Sync,
        R: Send + Default,
    {
        let outcomes: Vec<std::thread::Result<R>> = self.pool.install(|| {
            (0..partitions)
                .into_par_iter()
                .with_max_len(1)
                .map(|partition| panic::catch_unwind(AssertUnwindSafe(|| work(partition))))
                .collect()
        });

        let mut results = Vec::with_capacity(partitions);
        let mut failed = 0;
        let mut first_message = None;
        for (partition, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(value) => results.push(value),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("Worker fault in partition {partition}: {message}");
                    failed += 1;
                    first_message.get_or_insert(message);
                    results.push(R::default());
                }
            }
        }

        if failed > 0 && !self.fault_isolation {
            return Err(SearchError::Match {
                failed_partitions: failed,
                message: first_message.unwrap_or_default(),
            });
        }
        Ok(results)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
