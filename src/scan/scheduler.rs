//! Bounded worker pool running one job per component.
//!
//! Jobs are independent. A job that panics is recorded with an empty result
//! and the worker moves on. [`Scheduler::run_all`] returns only once every
//! submitted job has produced its result.

use dashmap::DashMap;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::components::Component;
use crate::error::{Error, Result};

use super::{AnalysisJob, ComponentResult, GlobalResultSet};

/// A unit of work producing exactly one result for its component.
pub trait Job: Send + Sync {
    fn component(&self) -> &Component;
    fn run(&self) -> ComponentResult;
}

impl Job for AnalysisJob {
    fn component(&self) -> &Component {
        AnalysisJob::component(self)
    }

    fn run(&self) -> ComponentResult {
        AnalysisJob::run(self)
    }
}

/// Fixed-size pool of workers.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    jobs: Vec<Box<dyn Job>>,
}

impl Scheduler {
    /// Create a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("repocheck-worker-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("building worker pool: {}", e)))?;
        Ok(Self {
            pool,
            jobs: Vec::new(),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a job for the next [`run_all`](Self::run_all).
    pub fn submit<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Box::new(job));
    }

    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Run every queued job and wait for all of them.
    pub fn run_all(&mut self) -> GlobalResultSet {
        self.run_all_with(|_| {})
    }

    /// Like [`run_all`](Self::run_all), calling `on_done` as each job
    /// finishes, from the worker thread that ran it.
    ///
    /// Results come back in submission order regardless of completion order.
    pub fn run_all_with<F>(&mut self, on_done: F) -> GlobalResultSet
    where
        F: Fn(&ComponentResult) + Sync,
    {
        let jobs = std::mem::take(&mut self.jobs);
        let results: DashMap<usize, ComponentResult> = DashMap::with_capacity(jobs.len());

        self.pool.install(|| {
            jobs.par_iter()
                .enumerate()
                .with_max_len(1)
                .for_each(|(index, job)| {
                    let result = run_guarded(job.as_ref());
                    on_done(&result);
                    results.insert(index, result);
                });
        });

        (0..jobs.len())
            .filter_map(|index| results.remove(&index).map(|(_, r)| r))
            .collect()
    }

    /// Release the worker threads.
    pub fn shutdown(self) {
        drop(self.pool);
    }
}

fn run_guarded(job: &dyn Job) -> ComponentResult {
    match panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
        Ok(result) => result,
        Err(payload) => {
            tracing::error!(
                component = %job.component().relative_path,
                panic = panic_message(payload.as_ref()),
                "job panicked, recording empty result"
            );
            ComponentResult::empty(job.component().clone())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
