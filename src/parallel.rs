//! Batch simulation of independent systems.
//!
//! Design-space exploration evaluates many candidate mappings of the same
//! application. Each candidate is a self-contained [`System`], so a batch
//! runs them on a rayon thread pool when the `parallel` feature is enabled,
//! and one after another otherwise. Results come back in submission order
//! and are identical either way.
//!
//! # Feature Flag
//!
//! ```toml
//! [dependencies]
//! kpnsim = { version = "0.1", features = ["parallel"] }
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::SimResult;
use crate::stats::SimulationResult;
use crate::system::System;

/// Runs a set of systems and collects their results.
///
/// # Example
///
/// ```ignore
/// use kpnsim::parallel::BatchRunner;
///
/// let mut batch = BatchRunner::new().with_threads(4);
/// for mapping in candidates {
///     batch.add(System::new(&platform, &graph, &mapping, traces(), &registry, params.clone())?);
/// }
/// let results = batch.run();
/// let (index, best) = BatchRunner::fastest(&results).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct BatchRunner {
    systems: Vec<System>,
    /// Number of worker threads (0 = rayon default)
    num_threads: usize,
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    ///
    /// Pass 0 to use rayon's default. Ignored without the `parallel` feature.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Configured worker threads (0 = rayon default).
    pub fn threads(&self) -> usize {
        self.num_threads
    }

    /// Queues a system.
    pub fn add(&mut self, system: System) {
        self.systems.push(system);
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Runs every system sequentially.
    #[cfg(not(feature = "parallel"))]
    pub fn run(self) -> Vec<SimResult<SimulationResult>> {
        tracing::info!(systems = self.systems.len(), "batch start (sequential)");
        self.systems.into_iter().map(|mut s| s.run()).collect()
    }

    /// Runs every system on a rayon pool.
    #[cfg(feature = "parallel")]
    pub fn run(self) -> Vec<SimResult<SimulationResult>> {
        tracing::info!(
            systems = self.systems.len(),
            threads = self.num_threads,
            "batch start (parallel)"
        );
        let systems = self.systems;
        let run_all = move || -> Vec<SimResult<SimulationResult>> {
            systems.into_par_iter().map(|mut s| s.run()).collect()
        };

        if self.num_threads == 0 {
            return run_all();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                tracing::warn!(error = %e, "thread pool unavailable, using the global pool");
                run_all()
            }
        }
    }

    /// Index and result of the successful run with the fewest total ticks.
    ///
    /// Ties go to the earliest submission.
    pub fn fastest(results: &[SimResult<SimulationResult>]) -> Option<(usize, &SimulationResult)> {
        results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().ok().map(|r| (i, r)))
            .min_by_key(|(i, r)| (r.total_ticks, *i))
    }
}
