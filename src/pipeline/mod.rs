//! Carve pipeline - scheduler, worker pool, aggregator.
//!
//! One scheduler walks the input and feeds candidates through a bounded
//! jobs channel into a fixed pool of extraction workers; a single
//! aggregator drains the results channel concurrently and owns every
//! statistic. All three run inside a thread scope because candidates
//! borrow the input mapping directly; nothing is copied.
//!
//! Closing the jobs channel is the only shutdown signal: the scheduler
//! drops its sender once the walk and both queues are exhausted, the
//! workers drain and hang up their result senders, and the aggregator
//! returns when the results channel closes.

mod aggregator;
mod scheduler;
mod worker;

use std::collections::HashSet;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use crossbeam_channel::bounded;
use serde::Serialize;
use tracing::info;

use crate::carve::{Candidate, CarvedFile, ExtractionResult};

pub use aggregator::{ExtractionStats, UncoveredRange, LOW_COVERAGE_THRESHOLD};

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory that receives `file_{NNNN}.{ext}` payloads.
    pub output_dir: PathBuf,
    /// Number of extraction workers.
    pub workers: usize,
    /// Extension allow-set; empty admits every registered extension.
    pub allowed: HashSet<String>,
}

/// Progress updates emitted while the scheduler walks the input.
#[derive(Debug, Clone, Copy)]
pub enum Progress {
    Scanning { scanned: usize, total: usize },
}

/// Everything a finished run produced.
#[derive(Debug, Serialize)]
pub struct CarveReport {
    pub files: Vec<CarvedFile>,
    pub stats: ExtractionStats,
}

/// Run the pipeline without progress reporting.
pub fn run(data: &[u8], config: &PipelineConfig) -> Result<CarveReport> {
    run_with_progress(data, config, |_| {})
}

/// Run the pipeline, reporting scan progress through `on_progress`.
pub fn run_with_progress<F>(
    data: &[u8],
    config: &PipelineConfig,
    on_progress: F,
) -> Result<CarveReport>
where
    F: Fn(Progress) + Send + Sync,
{
    ensure!(!data.is_empty(), "input is empty");
    ensure!(config.workers > 0, "worker count must be positive");

    let started = Instant::now();
    let workers = config.workers;

    info!(
        input_size = data.len(),
        workers,
        filtered = !config.allowed.is_empty(),
        "starting carve pipeline"
    );

    let (files, mut stats) = thread::scope(|scope| {
        let (jobs_tx, jobs_rx) = bounded::<Candidate<'_>>(workers * 2);
        let (results_tx, results_rx) = bounded::<ExtractionResult>(workers * 2);

        let aggregator = scope.spawn(move || aggregator::run(results_rx, data.len()));

        for id in 0..workers {
            let jobs = jobs_rx.clone();
            let results = results_tx.clone();
            let output_dir = &config.output_dir;
            let allowed = &config.allowed;
            scope.spawn(move || worker::run(id, jobs, results, output_dir, allowed));
        }
        // Workers hold their own clones; these must go so the channels can
        // actually close.
        drop(jobs_rx);
        drop(results_tx);

        let dispatched = scheduler::run(data, &config.allowed, jobs_tx, &on_progress);
        info!(dispatched, "scan complete");

        aggregator
            .join()
            .map_err(|_| anyhow::anyhow!("aggregator thread panicked"))
    })
    .context("carve pipeline failed")?;

    stats.duration_ms = started.elapsed().as_millis() as u64;

    info!(
        extracted = stats.total_extracted,
        errors = stats.errors,
        overlaps = stats.overlaps,
        coverage = stats.coverage,
        duration_ms = stats.duration_ms,
        "carve pipeline complete"
    );

    Ok(CarveReport { files, stats })
}
