//! Extraction workers.
//!
//! Each worker drains candidates from the shared jobs channel until the
//! scheduler closes it, runs the full extraction (scan, boundary, write),
//! and forwards the result record to the aggregator.

use std::collections::HashSet;
use std::path::Path;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::carve::{extract_file, Candidate, ExtractionResult};

pub(super) fn run(
    id: usize,
    jobs: Receiver<Candidate<'_>>,
    results: Sender<ExtractionResult>,
    output_dir: &Path,
    allowed: &HashSet<String>,
) {
    debug!(worker = id, "worker started");
    let mut processed = 0usize;

    for candidate in jobs.iter() {
        let outcome = extract_file(
            candidate.data,
            output_dir,
            candidate.seq,
            candidate.start,
            allowed,
        );
        processed += 1;

        let record = ExtractionResult {
            seq: candidate.seq,
            worker: id,
            outcome,
        };
        if results.send(record).is_err() {
            // Aggregator is gone; nothing left to report to.
            break;
        }
    }

    debug!(worker = id, processed, "worker finished");
}
