//! Result aggregation and coverage accounting.
//!
//! A single consumer owns every piece of mutable statistics state. Ranges
//! are accepted first-come: a later extraction that intersects an accepted
//! range is counted as an overlap and its range discarded, while its file
//! stays on disk and its bytes still count toward the extracted total.
//! Coverage is therefore computed over the conflict-free subset.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use colored::Colorize;
use crossbeam_channel::Receiver;
use humansize::{format_size, BINARY};
use serde::Serialize;
use tracing::{info, warn};

use crate::carve::{CarvedFile, ExtractionResult};

/// Uncovered runs closer than this many bytes are reported as one span.
const MERGE_GAP: usize = 1024;

/// Warn when coverage falls below this percentage.
pub const LOW_COVERAGE_THRESHOLD: f64 = 90.0;

/// A maximal run of input bytes not claimed by any accepted range.
/// Both offsets are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UncoveredRange {
    pub start: usize,
    pub end: usize,
}

impl UncoveredRange {
    /// Span in bytes; inclusive bounds, so never zero.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Final statistics of one carve run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionStats {
    pub input_size: u64,
    pub total_extracted: usize,
    pub total_size: u64,
    /// Percentage of input bytes claimed by accepted ranges.
    pub coverage: f64,
    pub overlaps: usize,
    pub errors: usize,
    pub file_types: BTreeMap<String, usize>,
    pub uncovered: Vec<UncoveredRange>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl ExtractionStats {
    fn new(input_size: u64) -> Self {
        Self {
            input_size,
            total_extracted: 0,
            total_size: 0,
            coverage: 0.0,
            overlaps: 0,
            errors: 0,
            file_types: BTreeMap::new(),
            uncovered: Vec::new(),
            duration_ms: 0,
            finished_at: Utc::now(),
        }
    }

    /// Human-readable summary for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n=== Detailed Statistics ===");
        let _ = writeln!(
            out,
            "Input file size:       {} bytes ({})",
            self.input_size,
            format_size(self.input_size, BINARY)
        );
        let _ = writeln!(out, "Extracted files:       {}", self.total_extracted);
        let _ = writeln!(
            out,
            "Total extracted size:  {} bytes ({})",
            self.total_size,
            format_size(self.total_size, BINARY)
        );
        let _ = writeln!(out, "Data coverage:         {:.2}%", self.coverage);
        let _ = writeln!(out, "Overlaps detected:     {}", self.overlaps);

        if self.coverage < LOW_COVERAGE_THRESHOLD {
            let _ = writeln!(
                out,
                "\n{}",
                format!(
                    "Warning: Low data coverage ({:.2}%). Possible issues with file detection.",
                    self.coverage
                )
                .yellow()
            );
        }

        if self.total_size as f64 > self.input_size as f64 * 1.1 {
            let _ = writeln!(
                out,
                "\n{}",
                format!(
                    "Warning: Extracted data size ({:.2}%) exceeds input size. \
                     Possible overlaps or false positives.",
                    self.total_size as f64 / self.input_size as f64 * 100.0
                )
                .yellow()
            );
        }

        if !self.file_types.is_empty() {
            let _ = writeln!(out, "\nFile types distribution:");
            for (label, count) in &self.file_types {
                let _ = writeln!(out, "- {label:<36}: {count}");
            }
        }

        if !self.uncovered.is_empty() {
            let _ = writeln!(out, "\nUncovered areas (total {}):", self.uncovered.len());
            for (i, area) in self.uncovered.iter().enumerate() {
                if i < 10 || area.len() > MERGE_GAP {
                    let _ = writeln!(
                        out,
                        "- {:>8} - {:>8} ({:>6} bytes)",
                        area.start,
                        area.end,
                        area.len()
                    );
                }
                if i == 10 && self.uncovered.len() > 10 {
                    let _ = writeln!(
                        out,
                        "  ... and {} more uncovered areas",
                        self.uncovered.len() - 10
                    );
                    break;
                }
            }
        }

        out
    }
}

/// Drain the results channel until the workers close it, then compute the
/// coverage map. Returns every successful extraction plus the stats.
pub(super) fn run(
    results: Receiver<ExtractionResult>,
    input_len: usize,
) -> (Vec<CarvedFile>, ExtractionStats) {
    let mut stats = ExtractionStats::new(input_len as u64);
    let mut files: Vec<CarvedFile> = Vec::new();
    let mut accepted: Vec<(usize, usize)> = Vec::new();

    for record in results.iter() {
        let file = match record.outcome {
            Err(err) => {
                stats.errors += 1;
                warn!(worker = record.worker, seq = record.seq, %err, "extraction failed");
                continue;
            }
            Ok(file) => file,
        };

        stats.total_extracted += 1;
        stats.total_size += file.size as u64;
        *stats.file_types.entry(file.label.clone()).or_insert(0) += 1;

        let overlaps = accepted
            .iter()
            .any(|&(start, end)| file.start < end && file.end > start);
        if overlaps {
            stats.overlaps += 1;
        } else {
            accepted.push((file.start, file.end));
        }

        match &file.office {
            Some(info) => info!(
                file = %file.filename.display(),
                kind = %info.kind,
                bytes = file.size,
                start = file.start,
                end = file.end,
                encrypted = info.is_encrypted,
                macros = info.has_macro,
                version = info.version.as_deref().unwrap_or(""),
                "extracted office document"
            ),
            None => info!(
                file = %file.filename.display(),
                label = %file.label,
                bytes = file.size,
                start = file.start,
                end = file.end,
                "extracted"
            ),
        }

        files.push(file);
    }

    let mut covered = vec![false; input_len];
    for &(start, end) in &accepted {
        let start = start.min(input_len);
        let end = end.min(input_len);
        for bit in &mut covered[start..end] {
            *bit = true;
        }
    }

    let set_bits = covered.iter().filter(|&&bit| bit).count();
    stats.coverage = set_bits as f64 / input_len as f64 * 100.0;
    stats.uncovered = uncovered_ranges(&covered);
    stats.finished_at = Utc::now();

    (files, stats)
}

/// Maximal unset runs as inclusive ranges, then a merge pass that absorbs
/// sub-1 KiB covered slivers between adjacent runs.
fn uncovered_ranges(covered: &[bool]) -> Vec<UncoveredRange> {
    let mut runs: Vec<UncoveredRange> = Vec::new();
    let mut in_run = false;
    let mut start = 0usize;

    for (i, &bit) in covered.iter().enumerate() {
        if !bit && !in_run {
            in_run = true;
            start = i;
        } else if bit && in_run {
            in_run = false;
            runs.push(UncoveredRange { start, end: i - 1 });
        }
    }
    if in_run {
        runs.push(UncoveredRange {
            start,
            end: covered.len() - 1,
        });
    }

    if runs.len() > 1 {
        let mut merged = Vec::with_capacity(runs.len());
        let mut prev = runs[0].clone();
        for current in runs.into_iter().skip(1) {
            if current.start - prev.end < MERGE_GAP {
                prev.end = current.end;
            } else {
                merged.push(prev);
                prev = current;
            }
        }
        merged.push(prev);
        return merged;
    }

    runs
}
