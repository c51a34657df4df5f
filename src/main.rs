//! Chisel - extract embedded files from binary data.
//!
//! Command-line entry point: argument handling, logging setup, input
//! mapping, pipeline invocation and the final report.

use std::collections::HashSet;
use std::fs::File;
use std::process;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chisel::cli::{Cli, ReportFormat};
use chisel::config::Config;
use chisel::pipeline::{self, PipelineConfig, Progress};

fn main() -> Result<()> {
    let cli = parse_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("chisel={default_level}").parse()?),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let allowed = build_allow_set(&cli, &config);
    let workers = resolve_workers(&cli, &config);

    let file = File::open(&cli.input)
        .with_context(|| format!("Error reading input file: {}", cli.input.display()))?;
    // Safety: the mapping is read-only and the file is not expected to be
    // mutated underneath a forensic run.
    let data = unsafe {
        Mmap::map(&file)
            .with_context(|| format!("Error mapping input file: {}", cli.input.display()))?
    };
    ensure!(!data.is_empty(), "Input file is empty: {}", cli.input.display());

    std::fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!("Error creating output directory: {}", cli.output_dir.display())
    })?;

    println!(
        "Processing file {} ({} bytes) with {} workers",
        cli.input.display(),
        data.len(),
        workers
    );
    if !allowed.is_empty() {
        let mut exts: Vec<&str> = allowed.iter().map(String::as_str).collect();
        exts.sort_unstable();
        println!("Extracting only files with extensions: {}", exts.join(", "));
    }

    let pipeline_config = PipelineConfig {
        output_dir: cli.output_dir.clone(),
        workers,
        allowed,
    };

    let bar = ProgressBar::new(data.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {bytes}/{total_bytes} scanned",
    )?);

    let started = Instant::now();
    let report = pipeline::run_with_progress(&data, &pipeline_config, |progress| {
        let Progress::Scanning { scanned, .. } = progress;
        bar.set_position(scanned as u64);
    })?;
    bar.finish_and_clear();
    drop(data);

    match cli.report.unwrap_or_else(|| match config.output.report.as_str() {
        "json" => ReportFormat::Json,
        _ => ReportFormat::Human,
    }) {
        ReportFormat::Human => {
            print!("{}", report.stats.render());
            print_office_summary(&report);
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if report.stats.errors > 0 {
        eprintln!(
            "{}",
            format!(
                "Processing completed with errors: encountered {} processing errors",
                report.stats.errors
            )
            .yellow()
        );
    }

    println!("\nProcessing completed in {:.2?}", started.elapsed());
    Ok(())
}

/// Parse arguments, mapping usage errors to exit code 1 and help/version
/// display to exit code 0.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            process::exit(code);
        }
    }
}

/// Assemble the extension allow-set. The CLI flag beats the config file;
/// `all` expands to every registered extension, which extracts the same
/// set as no filter at all but prints in the startup banner.
fn build_allow_set(cli: &Cli, config: &Config) -> HashSet<String> {
    let requested: Vec<String> = match &cli.ext {
        Some(exts) => exts.clone(),
        None => config.scan.extensions.clone(),
    };

    if requested.iter().any(|e| e == "all") {
        return chisel::registered_extensions()
            .into_iter()
            .map(str::to_string)
            .collect();
    }

    requested
        .into_iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Worker count: CLI positional, then config, then the physical-core probe.
fn resolve_workers(cli: &Cli, config: &Config) -> usize {
    if let Some(n) = cli.workers {
        if n >= 1 {
            return n;
        }
        let fallback = chisel::physical_cpu_count();
        eprintln!("Invalid number of workers, using default ({fallback} physical cores)");
        return fallback;
    }
    if config.scan.workers >= 1 {
        return config.scan.workers;
    }
    chisel::physical_cpu_count()
}

fn print_office_summary(report: &pipeline::CarveReport) {
    let office: Vec<_> = report.files.iter().filter_map(|f| f.office.as_ref()).collect();
    if office.is_empty() {
        return;
    }

    let encrypted = office.iter().filter(|info| info.is_encrypted).count();
    let with_macros = office.iter().filter(|info| info.has_macro).count();

    println!("\nOffice documents found: {}", office.len());
    println!("- Encrypted: {encrypted}");
    println!("- With macros: {with_macros}");
}
