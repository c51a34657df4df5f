//! CLI module - command line surface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

const AFTER_HELP: &str = "\
Supported file extensions: doc, docx, ppt, pptx, xls, xlsx, jpg, jpeg, pdf, \
rtf, odt, ods, odp, ots, fods, zip, html

Examples:
  chisel data.bin recovered/
  chisel --ext pdf,jpg,docx data.bin recovered/
  chisel --ext all data.bin recovered/ 8

The default number of workers is the physical CPU core count.";

/// Chisel - extract embedded files from binary data
///
/// Scans a disk image, memory dump, or other opaque binary blob for known
/// file signatures and carves out office documents, PDFs, images and
/// archives, without relying on any filesystem metadata. Finishes with a
/// byte-accurate coverage report of the input.
#[derive(Parser, Debug)]
#[command(name = "chisel")]
#[command(version)]
#[command(about = "Extract embedded office documents, PDFs, images and archives from binary data")]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    /// Input file: disk image, memory dump, or any binary blob
    pub input: PathBuf,

    /// Directory that receives the extracted files
    pub output_dir: PathBuf,

    /// Number of parallel workers (default: physical CPU cores)
    pub workers: Option<usize>,

    /// Comma-separated extensions to extract (e.g. 'pdf,jpg,docx'), or 'all'
    #[arg(long, short = 'e', value_delimiter = ',')]
    pub ext: Option<Vec<String>>,

    /// Format of the final statistics report
    #[arg(long, value_enum)]
    pub report: Option<ReportFormat>,

    /// Config file (default: ~/.config/chisel/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable statistics on stdout
    Human,
    /// Machine-readable JSON report on stdout
    Json,
}
