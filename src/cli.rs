//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format for records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One tab-separated record per line: code, BIC, name, postal code, address.
    #[default]
    Tsv,
    /// A JSON array of records.
    Json,
}

/// Fetch and print the Hungarian giro bank branch directory.
///
/// Finds the newest directory document on the publisher's site (or reads a
/// local file), extracts its records and prints them to stdout.
#[derive(Parser, Debug)]
#[command(name = "giro")]
#[command(author, version, about)]
pub struct Args {
    /// Index page to crawl, or a direct document URL
    #[arg(short, long)]
    pub url: Option<String>,

    /// Regular expression the document filename must match
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Parse a local document instead of downloading
    #[arg(short, long, conflicts_with_all = ["url", "locate_only"])]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    pub format: OutputFormat,

    /// Path to the tabula jar (enables table extraction for PDFs)
    #[arg(long)]
    pub tabula_jar: Option<PathBuf>,

    /// Java launcher used to run tabula
    #[arg(long)]
    pub java: Option<PathBuf>,

    /// pdftotext program used for the text fallback
    #[arg(long)]
    pub pdftotext: Option<PathBuf>,

    /// Only print the URL of the document that would be downloaded
    #[arg(long)]
    pub locate_only: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
