//! CLI entry point for the giro directory tool.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use giro_directory::{
    DEFAULT_URL, DocumentParser, FilenamePattern, HttpClient, HttpTimeouts, LocatorConfig,
    PdfExtractor, PdfToTextExtractor, Record, RecordsPipeline, TableExtractor, TabulaExtractor,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{FileConfig, load_default_file_config};
use cli::{Args, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = load_default_file_config()?.unwrap_or_default();
    let settings = Settings::merge(args, file_config);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let parser = DocumentParser::new(settings.pdf_extractor());

    let records = if let Some(path) = &settings.args.file {
        info!(path = %path.display(), "parsing local document");
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open '{}'", path.display()))?;
        parser
            .parse(&mut file, &cancel)
            .await
            .with_context(|| format!("Failed to parse '{}'", path.display()))?
    } else {
        let client = HttpClient::with_timeouts(settings.timeouts)?;
        let pipeline = RecordsPipeline::new(client, settings.locator_config()?, parser);

        if settings.args.locate_only {
            let url = pipeline.locator().locate(&settings.url, &cancel).await?;
            println!("{url}");
            return Ok(());
        }

        let listing = pipeline.run(&settings.url, &cancel).await?;
        info!(
            url = %listing.document_url,
            filename = listing.filename.as_deref().unwrap_or("-"),
            "directory document processed"
        );
        listing.records
    };

    info!(records = records.len(), "writing records");
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_records(&mut out, &records, settings.args.format)?;
    out.flush()?;
    Ok(())
}

/// CLI arguments merged with file configuration.
struct Settings {
    args: Args,
    url: String,
    pattern: Option<String>,
    tabula_jar: Option<std::path::PathBuf>,
    java: Option<std::path::PathBuf>,
    pdftotext: Option<std::path::PathBuf>,
    timeouts: HttpTimeouts,
}

impl Settings {
    /// CLI flags win over the config file, which wins over defaults.
    fn merge(args: Args, file: FileConfig) -> Self {
        let defaults = HttpTimeouts::default();
        Self {
            url: args
                .url
                .clone()
                .or(file.url)
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            pattern: args.pattern.clone().or(file.pattern),
            tabula_jar: args.tabula_jar.clone().or(file.tabula_jar),
            java: args.java.clone().or(file.java),
            pdftotext: args.pdftotext.clone().or(file.pdftotext),
            timeouts: HttpTimeouts {
                connect_secs: file.connect_timeout_secs.unwrap_or(defaults.connect_secs),
                read_secs: file.read_timeout_secs.unwrap_or(defaults.read_secs),
            },
            args,
        }
    }

    fn locator_config(&self) -> Result<LocatorConfig> {
        let mut config = LocatorConfig::default();
        if let Some(pattern) = &self.pattern {
            config.pattern = FilenamePattern::new(pattern)?;
        }
        Ok(config)
    }

    fn pdf_extractor(&self) -> PdfExtractor {
        let table = self.tabula_jar.as_ref().map(|jar| {
            let mut tabula = TabulaExtractor::new(jar);
            if let Some(java) = &self.java {
                tabula = tabula.with_java(java);
            }
            Arc::new(tabula) as Arc<dyn TableExtractor>
        });
        if table.is_none() {
            debug!("no tabula jar configured, PDFs use text extraction only");
        }
        let text = self
            .pdftotext
            .as_ref()
            .map_or_else(PdfToTextExtractor::default, PdfToTextExtractor::new);
        PdfExtractor::new(table, Arc::new(text))
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });
}

fn write_records(out: &mut impl Write, records: &[Record], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Tsv => {
            for record in records {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}",
                    tsv_field(&record.bank_code),
                    tsv_field(&record.bic),
                    tsv_field(&record.name),
                    tsv_field(&record.postal_code),
                    tsv_field(&record.address),
                )?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Keeps one record per line: tabs and line breaks inside a field become spaces.
fn tsv_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['\t', '\n', '\r']) {
        std::borrow::Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
    } else {
        std::borrow::Cow::Borrowed(value)
    }
}
