//! Process command - extract fields from a single statement PDF.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use ccstmt_core::export;
use ccstmt_core::models::config::OcrBackendKind;
use ccstmt_core::{
    DocumentIngestor, ExtractionResult, FieldSelection, OcrFallback, OpenAiClient, PageSource,
    PromptBuilder, StatementConfig, StatementPipeline, TesseractOcr,
};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input statement PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Comma-separated field identifiers (default: all fields)
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// API key for the completion endpoint (default: the environment variable named in config)
    #[arg(long)]
    api_key: Option<String>,

    /// Override the model name
    #[arg(short, long)]
    model: Option<String>,

    /// Skip OCR and use only the PDF text layer
    #[arg(long)]
    no_ocr: bool,

    /// Show per-page text provenance
    #[arg(long)]
    show_pages: bool,

    /// Print the prompt instead of calling the model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// What the blocking worker hands back.
enum Outcome {
    Prompt(String),
    Extracted(ExtractionResult),
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    // Selection is validated before the file is touched
    let selection = match &args.fields {
        Some(ids) => FieldSelection::parse(ids)?,
        None => FieldSelection::all(),
    };

    let mut config = load_config(config_path)?;
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if args.no_ocr {
        config.ocr.backend = OcrBackendKind::Disabled;
    }

    let data = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    info!("Processing file: {} ({} bytes)", args.input.display(), data.len());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Reading statement...");

    let worker_pb = pb.clone();
    let dry_run = args.dry_run;
    let api_key = args.api_key.clone();
    let task = tokio::task::spawn_blocking(move || {
        extract(&config, &data, &selection, api_key, dry_run, &worker_pb)
    });

    let outcome = tokio::select! {
        joined = task => joined.context("extraction worker failed")?,
        _ = tokio::signal::ctrl_c() => {
            pb.abandon_with_message("Cancelled");
            eprintln!("{} Cancelled", style("✗").red());
            // The blocking worker ends at its own timeout; do not wait for it.
            std::process::exit(130);
        }
    };

    let outcome = match outcome {
        Ok(outcome) => {
            pb.finish_and_clear();
            outcome
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e);
        }
    };

    let result = match outcome {
        Outcome::Prompt(prompt) => {
            println!("{}", prompt);
            return Ok(());
        }
        Outcome::Extracted(result) => result,
    };

    report(&result, args.show_pages);

    let output = format_record(&result, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        print!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Everything that blocks: OCR, HTTP. Runs on a blocking worker.
fn extract(
    config: &StatementConfig,
    data: &[u8],
    selection: &FieldSelection,
    api_key: Option<String>,
    dry_run: bool,
    pb: &ProgressBar,
) -> anyhow::Result<Outcome> {
    if config.ocr.backend == OcrBackendKind::Tesseract && !TesseractOcr::is_available() {
        warn!("pdftoppm or tesseract not found; scanned pages will come back empty");
    }
    let ocr = OcrFallback::from_config(&config.ocr).context("failed to set up OCR")?;

    pb.set_message("Extracting text...");
    let ingested = DocumentIngestor::new(&config.pdf, ocr).ingest(data)?;
    debug!("Ingested {} pages", ingested.document.pages().len());

    if dry_run {
        let prompt = PromptBuilder::new(config.llm.max_document_chars)
            .build(&ingested.document.text(), selection);
        return Ok(Outcome::Prompt(prompt));
    }

    let api_key = resolve_api_key(api_key, &config.llm.api_key_env)?;
    let client = OpenAiClient::new(api_key, &config.llm)?;
    let pipeline = StatementPipeline::new(config, client, OcrFallback::disabled());

    pb.set_message(format!("Asking {}...", config.llm.model));
    let result = pipeline.extract(ingested, selection)?;

    Ok(Outcome::Extracted(result))
}

fn resolve_api_key(explicit: Option<String>, env_name: &str) -> anyhow::Result<String> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Ok(key);
    }
    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!("no API key: pass --api-key or set {}", env_name),
    }
}

/// Page provenance and warnings go to stderr so stdout stays parseable.
fn report(result: &ExtractionResult, show_pages: bool) {
    if show_pages {
        eprintln!("{}", style("Pages:").bold());
        for page in &result.pages {
            let source = match page.source {
                PageSource::Digital => style("digital").green(),
                PageSource::Ocr => style("ocr").yellow(),
            };
            eprintln!("  page {:>3}: {} ({} chars)", page.index, source, page.chars);
        }
        eprintln!(
            "{} {} of {} fields found in {}ms",
            style("ℹ").blue(),
            result.record.found_count(),
            result.record.len(),
            result.processing_time_ms
        );
    }

    for warning in &result.warnings {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }

    if result.unstructured {
        eprintln!("{}", style("Model returned unstructured data:").yellow());
        eprintln!("{}", result.raw_response);
    }
}

fn format_record(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    let output = match format {
        OutputFormat::Json => {
            let mut json = export::to_json_string(&result.record, true)?;
            json.push('\n');
            json
        }
        OutputFormat::Csv => export::to_csv(&result.record)?,
        OutputFormat::Text => export::to_text(&result.record),
    };
    Ok(output)
}
