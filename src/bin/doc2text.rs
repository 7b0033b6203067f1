use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use doctext::{
    DocumentKind, DocumentTextExtractor, ExtractOptions, ExtractWarning, Language,
    PageLayoutExtractor, PageSelection, PreprocessOptions, PreprocessReport, RenderBackend,
    load_stop_words, preprocess_csv,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "doc2text",
    version,
    about = "Extract plain text from DOC, DOCX, RTF and PDF files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the text of one document.
    Extract(ExtractArgs),
    /// Append a preprocessed (stemmed, stop-word free) column to a CSV file.
    Preprocess(PreprocessArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input document path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output text path; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page selection like 1-3,5 (PDF only).
    #[arg(long)]
    pages: Option<String>,

    /// Tesseract language, e.g. eng or rus+eng.
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Resolution used when rendering image regions.
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Image source: auto, embedded or pdftoppm.
    #[arg(long, default_value = "auto")]
    renderer: String,

    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    #[arg(long, default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    #[arg(long, default_value = "soffice")]
    soffice: PathBuf,

    /// Keep text lines that are a bare integer (page numbers are dropped by default).
    #[arg(long)]
    keep_numeric_lines: bool,

    /// Enable verbose warning output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct PreprocessArgs {
    /// Input CSV with a header row.
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV path.
    #[arg(short, long)]
    output: PathBuf,

    /// Column holding the raw text.
    #[arg(long, default_value = "text")]
    column: String,

    /// Stemmer and stop-word language: english or russian.
    #[arg(long, default_value = "russian")]
    language: String,

    /// Extra stop words, one per line.
    #[arg(long)]
    stopwords: Option<PathBuf>,

    /// Write per-row stem weights as JSON.
    #[arg(long)]
    weights: Option<PathBuf>,
}

fn parse_options(args: &ExtractArgs) -> Result<ExtractOptions> {
    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid page selection: {error}"))
        .context("failed to parse --pages")?;

    let render_backend = RenderBackend::from_str(&args.renderer)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --renderer")?;

    if args.dpi == 0 {
        anyhow::bail!("--dpi must be greater than zero");
    }

    Ok(ExtractOptions {
        pages,
        ocr_language: args.lang.clone(),
        dpi: args.dpi,
        render_backend,
        tesseract_cmd: args.tesseract.clone(),
        pdftoppm_cmd: args.pdftoppm.clone(),
        soffice_cmd: args.soffice.clone(),
        drop_numeric_lines: !args.keep_numeric_lines,
    })
}

fn log_warnings(warnings: &[ExtractWarning], verbose: bool) {
    if warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", warnings.len());
    if verbose {
        for warning in warnings {
            eprintln!(
                "  - {:?} page={:?} table_index={:?}: {}",
                warning.code, warning.page, warning.table_index, warning.message
            );
        }
    }
}

/// `Ok(None)` when the extension is not a supported document kind.
fn run_extract(args: &ExtractArgs) -> Result<Option<String>> {
    let options = parse_options(args)?;
    let Some(kind) = DocumentKind::from_path(&args.input) else {
        return Ok(None);
    };

    let text = if kind == DocumentKind::Pdf {
        let result = PageLayoutExtractor::new(options)
            .extract(&args.input)
            .with_context(|| format!("failed to extract text from '{}'", args.input.display()))?;
        log_warnings(&result.warnings, args.verbose);
        result.text
    } else {
        DocumentTextExtractor::new(options)
            .extract(&args.input)
            .with_context(|| format!("failed to extract text from '{}'", args.input.display()))?
            .unwrap_or_default()
    };

    match &args.output {
        Some(path) => fs::write(path, &text)
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(Some(text))
}

fn run_preprocess(args: &PreprocessArgs) -> Result<PreprocessReport> {
    let language = Language::from_str(&args.language)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --language")?;
    let extra_stop_words = match &args.stopwords {
        Some(path) => load_stop_words(path)
            .with_context(|| format!("failed to read stop words from '{}'", path.display()))?,
        None => Vec::new(),
    };

    let options = PreprocessOptions {
        language,
        extra_stop_words,
    };
    preprocess_csv(
        &args.input,
        &args.output,
        &args.column,
        &options,
        args.weights.as_deref(),
    )
    .with_context(|| format!("failed to preprocess '{}'", args.input.display()))
}

fn main() -> ExitCode {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doctext=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => match run_extract(&args) {
            Ok(Some(_)) => ExitCode::SUCCESS,
            Ok(None) => {
                eprintln!(
                    "error: unsupported document type '{}', expected doc, docx, rtf or pdf",
                    args.input.display()
                );
                ExitCode::from(2)
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(1)
            }
        },
        Commands::Preprocess(args) => match run_preprocess(&args) {
            Ok(report) => {
                eprintln!("processed {} row(s)", report.row_count);
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(1)
            }
        },
    }
}
