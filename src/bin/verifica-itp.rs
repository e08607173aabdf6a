//! CLI binary for verifica-itp.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` / `AnalysisRequestContext`, prints the verdict and writes
//! the spreadsheet report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use verifica_itp::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use verifica_itp::pipeline::report::outcome_label;
use verifica_itp::{
    analyze, download_report, AnalysisConfig, AnalysisOutput, AnalysisProgressCallback,
    AnalysisRequestContext, InputFile, ProgressCallback, ReportOptions, VerificaError,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the pipeline stages.
struct CliProgressCallback {
    bar: ProgressBar,
    total: AtomicUsize,
    encoded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparazione");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total: AtomicUsize::new(0),
            encoded: AtomicUsize::new(0),
        })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_files: usize) {
        self.total.store(total_files, Ordering::SeqCst);
        self.bar.set_prefix("Lettura");
        self.bar.set_message(format!("0/{total_files} file"));
    }

    fn on_file_encoded(&self, _index: usize, name: &str, bytes: usize) {
        let done = self.encoded.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<40} {}",
            green("✓"),
            name,
            dim(&format!("{:.1} KB", bytes as f64 / 1024.0))
        ));
        self.bar.set_message(format!("{done}/{total} file"));
    }

    fn on_request_sent(&self, parts: usize) {
        self.bar.set_prefix("Analisi AI in corso");
        self.bar.set_message(format!("{parts} parti inviate"));
    }

    fn on_response_received(&self, text_len: usize) {
        self.bar.set_prefix("Validazione");
        self.bar.set_message(format!("{text_len} caratteri"));
    }

    fn on_analysis_complete(&self, _conforme: bool) {
        self.bar.finish_and_clear();
    }

    fn on_analysis_error(&self, _message: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check a contractor's documents and write Verifica_Acme_Srl.xlsx
  verifica-itp --company "Acme Srl" visura.pdf durc.pdf dvr.pdf patente.pdf

  # Full site details, report into ./reports
  verifica-itp --company "Acme Srl" --client "Comune di Roma" \
      --site "Scuola Verdi" --address "Via Roma 1" -o reports *.pdf

  # Machine-readable verdict, no spreadsheet
  verifica-itp --company "Acme Srl" --json --no-report *.pdf

CHECKS:
  visura    Visura camerale, issued within the last 6 months
  durc      DURC currently valid
  dvr       DVR bearing signatures of DL, RSPP, Medico competente, RLS
  patente   Patente a crediti currently valid

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          API key (VITE_GEMINI_API_KEY is also accepted)
  VERIFICA_ITP_MODEL      Override model ID
  VERIFICA_ITP_ENDPOINT   Override API base URL
  VERIFICA_ITP_OUTPUT_DIR Directory for the spreadsheet report
"#;

/// Check construction-site documents for conformity (D.Lgs 81/08).
#[derive(Parser, Debug)]
#[command(
    name = "verifica-itp",
    version,
    about = "Check construction-site documents for conformity (D.Lgs 81/08)",
    long_about = "Send a contractor's documents (Visura, DURC, DVR, Patente a crediti) to a \
document-understanding model, validate its verdict, and export it as an .xlsx report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF documents to check.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Company name (ragione sociale) under review.
    #[arg(short, long, env = "VERIFICA_ITP_COMPANY")]
    company: String,

    /// Client (committente).
    #[arg(long)]
    client: Option<String>,

    /// Construction site name.
    #[arg(long)]
    site: Option<String>,

    /// Construction site address.
    #[arg(long)]
    address: Option<String>,

    /// Directory the .xlsx report is written into.
    #[arg(short, long, env = "VERIFICA_ITP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Skip writing the spreadsheet report.
    #[arg(long)]
    no_report: bool,

    /// Print the verdict as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Model ID.
    #[arg(long, env = "VERIFICA_ITP_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API base URL.
    #[arg(long, env = "VERIFICA_ITP_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// API key. Falls back to GEMINI_API_KEY / VITE_GEMINI_API_KEY.
    #[arg(long, hide_env_values = true, env = "VERIFICA_ITP_API_KEY")]
    api_key: Option<String>,

    /// Request timeout in seconds (default: none).
    #[arg(long, env = "VERIFICA_ITP_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to a text file with a replacement prompt ({company} is substituted).
    #[arg(long)]
    prompt: Option<PathBuf>,

    /// Maximum files read concurrently.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the verdict.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and context ─────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress).await?;

    let mut context = AnalysisRequestContext::new(cli.company.clone());
    context.committente = cli.client.clone();
    context.site_name = cli.site.clone();
    context.site_address = cli.address.clone();

    let files: Vec<InputFile> = cli.files.iter().map(InputFile::from_path).collect();

    // ── Run analysis ─────────────────────────────────────────────────────
    let output = match analyze(&context, &files, &config).await {
        Ok(output) => output,
        Err(e) => return Ok(fail(&e)),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output.result)
            .context("Failed to serialise result")?;
        println!("{json}");
    } else {
        print_summary(&output, cli.quiet);
    }

    // ── Report ───────────────────────────────────────────────────────────
    if !cli.no_report {
        let mut options = ReportOptions::default();
        if let Some(ref dir) = cli.output_dir {
            options = options.output_dir(dir);
        }
        match download_report(&output.result, &context, &options).await {
            Ok(path) => {
                if !cli.quiet {
                    eprintln!("{} Report: {}", green("✔"), bold(&path.display().to_string()));
                }
            }
            Err(e) => return Ok(fail(&e)),
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Print the user-facing message (detail goes to the log) and pick an exit code.
fn fail(e: &VerificaError) -> ExitCode {
    tracing::debug!("analysis failed: {e:?}");
    eprintln!("{} {}", red("✘"), e.user_message());
    ExitCode::FAILURE
}

fn print_summary(output: &AnalysisOutput, quiet: bool) {
    let result = &output.result;
    let verdict = if result.conformita_generale {
        green("✔ CONFORME")
    } else {
        red("✘ NON CONFORME")
    };
    println!("{} {}", bold("Esito Analisi:"), verdict);

    for (key, outcome) in &result.documenti {
        let mark = if outcome.conforme {
            green("✓")
        } else {
            yellow("⚠")
        };
        println!(
            "  {} {:<10} {:<13} {}",
            mark,
            key.to_uppercase(),
            outcome_label(outcome.conforme),
            outcome.note
        );
    }
    if !result.note_finali.is_empty() {
        println!("{} {}", bold("Note finali:"), result.note_finali);
    }

    if !quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "{} file, {} KB inviati, {}ms totali",
                output.stats.files,
                output.stats.encoded_bytes / 1024,
                output.stats.total_duration_ms
            ))
        );
    }
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .model(&cli.model)
        .endpoint(&cli.endpoint)
        .encode_concurrency(cli.concurrency);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_override(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
