//! CLI binary for edgequake-docreview.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReviewConfig` and prints or saves the resulting table.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docreview::credential;
use edgequake_docreview::output::{self, OutputFormat};
use edgequake_docreview::{
    review, review_to_file, ReviewConfig, ReviewError, ReviewObserver, VersionMarkers,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Spinner that narrates attempts and backoff waits.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Reviewing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ReviewObserver for CliObserver {
    fn on_review_start(&self, documents: usize) {
        self.bar.set_message(format!("{documents} documents"));
    }

    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        self.bar
            .set_message(format!("attempt {attempt}/{max_attempts}, waiting for the model…"));
    }

    fn on_attempt_failed(&self, attempt: u32, max_attempts: u32, error: &ReviewError) {
        let msg = error.to_string();
        let msg = match msg.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &msg[..cut]),
            None => msg,
        };
        self.bar.println(format!(
            "  {} Attempt {attempt}/{max_attempts}  {}",
            red("✗"),
            red(&msg)
        ));
    }

    fn on_retry_scheduled(&self, next_attempt: u32, delay: Duration) {
        self.bar.set_message(format!(
            "retrying in {}s (attempt {next_attempt})",
            delay.as_secs()
        ));
    }

    fn on_review_complete(&self, rows: usize, attempts: u32) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} rows extracted  {}",
            green("✔"),
            bold(&rows.to_string()),
            dim(&format!("({attempts} attempt(s))"))
        );
    }

    fn on_review_failed(&self, attempts: u32, _error: &ReviewError) {
        self.bar.finish_and_clear();
        eprintln!("{} Review failed after {attempts} attempt(s)", red("✘"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review a requirements spec against two design versions (table to stdout)
  docreview requirements.md design_V6.pdf design_V7.pdf

  # Save round three as 第三回.json
  docreview --round 3 --output-dir results/ requirements.md design_V7.pdf

  # Markdown table, custom prompt, faster model
  docreview --format markdown --prompt review_prompt.txt \
            --model gemini-2.5-flash --output-dir results/ docs/*.pdf

  # Use an edgequake-llm chat provider instead of Gemini
  docreview --provider openai --model gpt-4.1 --api-key "$OPENAI_API_KEY" spec.md

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          API key (same as --api-key)
  DOCREVIEW_MODEL         Model ID
  DOCREVIEW_PASSWORD      Password for encrypted PDFs (same as --password)
  PDFIUM_LIB_PATH         Path to libpdfium, used for PDF inputs
  RUST_LOG                Overrides the log filter
"#;

/// Review design documents against their requirements with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docreview",
    version,
    about = "Review design documents against their requirements with an LLM",
    long_about = "Concatenate requirement and design documents (PDF or Markdown), ask a \
structured-output model for a requirement-by-requirement review table, and print or save it.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Documents to review, in order (PDF, Markdown or plain text).
    #[arg(required = true)]
    documents: Vec<PathBuf>,

    /// Path to a text file containing the review instructions.
    #[arg(long, env = "DOCREVIEW_PROMPT")]
    prompt: Option<PathBuf>,

    /// API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Password for encrypted PDF inputs.
    #[arg(long, env = "DOCREVIEW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Model ID (e.g. gemini-2.5-pro, gemini-2.5-flash).
    #[arg(long, env = "DOCREVIEW_MODEL", default_value = "gemini-2.5-pro")]
    model: String,

    /// edgequake-llm chat provider (openai, anthropic, ollama, …). Default: native Gemini.
    #[arg(long, env = "DOCREVIEW_PROVIDER")]
    provider: Option<String>,

    /// Total attempts before giving up.
    #[arg(long, env = "DOCREVIEW_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Wait before the first retry, in milliseconds (doubles each retry).
    #[arg(long, env = "DOCREVIEW_RETRY_DELAY_MS", default_value_t = 3000)]
    retry_delay_ms: u64,

    /// Output-token ceiling for the review table.
    #[arg(long, env = "DOCREVIEW_MAX_OUTPUT_TOKENS", default_value_t = 65_536)]
    max_output_tokens: u32,

    /// Review round, used to name the saved file (1 → 第一回).
    #[arg(long, env = "DOCREVIEW_ROUND", default_value_t = 1)]
    round: u32,

    /// Save the table in this directory instead of printing it.
    #[arg(short, long, env = "DOCREVIEW_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Format of the saved or printed table.
    #[arg(long, env = "DOCREVIEW_FORMAT", value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Directory for debug artifacts (normalized text, request, raw response).
    #[arg(long, env = "DOCREVIEW_DEBUG_DIR", default_value = "output/debug")]
    debug_dir: PathBuf,

    /// Do not write debug artifacts.
    #[arg(long, env = "DOCREVIEW_NO_DEBUG")]
    no_debug: bool,

    /// Version number marking the previous design in filenames (…_V6.pdf).
    #[arg(long, env = "DOCREVIEW_PREVIOUS_VERSION", default_value_t = 6)]
    previous_version: u32,

    /// Version number marking the current design in filenames (…_V7.pdf).
    #[arg(long, env = "DOCREVIEW_CURRENT_VERSION", default_value_t = 7)]
    current_version: u32,

    /// Print the full output (table + stats) as JSON on stdout.
    #[arg(long, env = "DOCREVIEW_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCREVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCREVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCREVIEW_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs while it is active.
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

    if let Some(ref key) = cli.api_key {
        if !credential::is_plausible(key) && !cli.quiet {
            eprintln!(
                "{} The API key looks unset or too short; requests will likely fail",
                yellow("⚠")
            );
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let observer: Option<Arc<dyn ReviewObserver>> = if show_progress {
        Some(CliObserver::new() as Arc<dyn ReviewObserver>)
    } else {
        None
    };
    let config = build_config(&cli, observer).await?;

    // ── Run review ───────────────────────────────────────────────────────
    let format: OutputFormat = cli.format.into();
    if let Some(ref dir) = cli.output_dir {
        let (output, path) = review_to_file(&cli.documents, dir, cli.round, format, &config)
            .await
            .context("Review failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} rows ({} open)  {}ms  →  {}",
                green("✔"),
                output.stats.rows,
                output::open_findings(&output.table).count(),
                output.stats.duration_ms,
                bold(&path.display().to_string()),
            );
        }
    } else {
        let output = review(&cli.documents, &config)
            .await
            .context("Review failed")?;

        let text = if cli.json {
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        } else {
            output::render(&output.table, format).context("Failed to render table")?
        };
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }

        if !cli.quiet && !show_progress {
            eprintln!(
                "Reviewed {} documents: {} rows ({} open) in {}ms",
                output.stats.documents,
                output.stats.rows,
                output::open_findings(&output.table).count(),
                output.stats.duration_ms
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ReviewConfig`.
async fn build_config(
    cli: &Cli,
    observer: Option<Arc<dyn ReviewObserver>>,
) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .model(cli.model.clone())
        .max_attempts(cli.max_attempts)
        .retry_base_delay_ms(cli.retry_delay_ms)
        .max_output_tokens(cli.max_output_tokens)
        .version_markers(VersionMarkers {
            previous: cli.previous_version,
            current: cli.current_version,
        });

    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read review prompt from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if !cli.no_debug {
        builder = builder.diagnostics_dir(cli.debug_dir.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}
