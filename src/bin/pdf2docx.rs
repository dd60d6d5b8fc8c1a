//! CLI binary for edgequake-pdf2docx.
//!
//! A thin shim over the library crate: `convert` maps flags to a
//! `ConversionConfig`, `keys` edits the credential store file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2docx::{
    convert, convert_to_file, ConversionConfig, ConversionInput, ConversionMode,
    ConversionProgressCallback, Credential, CredentialStore, ModelSpec, ProgressCallback,
    RotationStrategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per model attempt.
struct CliProgressCallback {
    bar: ProgressBar,
    attempt_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading source…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            attempt_started: Mutex::new(None),
        })
    }

    fn attempt_elapsed(&self) -> String {
        let secs = self
            .attempt_started
            .lock()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, mode: ConversionMode) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting {mode} conversion…"))
        ));
    }

    fn on_attempt_start(&self, model: &str, attempt: usize, total: usize) {
        *self.attempt_started.lock() = Some(Instant::now());
        self.bar.set_prefix(format!("Extracting {attempt}/{total}"));
        self.bar.set_message(model.to_string());
    }

    fn on_attempt_failed(&self, model: &str, attempt: usize, error: String) {
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error
        };
        self.bar.println(format!(
            "  {} attempt {attempt} {model}  {}  {}",
            red("✗"),
            red(&msg),
            self.attempt_elapsed()
        ));
    }

    fn on_extraction_complete(&self, model: &str, structure_nodes: usize, content_items: usize) {
        self.bar.println(format!(
            "  {} {model}  {}  {}",
            green("✓"),
            dim(&format!("{structure_nodes} blocks, {content_items} runs")),
            self.attempt_elapsed()
        ));
        self.bar.set_prefix("Packaging");
        self.bar.set_message("building DOCX…");
    }

    fn on_fallback(&self, reason: Option<String>) {
        let line = match reason {
            Some(_) => "AI extraction failed, using fallback converter".to_string(),
            None => "no_ocr mode, using fallback converter".to_string(),
        };
        self.bar.println(format!("  {} {line}", cyan("↪")));
        self.bar.set_prefix("Fallback");
        self.bar.set_message("converting…");
    }

    fn on_conversion_complete(&self, _document_uri_len: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a scan next to the source (scan.docx)
  pdf2docx convert scan.pdf

  # Explicit output and model chain
  pdf2docx convert scan.pdf -o out.docx \
      --model gemini/gemini-2.5-flash --model openai/gpt-4.1-mini

  # Skip AI extraction and use the HTTP fallback service
  pdf2docx convert scan.pdf --no-ocr --fallback-url https://convert.example.com/pdf2docx

  # Rotate between several Gemini keys
  pdf2docx keys --store keys.json add main gemini AIza...
  pdf2docx keys --store keys.json add backup gemini AIza...
  pdf2docx convert scan.pdf --keys keys.json

  # Print the ConversionOutput JSON instead of writing a file
  pdf2docx convert scan.pdf --json > output.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (when no --keys store is given)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  PDF2DOCX_MODELS         Comma-separated model chain, e.g. gemini/gemini-2.5-flash,openai/gpt-4.1-mini
  PDF2DOCX_KEYS           Credential store file
  PDF2DOCX_FALLBACK_URL   HTTP fallback converter endpoint
  RUST_LOG                Override log filter (e.g. edgequake_pdf2docx=debug)
"#;

/// Convert scanned PDFs and page images to editable DOCX using multimodal LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert scanned PDFs and page images to editable DOCX using multimodal LLMs",
    long_about = "Convert scanned PDFs and page images (local files, URLs or data URIs) into \
editable DOCX documents. A model extracts headings, paragraphs, lists, tables and styled text as \
validated JSON; the DOCX is then built locally. Models are tried in order, and a non-AI \
converter is used when all of them fail.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2DOCX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document to DOCX.
    Convert(ConvertArgs),
    /// Manage the rotating credential store.
    Keys(KeysArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local file path, HTTP/HTTPS URL or data URI.
    source: String,

    /// Write the DOCX here. Default: the source file name with a .docx extension.
    #[arg(short, long, env = "PDF2DOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// Skip AI extraction and go straight to the fallback converter.
    #[arg(long)]
    no_ocr: bool,

    /// Model to try, as provider/model. Repeat to build the fallback chain.
    #[arg(
        long = "model",
        env = "PDF2DOCX_MODELS",
        value_delimiter = ',',
        long_help = "Model to try, written as provider/model. Repeat (or comma-separate) to \
          build the chain; models are tried in the order given.\n\
          Default: gemini/gemini-2.5-flash, then gemini/gemini-2.0-flash."
    )]
    models: Vec<ModelSpec>,

    /// Credential store file used for Gemini key rotation.
    #[arg(long, env = "PDF2DOCX_KEYS")]
    keys: Option<PathBuf>,

    /// HTTP endpoint of the non-AI fallback converter.
    #[arg(long, env = "PDF2DOCX_FALLBACK_URL")]
    fallback_url: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2DOCX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max model output tokens.
    #[arg(long, env = "PDF2DOCX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "PDF2DOCX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-model-attempt timeout in seconds.
    #[arg(long, env = "PDF2DOCX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2DOCX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Fallback converter timeout in seconds.
    #[arg(long, env = "PDF2DOCX_FALLBACK_TIMEOUT", default_value_t = 300)]
    fallback_timeout: u64,

    /// Print the ConversionOutput JSON to stdout instead of writing a file.
    #[arg(long, env = "PDF2DOCX_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct KeysArgs {
    /// Credential store file (created on first write).
    #[arg(long, env = "PDF2DOCX_KEYS")]
    store: PathBuf,

    #[command(subcommand)]
    action: KeysAction,
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// List stored credentials (keys are masked).
    List,
    /// Add a credential.
    Add {
        id: String,
        provider: String,
        key: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove a credential.
    Remove { id: String },
    /// Put a credential back into rotation.
    Enable { id: String },
    /// Take a credential out of rotation.
    Disable { id: String },
    /// Flag a credential as leaked (or clear the flag with --clear).
    Flag {
        id: String,
        #[arg(long)]
        clear: bool,
    },
    /// Set the rotation interval.
    Strategy {
        #[arg(value_enum)]
        strategy: StrategyArg,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StrategyArg {
    Hourly,
    PerMinute,
}

impl From<StrategyArg> for RotationStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Hourly => RotationStrategy::Hourly,
            StrategyArg::PerMinute => RotationStrategy::PerMinute,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level logs unless --verbose was given.
    let show_progress = match cli.command {
        Command::Convert(ref args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Keys(_) => false,
    };
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

    match cli.command {
        Command::Convert(ref args) => run_convert(args, cli.quiet, show_progress).await,
        Command::Keys(ref args) => run_keys(args),
    }
}

async fn run_convert(args: &ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb).await?;

    let mode = if args.no_ocr {
        ConversionMode::NoOcr
    } else {
        ConversionMode::Ocr
    };
    let input = ConversionInput::new(args.source.clone(), mode);
    let start = Instant::now();

    if args.json {
        let output = convert(&input, &config)
            .await
            .context("Conversion failed")?;
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.source));
    let written = convert_to_file(&input, &output_path, &config)
        .await
        .context("Conversion failed")?;

    if !quiet {
        eprintln!(
            "{}  {}  {:.1}s  →  {}",
            green("✔"),
            dim(&format!("{written} bytes")),
            start.elapsed().as_secs_f64(),
            bold(&output_path.display().to_string()),
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(
    args: &ConvertArgs,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout)
        .fallback_timeout_secs(args.fallback_timeout);

    if !args.models.is_empty() {
        builder = builder.models(args.models.clone());
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref path) = args.keys {
        let store = CredentialStore::open(path)
            .with_context(|| format!("Failed to open credential store {:?}", path))?;
        builder = builder.credentials(Arc::new(store));
    }
    if let Some(ref url) = args.fallback_url {
        builder = builder.fallback_endpoint(url.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `scan.pdf` → `scan.docx`; URLs and data URIs → `<tail>.docx` or `output.docx`.
fn default_output_path(source: &str) -> PathBuf {
    if source.starts_with("data:") {
        return PathBuf::from("output.docx");
    }
    let tail = source
        .split(['?', '#'])
        .next()
        .unwrap_or(source)
        .trim_end_matches('/');
    let stem = Path::new(tail)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or_else(|| "output".to_string());
    if source.starts_with("http://") || source.starts_with("https://") {
        PathBuf::from(format!("{stem}.docx"))
    } else {
        Path::new(source).with_extension("docx")
    }
}

fn run_keys(args: &KeysArgs) -> Result<()> {
    let store = CredentialStore::open(&args.store)
        .with_context(|| format!("Failed to open credential store {:?}", args.store))?;

    match args.action {
        KeysAction::List => {
            let creds = store.list();
            println!(
                "Strategy: {}",
                match store.strategy() {
                    RotationStrategy::Hourly => "hourly",
                    RotationStrategy::PerMinute => "per_minute",
                }
            );
            if creds.is_empty() {
                println!("{}", dim("(no credentials)"));
            }
            for c in creds {
                let status = if c.leaked {
                    red("leaked")
                } else if c.enabled {
                    green("enabled")
                } else {
                    dim("disabled")
                };
                println!(
                    "  {:<16} {:<10} {:<20} {}  {}",
                    c.id,
                    c.provider,
                    c.masked_key(),
                    status,
                    dim(c.label.as_deref().unwrap_or(""))
                );
            }
        }
        KeysAction::Add {
            ref id,
            ref provider,
            ref key,
            ref label,
        } => {
            let mut cred = Credential::new(id.clone(), provider.to_ascii_lowercase(), key.clone());
            cred.label = label.clone();
            store.add(cred).context("Failed to add credential")?;
            eprintln!("{} added '{id}'", green("✔"));
        }
        KeysAction::Remove { ref id } => {
            store.remove(id).context("Failed to remove credential")?;
            eprintln!("{} removed '{id}'", green("✔"));
        }
        KeysAction::Enable { ref id } => {
            store.set_enabled(id, true).context("Failed to enable credential")?;
            eprintln!("{} enabled '{id}'", green("✔"));
        }
        KeysAction::Disable { ref id } => {
            store.set_enabled(id, false).context("Failed to disable credential")?;
            eprintln!("{} disabled '{id}'", green("✔"));
        }
        KeysAction::Flag { ref id, clear } => {
            store.flag_leaked(id, !clear).context("Failed to flag credential")?;
            if clear {
                eprintln!("{} cleared leak flag on '{id}'", green("✔"));
            } else {
                eprintln!("{} flagged '{id}' as leaked", cyan("⚠"));
            }
        }
        KeysAction::Strategy { ref strategy } => {
            store
                .set_strategy(strategy.clone().into())
                .context("Failed to set rotation strategy")?;
            eprintln!("{} rotation strategy updated", green("✔"));
        }
    }
    Ok(())
}
