//! CLI binary for medimg-report.
//!
//! `medimg serve` runs the web shell; `medimg analyze <image>` runs a single
//! analysis and prints the report. Both map flags onto `AnalysisConfig` and
//! fail before doing anything if no credential is available.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use medimg_report::{
    analyze_to_file_as, serve, AnalysisConfig, AnalysisOutcome, AnalysisProgressCallback,
    AnalysisStage, Analyzer, OutputFormat, ProgressCallback, ServerConfig,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the pipeline stages of a single analysis.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, source: &str) {
        self.bar.set_message(source.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_stage(&self, stage: AnalysisStage) {
        let prefix = match stage {
            AnalysisStage::Requesting => "🔍 Analyzing the image... This may take a moment.".to_string(),
            other => other.to_string(),
        };
        self.bar.set_prefix(prefix);
    }

    fn on_analysis_complete(&self, success: bool, elapsed_ms: u64) {
        self.bar.finish_and_clear();
        let secs = dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0));
        if success {
            eprintln!("{} {}  {}", green("✔"), bold("Analysis complete!"), secs);
        } else {
            eprintln!("{} {}  {}", red("✘"), bold("Analysis did not produce a report"), secs);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the web interface on http://127.0.0.1:8501
  medimg serve

  # Listen on all interfaces with a 50 MiB upload limit
  medimg serve --bind 0.0.0.0:8501 --max-upload-mb 50

  # Analyze one image and print the report
  medimg analyze chest_xray.png

  # Write the report to a file, no web search
  medimg --no-web-search analyze knee_mri.jpg -o report.md

  # Use another vision provider through edgequake-llm
  medimg --provider openai --model gpt-4.1 analyze ct_scan.bmp

SUPPORTED FORMATS:
  JPG, JPEG, PNG, BMP, GIF. Images are resized to 500 px wide before upload.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY        Gemini API key (required for the default provider)
  GEMINI_API_KEY        Accepted when GOOGLE_API_KEY is not set
  MEDIMG_PROVIDER       Provider: gemini (default), openai, anthropic, ollama, …
  MEDIMG_MODEL          Model ID (default: gemini-2.0-flash-exp)
  MEDIMG_BIND           Listen address for `serve`
  RUST_LOG              Log filter, overrides -v / -q

DISCLAIMER:
  Reports are AI-generated and must be reviewed by a qualified healthcare
  professional before any clinical decision is made.
"#;

/// Analyze medical images with a multimodal model.
#[derive(Parser, Debug)]
#[command(
    name = "medimg",
    version,
    about = "Analyze medical images (X-ray, MRI, CT, ultrasound) with a multimodal model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    analysis: AnalysisArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MEDIMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MEDIMG_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct AnalysisArgs {
    /// API key for the analysis capability.
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Provider: gemini (default), openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "MEDIMG_PROVIDER")]
    provider: Option<String>,

    /// Model ID (default: gemini-2.0-flash-exp).
    #[arg(long, global = true, env = "MEDIMG_MODEL")]
    model: Option<String>,

    /// Width in pixels images are resized to (100–4096).
    #[arg(long, global = true, env = "MEDIMG_WIDTH", default_value_t = 500,
          value_parser = clap::value_parser!(u32).range(100..=4096))]
    width: u32,

    /// Don't let the model search the web for the research section.
    #[arg(long, global = true, env = "MEDIMG_NO_WEB_SEARCH")]
    no_web_search: bool,

    /// Path to a text file replacing the built-in analysis prompt.
    #[arg(long, global = true, env = "MEDIMG_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0). Provider default if unset.
    #[arg(long, global = true, env = "MEDIMG_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Provider default if unset.
    #[arg(long, global = true, env = "MEDIMG_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Gemini API base URL.
    #[arg(long, global = true, env = "MEDIMG_API_BASE_URL")]
    api_base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web interface.
    Serve {
        /// Listen address.
        #[arg(long, env = "MEDIMG_BIND", default_value = "127.0.0.1:8501")]
        bind: SocketAddr,

        /// Maximum upload size in MiB.
        #[arg(long, env = "MEDIMG_MAX_UPLOAD_MB", default_value_t = 20)]
        max_upload_mb: usize,
    },
    /// Analyze one image and print the report.
    Analyze {
        /// JPG, JPEG, PNG, BMP or GIF file.
        image: PathBuf,

        /// Write the report to this file instead of stdout.
        #[arg(short, long, env = "MEDIMG_OUTPUT")]
        output: Option<PathBuf>,

        /// Emit the outcome as JSON (to stdout, or to --output).
        #[arg(long)]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "MEDIMG_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // `serve` logs at info by default; a one-shot `analyze` keeps quiet so
    // the spinner is the only thing on stderr.
    let show_progress = matches!(
        cli.command,
        Command::Analyze { json: false, no_progress: false, .. }
    ) && !cli.quiet;
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
        Command::Serve {
            bind,
            max_upload_mb,
        } => {
            let config = build_config(&cli.analysis, None).await?;
            let analyzer = Analyzer::new(config).context("Cannot start analysis service")?;
            let server = ServerConfig {
                bind,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            };
            if !cli.quiet {
                eprintln!(
                    "{} {}  {}",
                    green("◆"),
                    bold("Medical Image Analysis Tool"),
                    dim(&format!("http://{bind}"))
                );
            }
            serve(Arc::new(analyzer), server)
                .await
                .context("Server failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze {
            image,
            output,
            json,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli.analysis, progress).await?;
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Markdown
            };

            let outcome = if let Some(ref path) = output {
                let outcome = analyze_to_file_as(&image, path, format, &config)
                    .await
                    .context("Analysis failed")?;
                if !cli.quiet && outcome.is_report() {
                    eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
                }
                outcome
            } else {
                let analyzer = Analyzer::new(config).context("Cannot start analysis")?;
                let outcome = analyzer
                    .analyze_path(&image)
                    .await
                    .context("Analysis failed")?;
                print_outcome(&outcome, format)?;
                outcome
            };

            if let AnalysisOutcome::Report(ref r) = outcome {
                if !cli.quiet && !json {
                    eprintln!(
                        "   {} tokens in  /  {} tokens out  —  {}ms  ({})",
                        dim(&r.stats.input_tokens.to_string()),
                        dim(&r.stats.output_tokens.to_string()),
                        r.stats.duration_ms,
                        r.stats.model,
                    );
                }
                Ok(ExitCode::SUCCESS)
            } else {
                if output.is_some() && !cli.quiet {
                    eprintln!("{}", red(&outcome.display_text()));
                }
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn print_outcome(outcome: &AnalysisOutcome, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Markdown && !outcome.is_report() {
        eprintln!("{}", red(&outcome.display_text()));
        return Ok(());
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(outcome.render(format)?.as_bytes())
        .context("Failed to write to stdout")?;
    if let (OutputFormat::Markdown, Some(report)) = (format, outcome.report()) {
        if !report.sources.is_empty() {
            writeln!(handle, "\nSources:").context("Failed to write to stdout")?;
            for s in &report.sources {
                writeln!(handle, "- {} <{}>", s.title, s.uri)
                    .context("Failed to write to stdout")?;
            }
        }
    }
    handle.flush().context("Failed to write to stdout")
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(
    args: &AnalysisArgs,
    progress: Option<ProgressCallback>,
) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .target_width(args.width)
        .web_search(!args.no_web_search);

    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok());
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref path) = args.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(ref url) = args.api_base_url {
        builder = builder.api_base_url(url);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
