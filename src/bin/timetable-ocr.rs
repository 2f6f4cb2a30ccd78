//! CLI binary for timetable-ocr.
//!
//! `serve` runs the HTTP service; `extract` runs the same pipeline on one
//! local file and prints the result, which is handy for checking credentials
//! and prompt changes without an HTTP client.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use timetable_ocr::{
    build_collaborators, serve, AppState, ServiceConfig, SupportedMime, TimetableHandler,
    TimetableResult,
};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the service on port 4000 with Vertex AI
  GCP_PROJECT_ID=my-project timetable-ocr serve

  # Use an OpenAI model for the extraction step instead of Vertex AI
  TIMETABLE_LLM_PROVIDER=openai TIMETABLE_LLM_MODEL=gpt-4.1-mini timetable-ocr serve

  # Extract one local file and print the JSON result
  timetable-ocr extract week.png

  # Upload to a running service
  curl -F "file=@week.pdf;type=application/pdf" http://localhost:4000/api/upload-timetable

AUTHENTICATION:
  Cloud Vision and Vertex AI calls use, in order of preference:
    GCP_API_KEY                 API key passed as ?key=
    GOOGLE_OAUTH_ACCESS_TOKEN   bearer token (e.g. `gcloud auth print-access-token`)
    GCE metadata server         when running on Google Cloud

  A .env file in the working directory is loaded before flags are parsed.
"#;

/// Timetable OCR + LLM extraction service.
#[derive(Parser, Debug)]
#[command(
    name = "timetable-ocr",
    version,
    about = "Extract structured timetable blocks from PDFs, DOCX files and images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: ConfigArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TIMETABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TIMETABLE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve,

    /// Process one local file and print the result as JSON.
    Extract {
        /// Path to a PDF, DOCX, PNG or JPEG file.
        file: PathBuf,

        /// MIME type to submit; guessed from the extension if omitted.
        #[arg(long)]
        mime: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Bind address.
    #[arg(long, global = true, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Service port.
    #[arg(long, global = true, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Google Cloud project for Vertex AI.
    #[arg(long, global = true, env = "GCP_PROJECT_ID")]
    project_id: Option<String>,

    /// Vertex AI region.
    #[arg(long, global = true, env = "GCP_LOCATION", default_value = "us-central1")]
    location: String,

    /// Vertex AI model id.
    #[arg(long, global = true, env = "VERTEX_MODEL", default_value = "gemini-1.5-flash")]
    model: String,

    /// edgequake-llm provider replacing Vertex AI (openai, anthropic, gemini, ollama, auto).
    #[arg(long, global = true, env = "TIMETABLE_LLM_PROVIDER")]
    llm_provider: Option<String>,

    /// Model id for --llm-provider.
    #[arg(long, global = true, env = "TIMETABLE_LLM_MODEL")]
    llm_model: Option<String>,

    /// Google API key.
    #[arg(long, global = true, env = "GCP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Pre-minted OAuth access token.
    #[arg(long, global = true, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Directory for staged uploads.
    #[arg(long, global = true, env = "UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Upload size ceiling in bytes.
    #[arg(long, global = true, env = "MAX_UPLOAD_BYTES", default_value_t = timetable_ocr::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "TIMETABLE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Completion length ceiling in tokens.
    #[arg(long, global = true, env = "TIMETABLE_MAX_OUTPUT_TOKENS", default_value_t = 2048)]
    max_output_tokens: usize,

    /// Provider HTTP timeout in seconds.
    #[arg(long, global = true, env = "TIMETABLE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Leading PDF pages sent to OCR (1–5).
    #[arg(long, global = true, env = "OCR_PDF_MAX_PAGES", default_value_t = 5)]
    ocr_pdf_max_pages: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before clap reads `env = ...` defaults.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    let config = build_config(&cli.config).context("Invalid configuration")?;

    match cli.command {
        Command::Serve => {
            let state =
                AppState::from_config(&config).context("Failed to initialise providers")?;
            serve(&config, state).await.context("Server error")?;
        }
        Command::Extract { file, mime } => {
            let result = extract_one(&config, file, mime).await?;
            let json =
                serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
            println!("{json}");
            if !cli.quiet {
                print_summary(&result);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(args: &ConfigArgs) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .host(&args.host)
        .port(args.port)
        .location(&args.location)
        .model(&args.model)
        .upload_dir(&args.upload_dir)
        .max_upload_bytes(args.max_upload_bytes)
        .temperature(args.temperature)
        .max_output_tokens(args.max_output_tokens)
        .api_timeout_secs(args.api_timeout)
        .ocr_pdf_max_pages(args.ocr_pdf_max_pages);

    if let Some(ref p) = args.project_id {
        builder = builder.project_id(p);
    }
    if let Some(ref p) = args.llm_provider {
        builder = builder.llm_provider(p);
    }
    if let Some(ref m) = args.llm_model {
        builder = builder.llm_model(m);
    }
    if let Some(ref k) = args.api_key {
        builder = builder.api_key(k);
    }
    if let Some(ref t) = args.access_token {
        builder = builder.access_token(t);
    }

    Ok(builder.build()?)
}

async fn extract_one(
    config: &ServiceConfig,
    file: PathBuf,
    mime: Option<String>,
) -> Result<TimetableResult> {
    if !file.is_file() {
        bail!("File not found: {}", file.display());
    }
    let mime = match mime {
        Some(m) => SupportedMime::from_mime(&m)
            .with_context(|| format!("Unsupported MIME type '{m}'"))?,
        None => SupportedMime::from_path(&file).with_context(|| {
            format!(
                "Cannot guess the type of {}; pass --mime",
                file.display()
            )
        })?,
    };

    let (recognizer, model) =
        build_collaborators(config).context("Failed to initialise providers")?;
    let handler = TimetableHandler::new(recognizer, model, config.generation_config());
    let blocks = handler
        .extract_file(&file, mime.as_str())
        .await
        .context("Extraction failed")?;

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    Ok(TimetableResult {
        file_name,
        mime_type: mime.as_str().to_string(),
        blocks,
    })
}

fn print_summary(result: &TimetableResult) {
    eprintln!("{} blocks from {}", result.blocks.len(), result.file_name);
    for block in result.typed_blocks() {
        eprintln!(
            "  {:<3}  {:>5}-{:<5}  {:<20}  {:<12}  {}",
            block.day_of_week.map(|d| d.as_str()).unwrap_or("?"),
            block.start_time.as_deref().unwrap_or("?"),
            block.end_time.as_deref().unwrap_or("?"),
            block.subject.as_deref().unwrap_or("-"),
            block.room.as_deref().unwrap_or("-"),
            block.teacher.as_deref().unwrap_or("-"),
        );
    }
}
