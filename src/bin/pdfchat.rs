//! CLI binary for pdfchat.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfchat::{
    inspect, DocumentSession, IndexProgressCallback, PipelineConfig, ProgressCallback,
};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar while the index
/// is built. The bar length is set by `on_index_start` once the document has
/// been chunked; until then a spinner covers download and extraction.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_index_start` (called after chunking, before embedding).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_index_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Embedding");
        self.bar.reset_eta();
    }
}

impl IndexProgressCallback for CliProgressCallback {
    fn on_index_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Embedding {total_chunks} chunks…"))
        ));
    }

    fn on_chunks_embedded(&self, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }

    fn on_cache_hit(&self, chunk_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Reusing cached index ({} chunks, nothing re-embedded)",
            green("✔"),
            bold(&chunk_count.to_string())
        );
    }

    fn on_index_complete(&self, chunk_count: usize, elapsed_ms: u64) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
            eprintln!(
                "{} Indexed {} chunks in {:.1}s",
                green("✔"),
                bold(&chunk_count.to_string()),
                elapsed_ms as f64 / 1000.0
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One question, one answer
  pdfchat ask manual.pdf "What is the warranty period?"

  # Interactive question loop over one document
  pdfchat chat manual.pdf

  # Same, printing the retrieved chunks under every answer
  pdfchat chat manual.pdf --show-sources

  # Pre-build the index so the first real question is instant
  pdfchat index manual.pdf

  # Ask a document straight off the web
  pdfchat ask https://arxiv.org/pdf/1706.03762 "What is multi-head attention?"

  # Inspect PDF metadata (no API key needed)
  pdfchat inspect manual.pdf

  # JSON output for scripting
  pdfchat --json ask manual.pdf "Who is the author?" | jq -r .text

  # Any OpenAI-compatible endpoint (Ollama shown)
  pdfchat --api-base http://localhost:11434/v1 --model llama3.2 \
      --embedding-model nomic-embed-text ask manual.pdf "Summarise section 2"

MODELS:
  Role        Model                              $/1M tokens
  ─────────   ────────────────────────────────   ─────────────
  chat        gpt-4o-mini (default)              $0.15 / $0.60
  chat        gpt-4o                             $2.50 / $10.00
  embedding   text-embedding-3-small (default)   $0.02
  embedding   text-embedding-3-large             $0.13

COST ESTIMATE (100-page document, ~250K characters):
  Indexing: ~310 chunks ≈ 85K embedding tokens — well under $0.01
  Each question: 3 chunks + question ≈ 1K prompt tokens — ~$0.001 with gpt-4o-mini

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            API key (a .env file in the working directory works too)
  PDFCHAT_API_BASE          OpenAI-compatible endpoint base URL
  PDFCHAT_MODEL             Chat model ID
  PDFCHAT_EMBEDDING_MODEL   Embedding model ID
  PDFCHAT_CACHE_DIR         Directory for cached index files

SETUP:
  1. Set API key:   export OPENAI_API_KEY=sk-...     (or put it in .env)
  2. Ask:           pdfchat ask document.pdf "What does section 3 say?"

  The first question on a document embeds it and writes
  {name}.{content-hash}.index.json into the cache directory. Asking the same
  (unchanged) document again loads that file and skips embedding entirely;
  editing the document invalidates the entry automatically because the cache
  is keyed by a hash of the bytes, not the file name.
"#;

/// Ask questions about PDF documents from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Ask questions about PDF documents using retrieval-augmented generation",
    long_about = "Ask questions about PDF documents (local files or URLs) from the command line. \
The document is chunked and embedded once, then each question retrieves the most similar \
chunks and asks a chat model with those chunks as the only permitted evidence. Works with \
OpenAI and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    opts: PipelineOpts,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, global = true, env = "PDFCHAT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDFCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress everything except answers and errors.
    #[arg(short, long, global = true, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question and exit.
    Ask {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// The question to ask about the document.
        question: String,
    },
    /// Interactive question loop over one document.
    Chat {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// Print the retrieved source chunks after each answer.
        #[arg(long)]
        show_sources: bool,
    },
    /// Build (or refresh) the index without asking anything.
    Index {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
    /// Print document metadata. Needs no API key.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
}

/// Flags shared by every subcommand.
#[derive(clap::Args, Debug)]
struct PipelineOpts {
    /// Chat model used to generate answers.
    #[arg(long, global = true, env = "PDFCHAT_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Embedding model for chunks and questions.
    #[arg(
        long,
        global = true,
        env = "PDFCHAT_EMBEDDING_MODEL",
        default_value = "text-embedding-3-small"
    )]
    embedding_model: String,

    /// Base URL of an OpenAI-compatible API.
    #[arg(
        long,
        global = true,
        env = "PDFCHAT_API_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    api_base: String,

    /// API key. Defaults to the OPENAI_API_KEY environment variable.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of chunks retrieved per question.
    #[arg(long, global = true, env = "PDFCHAT_TOP_K", default_value_t = 3)]
    top_k: usize,

    /// Chunk size in characters.
    #[arg(long, global = true, env = "PDFCHAT_CHUNK_SIZE", default_value_t = 1000)]
    chunk_size: usize,

    /// Overlap between consecutive chunks in characters.
    #[arg(long, global = true, env = "PDFCHAT_CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "PDFCHAT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Number of concurrent embedding requests while indexing.
    #[arg(short, long, global = true, env = "PDFCHAT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Directory for cached index files.
    #[arg(long, global = true, env = "PDFCHAT_CACHE_DIR", default_value = ".")]
    cache_dir: PathBuf,

    /// Skip reading and writing the index cache.
    #[arg(long, global = true, env = "PDFCHAT_NO_CACHE")]
    no_cache: bool,

    /// Retries per API call on transient failure.
    #[arg(long, global = true, env = "PDFCHAT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-API-call timeout in seconds.
    #[arg(long, global = true, env = "PDFCHAT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PDFCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap parses, so env-backed flags see its values.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    match cli.command {
        Commands::Ask {
            ref input,
            ref question,
        } => run_ask(input, question, &cli, show_progress).await,
        Commands::Chat {
            ref input,
            show_sources,
        } => run_chat(input, show_sources, &cli, show_progress).await,
        Commands::Index { ref input } => run_index(input, &cli, show_progress).await,
        Commands::Inspect { ref input } => run_inspect(input, &cli).await,
    }
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn run_ask(input: &str, question: &str, cli: &Cli, show_progress: bool) -> Result<()> {
    let config = build_config(cli, progress_callback(show_progress))?;
    let session = DocumentSession::open(input, &config)
        .await
        .context("Failed to open document")?;
    let answer = session
        .ask(question)
        .await
        .context("Failed to answer question")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&answer).context("Failed to serialise answer")?
        );
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(answer.text.as_bytes())
        .context("Failed to write to stdout")?;
    if !answer.text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    drop(handle);

    if !cli.quiet {
        eprintln!();
        print_sources(&answer);
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms",
            dim(&answer.usage.prompt_tokens.to_string()),
            dim(&answer.usage.completion_tokens.to_string()),
            answer.duration_ms,
        );
    }
    Ok(())
}

/// One dimmed `[chunk N · score] preview` line per retrieved source, to stderr.
fn print_sources(answer: &pdfchat::Answer) {
    for source in &answer.sources {
        eprintln!(
            "  {}  {}",
            dim(&format!(
                "[chunk {:>3} · {:.3}]",
                source.ordinal, source.score
            )),
            dim(&source.preview(72))
        );
    }
}

async fn run_chat(input: &str, show_sources: bool, cli: &Cli, show_progress: bool) -> Result<()> {
    let config = build_config(cli, progress_callback(show_progress))?;
    let session = DocumentSession::open(input, &config)
        .await
        .context("Failed to open document")?;

    if !cli.quiet {
        let stats = session.stats();
        eprintln!(
            "{} {}: {} chunks{}",
            green("✔"),
            bold(session.name()),
            stats.chunk_count,
            if stats.cache_hit {
                dim("  (from cache)")
            } else {
                String::new()
            }
        );
        eprintln!(
            "{}",
            dim("Ask anything about the document. \"exit\", Ctrl-C, or Ctrl-D to leave.")
        );
    }

    let mut rl = Editor::<(), DefaultHistory>::new().context("Failed to initialise line editor")?;
    loop {
        match rl.readline("❯ ") {
            Ok(line) => {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question == "exit" || question == "quit" {
                    break;
                }
                let _ = rl.add_history_entry(question);

                match session.ask(question).await {
                    Ok(answer) => {
                        println!("{}", answer.text.trim_end());
                        if show_sources {
                            print_sources(&answer);
                        }
                        if !cli.quiet {
                            eprintln!(
                                "{}",
                                dim(&format!(
                                    "  {} tokens — {:.1}s",
                                    answer.usage.total(),
                                    answer.duration_ms as f64 / 1000.0
                                ))
                            );
                        }
                        println!();
                    }
                    Err(e) => eprintln!("{} {}", red("✗"), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {}", red("✗"), err);
                break;
            }
        }
    }

    if !cli.quiet {
        let usage = session.usage();
        eprintln!(
            "{}",
            dim(&format!(
                "Session: {} model calls, {} tokens total",
                usage.interactions,
                usage.total_tokens()
            ))
        );
    }
    Ok(())
}

async fn run_index(input: &str, cli: &Cli, show_progress: bool) -> Result<()> {
    let config = build_config(cli, progress_callback(show_progress))?;
    let session = DocumentSession::open(input, &config)
        .await
        .context("Indexing failed")?;
    let stats = session.stats();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet && !show_progress {
        // With the progress bar active the callback already printed the
        // summary line.
        eprintln!(
            "Indexed {} chunks ({}-dim, {})",
            stats.chunk_count,
            stats.dimension,
            if stats.cache_hit { "cached" } else { "fresh" }
        );
        if let Some(ref path) = stats.cache_path {
            eprintln!("  {}", dim(&path.display().to_string()));
        }
    }
    Ok(())
}

async fn run_inspect(input: &str, cli: &Cli) -> Result<()> {
    let config = build_config(cli, None)?;
    let meta = inspect(input, &config)
        .await
        .context("Failed to inspect PDF")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
    } else {
        println!("File:         {}", input);
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = meta.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        println!("Encrypted:    {}", meta.encrypted);
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
    }
    Ok(())
}

// ── Config assembly ──────────────────────────────────────────────────────────

fn progress_callback(show_progress: bool) -> Option<ProgressCallback> {
    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn IndexProgressCallback>)
    } else {
        None
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let opts = &cli.opts;
    let mut builder = PipelineConfig::builder()
        .model(&opts.model)
        .embedding_model(&opts.embedding_model)
        .api_base(&opts.api_base)
        .chunk_size(opts.chunk_size)
        .chunk_overlap(opts.chunk_overlap)
        .top_k(opts.top_k)
        .temperature(opts.temperature)
        .concurrency(opts.concurrency)
        .max_retries(opts.max_retries)
        .api_timeout_secs(opts.api_timeout)
        .download_timeout_secs(opts.download_timeout)
        .cache_dir(&opts.cache_dir)
        .use_cache(!opts.no_cache);

    if let Some(ref key) = opts.api_key {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_accepts_show_sources() {
        let cli = Cli::try_parse_from(["pdfchat", "chat", "doc.pdf", "--show-sources"]).unwrap();
        match cli.command {
            Commands::Chat { show_sources, .. } => assert!(show_sources),
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn show_sources_is_off_by_default() {
        let cli = Cli::try_parse_from(["pdfchat", "chat", "doc.pdf"]).unwrap();
        match cli.command {
            Commands::Chat { show_sources, .. } => assert!(!show_sources),
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn ask_takes_input_and_question() {
        let cli = Cli::try_parse_from(["pdfchat", "ask", "doc.pdf", "what?"]).unwrap();
        match cli.command {
            Commands::Ask { input, question } => {
                assert_eq!(input, "doc.pdf");
                assert_eq!(question, "what?");
            }
            other => panic!("expected ask, got {other:?}"),
        }
    }
}
