//! # PaperTalk CLI (`ptalk`)
//!
//! Ask questions about a PDF, DOCX, TXT, or Markdown document.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ptalk extract <file>` | Print the document's normalized text |
//! | `ptalk index <file>...` | Chunk, embed, and save one index over the documents |
//! | `ptalk ask <file>... "<question>"` | Answer one question |
//! | `ptalk chat <file>...` | Interactive question loop (`exit`, `quit`, or Ctrl-C to leave) |
//!
//! ## Examples
//!
//! ```bash
//! # Local models through Ollama (the default)
//! ptalk ask ./paper.pdf "What dataset was used?"
//!
//! # Hosted models, with the supporting chunks printed
//! ptalk ask ./paper.pdf "What dataset was used?" --show-evidence --config ./config/openai.toml
//!
//! # Chat over two documents, saving the conversation afterwards
//! ptalk chat ./handbook.docx ./faq.md --transcript ./handbook-chat.json
//! ```
//!
//! Logs go to stderr (`--verbose` or `RUST_LOG` to see more); answers go to
//! stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use papertalk::config;
use papertalk::extract::extract_file;
use papertalk::{ask, chat, index_cmd};

/// PaperTalk: chat with your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ptalk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ptalk",
    about = "PaperTalk: chat with your documents",
    version,
    long_about = "PaperTalk extracts text from a PDF, DOCX, TXT, or Markdown file, embeds it, \
    and answers questions using only the passages most similar to each question."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ptalk.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/ptalk.toml")]
    config: PathBuf,

    /// Log pipeline progress to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized text of a document.
    Extract {
        /// Document to read (.pdf, .docx, .txt, .md).
        file: PathBuf,
    },

    /// Build and save one embedding index over one or more documents.
    ///
    /// Any index previously saved at the same path is replaced.
    Index {
        /// Documents to index (.pdf, .docx, .txt, .md).
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Index database path (overrides `[index].path`).
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Answer a single question about one or more documents.
    ///
    /// Reuses the saved index when it was built from the same documents,
    /// chunking, and embedding model; otherwise builds and saves a new one.
    Ask {
        /// Documents to search; the last positional argument is the question.
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        question: String,

        /// Index database path (overrides `[index].path`).
        #[arg(long)]
        index: Option<PathBuf>,

        /// Re-embed the document even if a matching index is saved.
        #[arg(long)]
        rebuild: bool,

        /// Print the chunks the answer was drawn from.
        #[arg(long)]
        show_evidence: bool,
    },

    /// Ask questions interactively, one per line.
    ///
    /// Blank lines are ignored. `exit`, `quit`, Ctrl-C, or end of input
    /// ends the session.
    Chat {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Index database path (overrides `[index].path`).
        #[arg(long)]
        index: Option<PathBuf>,

        /// Re-embed the document even if a matching index is saved.
        #[arg(long)]
        rebuild: bool,

        /// Write the conversation to this JSON file when the session ends.
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Print the chunks each answer was drawn from.
        #[arg(long)]
        show_evidence: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "papertalk=info,papertalk_core=info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli));
    // An interrupted chat leaves a stdin read on the blocking pool; do not
    // wait for it.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Extraction needs no configuration
    if let Commands::Extract { file } = &cli.command {
        println!("{}", extract_file(file).await?);
        return Ok(());
    }

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Index { files, index } => {
            index_cmd::run_index(&cfg, &files, index.as_deref()).await?;
        }
        Commands::Ask {
            files,
            question,
            index,
            rebuild,
            show_evidence,
        } => {
            ask::run_ask(
                &cfg,
                &files,
                &question,
                index.as_deref(),
                rebuild,
                show_evidence,
            )
            .await?;
        }
        Commands::Chat {
            files,
            index,
            rebuild,
            transcript,
            show_evidence,
        } => {
            chat::run_chat(
                &cfg,
                &files,
                index.as_deref(),
                rebuild,
                transcript.as_deref(),
                show_evidence,
            )
            .await?;
        }
    }

    Ok(())
}
