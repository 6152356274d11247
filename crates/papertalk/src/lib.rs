//! # PaperTalk
//!
//! Chat with a single document. PaperTalk extracts text from a PDF, DOCX,
//! plain-text, or Markdown file, splits it into overlapping chunks, embeds
//! them, and answers questions by retrieving the most similar chunks and
//! handing them to a language model with an instruction to answer only
//! from that context.
//!
//! The pipeline itself lives in `papertalk-core`; this crate supplies the
//! configuration, extraction, model backends, SQLite index persistence,
//! and the `ptalk` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Extractor   │──▶│ Chunk+Embed  │──▶│ SQLite index │
//! │ PDF/DOCX/TXT │   │ (Embedder)   │   │ (reloadable) │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │   Session    │──▶│  Generator   │
//!                    │ ask / chat   │   │ OpenAI/Ollama│
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ptalk extract report.pdf                 # print normalized text
//! ptalk index report.pdf                   # embed and save the index
//! ptalk ask report.pdf "Who wrote it?"     # one question
//! ptalk chat report.pdf --transcript t.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`embedding`] | Embedding backends |
//! | [`generation`] | Language model backends |
//! | [`db`] | Database connection and schema |
//! | [`index_store`] | Saving and reloading indexes |
//! | [`pipeline`] | Document loading for the commands |
//! | [`ask`] / [`chat`] / [`index_cmd`] | CLI commands |

pub mod ask;
pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
mod http;
pub mod index_cmd;
pub mod index_store;
pub mod pipeline;
