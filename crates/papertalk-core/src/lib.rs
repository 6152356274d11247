//! # PaperTalk Core
//!
//! Backend-agnostic logic for chatting with a document: data models,
//! text normalization, chunking, the vector store abstraction, the
//! embedding index, retrieval, answer synthesis, and conversation
//! sessions.
//!
//! This crate contains no HTTP clients, filesystem I/O, or SQLite. Model
//! access goes through two narrow capabilities, [`embedding::Embedder`]
//! and [`synth::Generator`], whose concrete implementations live in the
//! `papertalk` app crate.
//!
//! ## Data Flow
//!
//! ```text
//! NormalizedText ──▶ chunk::split_text ──▶ index::Index::build
//!                                               │
//!          ┌────────────────────────────────────┘
//!          ▼
//!   session::Session::ask ──▶ retrieve::Retriever ──▶ synth::Synthesizer
//!          │                                                │
//!          └──────────── ConversationHistory ◀──────────────┘
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod normalize;
pub mod retrieve;
pub mod session;
pub mod store;
pub mod synth;

pub use error::{PipelineError, Result};
