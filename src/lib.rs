//! # Privy
//!
//! A local AI terminal assistant: natural-language requests in, shell
//! commands or answers out, grounded in a local documentation index.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ docs dir  │──▶│ Chunk+Embed  │──▶│ SQLite index  │
//! │ *.md/*.txt│   │ (generator)  │   │ per provider │
//! └───────────┘   └──────────────┘   └──────┬───────┘
//!                                           │ search
//!                 ┌──────────────┐   ┌──────▼───────┐
//!   request ─────▶│ intent+policy│◀──│ orchestrator │──▶ [[CHECK]] sh -c
//!                 └──────────────┘   └──────┬───────┘
//!                                           ▼
//!                              message | suggestion | error
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! privy index                        # embed the docs directory
//! privy ask "How much RAM is free?"  # one request
//! privy                              # interactive shell
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + `.env` configuration |
//! | [`error`] | Provider and check error types |
//! | [`models`] | Core data types |
//! | [`generator`] | Ollama / Gemini text generation and embeddings |
//! | [`chunk`] | Paragraph chunking |
//! | [`embedding`] | Vector helpers and cosine similarity |
//! | [`store`] | Partitioned chunk storage (SQLite, in-memory) |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`index`] | Retrieval index rebuild and search |
//! | [`intent`] | Coder/admin routing |
//! | [`reply`] | Check directive and code fence parsing |
//! | [`policy`] | Command-versus-message classification |
//! | [`check`] | Read-only diagnostic commands |
//! | [`agent`] | Tool-use orchestration loop |
//! | [`repl`] | Interactive shell |
//! | [`status`] | System dashboard |
//! | [`pm`] | Package install wrapper |

pub mod agent;
pub mod check;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod intent;
pub mod migrate;
pub mod models;
pub mod pm;
pub mod policy;
pub mod repl;
pub mod reply;
pub mod status;
pub mod store;
