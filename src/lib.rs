//! # docqa
//!
//! A retrieval-augmented document question-answering service.
//!
//! Users upload PDF or plain-text documents; docqa extracts and chunks the
//! text, embeds the chunks into a local SQLite vector index, archives the
//! original bytes to S3-compatible object storage, and answers questions by
//! retrieving relevant chunks and forwarding them — together with the
//! session's conversation history — to a hosted LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌──────────────────────┐   ┌───────────┐
//! │ Upload │──▶│ Extract→Chunk→Embed   │──▶│  SQLite   │
//! │pdf/txt │   │      (pipeline)       │   │  vectors  │
//! └───┬────┘   └──────────────────────┘   └─────┬─────┘
//!     │ raw bytes (independent)                 │ top-k
//!     ▼                                         ▼
//! ┌────────┐   ┌──────────────────────┐   ┌───────────┐
//! │   S3   │   │ Query → retrieve →    │◀──│  history  │
//! │archive │   │ prompt → LLM → record │   │ (memory)  │
//! └────────┘   └──────────────────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init                          # create database
//! docqa ingest ./report.pdf           # extract, chunk, embed, index, archive
//! docqa search "revenue forecast"     # inspect retrieval
//! docqa ask "What does the report say about revenue?"
//! docqa serve                         # HTTP: /upload, /query, /files, /health
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF/TXT text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | SQLite-backed vector index |
//! | [`memory`] | Conversation history |
//! | [`llm`] | Chat-completions client |
//! | [`answer`] | Retrieve → prompt → call → record |
//! | [`pipeline`] | Ingestion and archival orchestration |
//! | [`storage`] | S3 archival client |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod storage;
