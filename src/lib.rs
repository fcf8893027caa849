//! # Concierge
//!
//! **A retrieval-augmented assistant for personal websites.**
//!
//! Concierge answers visitor questions from a small personal knowledge
//! base: documents are chunked and embedded into a SQLite-backed vector
//! store, each incoming question retrieves its nearest chunks, and an
//! OpenAI-compatible chat model generates a grounded reply. Repeated
//! questions are served from a disk cache instead of the model, and the
//! model can call tools to record contact leads and questions it could not
//! answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐
//! │ Knowledge │──▶│   Indexer     │──▶│  SQLite    │
//! │ PDF/text  │   │ chunk+embed  │   │ vectors   │
//! └───────────┘   └──────────────┘   └─────┬─────┘
//!                                          │
//!        visitor message                   ▼
//!        ┌─────────┐   ┌───────────┐   ┌──────────┐
//!        │   CLI   │──▶│ Assistant │◀─▶│ Retriever │
//!        └─────────┘   └─────┬─────┘   └──────────┘
//!                      cache │ tools
//!                ┌───────────┼────────────┐
//!                ▼           ▼            ▼
//!           ┌─────────┐ ┌─────────┐ ┌──────────┐
//!           │ Response │ │  LLM    │ │ Leads /  │
//!           │  cache   │ │ service │ │  gaps    │
//!           └─────────┘ └─────────┘ └──────────┘
//! ```
//!
//! ## Request flow
//!
//! 1. The [`retrieve`] module asks the [`store`] for the nearest chunks and
//!    formats them into a grounding block (or a sentinel when nothing
//!    relevant exists).
//! 2. The [`cache`] is consulted with a digest of (message, context); a hit
//!    skips generation entirely.
//! 3. The [`chat`] orchestrator drives the model through the [`llm`]
//!    client; tool-call turns are executed by the [`tools`] registry
//!    (recording leads and knowledge gaps via [`leads`], notifying through
//!    [`notify`]) until the model produces a final answer.
//! 4. The answer is sanitized, cached, and returned.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types: chunks, messages, tool calls, completions |
//! | [`chunk`] | Overlapping windowed text chunker |
//! | [`extract`] | PDF and plain-text loading |
//! | [`index`] | Knowledge-base indexing run |
//! | [`embedding`] | Embedding provider trait, OpenAI implementation, vector utilities |
//! | [`store`] | Vector store trait and in-memory implementation |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`retrieve`] | Similarity retrieval, relevance filtering, context formatting |
//! | [`cache`] | Response cache: SHA-256 keys, TTL, LRU byte budget |
//! | [`llm`] | Completion client trait and OpenAI-compatible implementation |
//! | [`tools`] | Tool trait, registry, executor, built-in recording tools |
//! | [`chat`] | Conversation orchestrator |
//! | [`leads`] | Append-only lead / knowledge-gap persistence |
//! | [`notify`] | Fire-and-forget push notifications |
//! | [`stats`] | Database statistics |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |

pub mod cache;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod leads;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod retrieve;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod tools;

pub use chat::{Assistant, AssistantOptions};
pub use models::ChatMessage;
pub use store::VectorStore;
pub use tools::{Tool, ToolRegistry};
