//! Local-first memory for AI coding agents: durable rules, decisions, facts,
//! notes and skills, recalled across sessions via MCP.
//!
//! cairn is an [MCP](https://modelcontextprotocol.io/) server, a CLI, and a
//! prompt-injection middleware, all sitting on one engine. Memories are stored
//! in one of five types:
//!
//! | Type | Purpose | Recall |
//! |------|---------|--------|
//! | **Rule** | Standing instructions | Always, never truncated |
//! | **Decision** | Choices and their rationale | By relevance |
//! | **Fact** | Knowledge about the codebase | By relevance |
//! | **Note** | Everything else (default) | By relevance |
//! | **Skill** | Reusable how-to | By relevance |
//!
//! Each memory lives in exactly one scope: global, or one project. A project
//! reader sees its own memories plus global ones.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with FTS5, either a local file or a hosted libSQL
//!   replica reached over HTTP, behind one [`db::Database`] contract
//! - **Lifecycle**: soft delete, single-statement dedup, atomic updates
//! - **Embeddings**: optional backfill through an OpenAI-compatible endpoint
//! - **Health**: advisory storage warnings appended to tool responses
//! - **Transport**: MCP over stdio (primary) or streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: database handles, schema, migrations, and connection targets
//! - [`embedding`]: text-to-vector providers
//! - [`memory`]: the memory engine (store, forget, search, health, transfer)
//! - [`prompt`]: context injection into request envelopes
//! - [`tools`]: the MCP tool surface
//! - [`server`]: stdio and HTTP server entry points
//! - [`cli`]: terminal front end

pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod prompt;
pub mod server;
pub mod tools;
