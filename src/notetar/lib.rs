//! # Notetar Architecture
//!
//! Notetar exports a subtree of a note hierarchy as a tar archive: a
//! directory per note with children, a data file per note with content, and
//! a `!!!meta.json` manifest describing every exported note so the archive
//! can be re-imported.
//!
//! It is a library that happens to have a CLI client, not the other way
//! around.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (main.rs, args.rs)                               │
//! │  - Parses arguments, prints messages, owns exit codes       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Parses format names, merges config with overrides        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - export, manifest, config; returns CmdResult              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Export Pipeline (export/)                                  │
//! │  - Manifest Builder → Reference Filter → Archive Emitter    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - NoteStore trait; FileStore, InMemoryStore                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward nothing writes to stdout/stderr or exits the
//! process. Diagnostics go through `tracing`; the binary decides where they
//! end up.
//!
//! ## Testing Strategy
//!
//! - **Export pipeline**: unit tests against `InMemoryStore` fixtures, with
//!   archives read back through `tar::Archive`.
//! - **Commands / API**: `tempfile` directories for config and output.
//! - **CLI**: `assert_cmd` tests in `tests/` against a `FileStore` on disk.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod store;
