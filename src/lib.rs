//! An embedded, S3-compatible object storage engine.
//!
//! This crate implements the metadata and data-path semantics of an S3-style
//! object store — bucket lifecycle, object versioning, delete markers,
//! Object Lock (retention and legal hold), conditional requests, and
//! prefix/delimiter listing — as a plain Rust library with no network or
//! wire-protocol layer of its own.
//!
//! # Architecture
//!
//! ```text
//! Engine (Request Surface, pub async fn)
//!        |
//!        v
//! Registry (bucket lifecycle, versioning/lock config)  ---  Query (listing)
//!        |                                                        |
//!        v                                                        v
//! KeyIndex / KeyHistory (in-memory, per-key serialization)  Versioning (PUT/GET/DELETE/COPY)
//!        |                                                        |
//!        v                                                        v
//!                         Persistence (SQLite metadata + content-addressed blobs)
//! ```
//!
//! Every mutating path serializes through one key's [`index::KeyHistory`],
//! so concurrent writers never interleave a decide-then-commit step; no lock
//! is held across buckets or keys.

pub mod config;
pub mod engine;
pub mod error;
pub mod id;
pub mod index;
pub mod lock;
pub mod model;
pub mod persistence;
pub mod query;
pub mod registry;
pub mod utils;
pub mod validation;
pub mod versioning;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
