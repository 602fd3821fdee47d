//! S3-compatible artifact store adapter.
//!
//! This crate provides:
//! - The `ArtifactStore` trait the pipeline runs against
//! - An S3/R2-compatible client implementation
//! - An in-memory implementation for tests and local development
//!
//! Payloads are opaque byte streams keyed by string identifiers; nothing
//! here interprets artifact content.

pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use client::{S3ArtifactStore, S3Config};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryArtifactStore;
pub use store::ArtifactStore;
