//! Core types and shared functionality for stowage.
//!
//! This crate provides:
//! - Versioned cache store with SQLite backend
//! - Request identity hashing
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, ResponseArtifact};
pub use config::AppConfig;
pub use error::Error;
