//! Client code for stowage.
//!
//! This crate provides the outbound request model, the interception
//! classifier, and the HTTP network seam shared by the agent.

pub mod classify;
pub mod fetch;
pub mod request;

pub use classify::{Eligibility, SkipReason, classify};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Network};
pub use request::{Disposition, OutboundRequest};

pub use reqwest::{Method, StatusCode};
