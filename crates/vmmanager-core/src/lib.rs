//! # vmmanager-core
//!
//! Core types and utilities for working with the VMmanager API.
//!
//! This crate provides the shared error taxonomy, identifier types, configuration
//! and timing policies used by the client crate.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`ids`] - Strongly-typed numeric ids and the [`VmRef`] handle
//! - [`config`] - Client configuration
//! - [`client`] - Transport settings, retry backoff and task polling policies
//! - [`query`] - Query parameter and `where` predicate helpers

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod query;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use ids::{AccountId, DiskId, NodeId, TaskId, VmId, VmRef};
