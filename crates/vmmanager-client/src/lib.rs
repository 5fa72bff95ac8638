//! Asynchronous client for the VMmanager virtualization API.
//!
//! Provides typed request payloads and an async client that turns the service's
//! fire-and-forget task model into calls that resolve only once the requested
//! change has taken effect.

#![deny(missing_docs)]

pub mod client;
pub mod fetch;
pub mod models;
pub mod mutation;
pub mod session;
pub mod sleep;
pub mod task;

#[cfg(test)]
mod testing;

pub use client::{VmManagerClient, VmManagerClientBuilder};
pub use fetch::RetryingFetcher;
pub use models::{
    DiskConfig, Listing, NewVmConfig, NodeInfo, ReinstallConfig, ResourcesConfig, UpdateConfig,
    VmInfo,
};
pub use mutation::{
    Acknowledgement, FromAcknowledgement, Mutation, MutationMethod, MutationOrchestrator,
};
pub use session::{HttpSession, Session};
pub use sleep::{Sleeper, TokioSleeper};
pub use task::{TaskPoller, TaskStatus, TaskWaiter};

/// Convenient result alias that reuses the shared VMmanager error type.
pub type Result<T> = vmmanager_core::Result<T>;
