//! Quarry - Mirror Cache for GitHub Archives
//!
//! Fetches repository snapshots and package files once, stores them on disk
//! under a per-user namespace, and serves them until the remote moves on.

pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod server;
pub mod storage;

pub use error::{QuarryError, QuarryResult};
