//! # Host Bridge Traits
//!
//! Capability traits that the host application must implement for the core.
//!
//! ## Overview
//!
//! This crate defines the contract between the metadata sync core and the
//! platform-specific collaborators it depends on. The core never performs I/O
//! itself; every effect goes through one of these traits.
//!
//! ## Traits
//!
//! ### Storage
//! - [`BatchStore`](storage::BatchStore) - Append-only, tag-queryable record store
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert transport-specific errors into it and keep
//! the message actionable (which record, which endpoint).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single store instance can be
//! shared across sync passes.

pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use storage::{BatchStore, Confirmation, PostReceipt, StoredBatch, Tag};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
