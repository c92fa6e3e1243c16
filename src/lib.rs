//! Workspace facade crate.
//!
//! Re-exports the workspace crates so host applications can depend on a single
//! package. The `sync` feature (enabled by default) pulls in the storage-facing
//! orchestration layer; without it only the pure metadata engines and runtime
//! configuration are exposed.

pub use bridge_traits as bridge;
pub use core_metadata as metadata;
pub use core_runtime as runtime;

#[cfg(feature = "sync")]
pub use core_sync as sync;
