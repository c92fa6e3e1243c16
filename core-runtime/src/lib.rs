//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the podcast sync core:
//! - Logging and tracing infrastructure
//! - Configuration management (tag naming, batch limits, fetch caps)
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the other crates depend on.
//! Everything that used to be ambient (environment-provided tag prefixes,
//! hard-coded batch sizes) is an explicit value in [`config::CoreConfig`] and
//! is threaded into the code that needs it.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BatchLimits, CoreConfig, CoreConfigBuilder, TagConfig};
pub use error::{Error, Result};
