//! Core module - engine configuration
//!
//! - [`EngineConfig`] - environment-driven settings
//! - [`RetainedSnapshotPolicy`] - treatment of snapshots kept across unlock

pub mod config;

pub use config::{EngineConfig, RetainedSnapshotPolicy};
