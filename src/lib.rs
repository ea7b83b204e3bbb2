//! dnsreconcile - DNS migration drift reconciler
//!
//! Compares the domain inventory of a legacy traffic manager (Source A) with
//! the platform replacing it (Source B), then probes both platforms' resolvers
//! for every shared name and reports the pairs whose answers disagree.

pub mod answer;
pub mod app;
pub mod checker;
pub mod cli;
pub mod config;
pub mod core;
pub mod inventory;
pub mod probe;
pub mod report;
pub mod task_manager;

// Re-export core types for convenience
pub use core::*;
