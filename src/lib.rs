//
// lib.rs
// PDT-Tools-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: the two calculators, their shared helpers, and the I/O layers around them.
pub mod batch;
pub mod cli;
pub mod dosimetry;
pub mod error;
pub mod fluorescence;
pub mod imaging;
pub mod models;
pub mod stats;
pub mod web;

pub use cli::{run as run_cli, Cli, Commands};
pub use error::ValidationError;
