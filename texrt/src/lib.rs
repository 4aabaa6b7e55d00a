//! texrt: command-line driver for the texrt host runtime
//!
//! Reads a document, runs it through the sandboxed engine and writes the
//! rendered result. See [`config::Cli`] for the options.

pub mod app;
pub mod config;
pub mod tracing_support;

pub use app::{Report, Status};
pub use config::Cli;
