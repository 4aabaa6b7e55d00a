//! Command-line configuration
//!
//! Every option can also be given through a `TEXRT_*` environment variable.

use crate::tracing_support::{TracingConfig, TracingFormat};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use texrt_host::SessionConfig;

/// Typeset a document with a sandboxed WebAssembly engine
///
/// Reads the document from stdin (or --input), writes the rendered document
/// to stdout and logs to stderr.
#[derive(Parser, Debug, Clone)]
#[command(name = "texrt", version, about)]
pub struct Cli {
    /// Compiled engine image (gzip or plain wasm)
    #[arg(long, env = "TEXRT_IMAGE", default_value = "core.wasm.gz")]
    pub image: PathBuf,

    /// Memory snapshot the engine starts from (gzip or plain)
    #[arg(long, env = "TEXRT_SNAPSHOT", default_value = "core.dump.gz")]
    pub snapshot: PathBuf,

    /// Directory of fonts and other files the engine may open
    #[arg(long, env = "TEXRT_RESOURCES")]
    pub resources: Option<PathBuf>,

    /// Read the document from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Program converting the engine's output into markup; raw output is
    /// written when unset
    #[arg(long, env = "TEXRT_RENDERER")]
    pub renderer: Option<PathBuf>,

    /// Argument passed to the renderer (repeatable)
    #[arg(long = "renderer-arg", allow_hyphen_values = true)]
    pub renderer_args: Vec<String>,

    /// Base name of the input, output and log files
    #[arg(long, env = "TEXRT_JOB_NAME", default_value = "input")]
    pub job_name: String,

    /// Size of the engine's memory, in 64 KiB pages
    #[arg(long, env = "TEXRT_MEMORY_PAGES", default_value_t = 2500)]
    pub memory_pages: u32,

    /// Pages reserved at the top of memory for staging terminal input
    #[arg(long, env = "TEXRT_SCRATCH_PAGES", default_value_t = 16)]
    pub scratch_pages: u32,

    /// Step budget for the engine (unlimited when unset)
    #[arg(long, env = "TEXRT_FUEL")]
    pub fuel: Option<u64>,

    /// Seconds to wait for the engine to finish
    #[arg(long, env = "TEXRT_TIMEOUT", default_value_t = 120)]
    pub timeout: u64,

    /// Element the rendered document must be wrapped in
    #[arg(long, env = "TEXRT_WRAPPER", default_value = "svg")]
    pub wrapper: String,

    /// Write a JSON summary of the run to this file
    #[arg(long, env = "TEXRT_REPORT")]
    pub report: Option<PathBuf>,

    /// Log format
    #[arg(long, env = "TEXRT_LOG_FORMAT", value_enum, default_value = "compact")]
    pub log_format: TracingFormat,

    /// Log level (overrides RUST_LOG)
    #[arg(long, env = "TEXRT_LOG_LEVEL")]
    pub log_level: Option<tracing::Level>,
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            memory_pages: self.memory_pages,
            scratch_pages: self.scratch_pages,
            job_name: self.job_name.clone(),
            fuel_limit: self.fuel,
            completion_timeout: Duration::from_secs(self.timeout),
            wrapper_element: self.wrapper.clone(),
            ..Default::default()
        }
    }

    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            level: self.log_level,
            format: self.log_format,
            ..Default::default()
        }
    }
}
