//! texrt-host: Host runtime for a sandboxed typesetting module
//!
//! The module is a WebAssembly build of a Pascal-derived typesetting engine.
//! It expects a Pascal runtime underneath it: named files opened with
//! `reset`/`rewrite`, character and line I/O with end-of-line and end-of-file
//! flags, a terminal, a clock. This crate provides that runtime in memory and
//! drives one run of the module from artifacts to rendered output.
//!
//! # Layers
//!
//! - [`memory`]: bounds-checked access to the module's linear memory
//! - [`files`]: the virtual file table and its overlay
//! - [`library`]: the host functions the module imports
//! - [`linker`]: registration of those functions with wasmtime
//! - [`session`]: load, run, read back, tear down
//!
//! # Example
//!
//! ```ignore
//! use texrt_host::{Artifacts, CommandRenderer, Session, SessionConfig};
//!
//! let artifacts = Artifacts::from_paths("core.wasm.gz".as_ref(), "core.dump.gz".as_ref())?;
//! let mut session = Session::new(SessionConfig::default())?;
//! session.load(&artifacts, "\\draw (0,0) -- (1,1);")?;
//! session.run().await?;
//! let svg = session.render(&CommandRenderer::new("dvi2svg")).await?;
//! ```

pub mod artifacts;
pub mod clock;
pub mod diagnostics;
pub mod error;
pub mod files;
pub mod library;
pub mod linker;
pub mod memory;
pub mod render;
pub mod resources;
pub mod session;
pub mod signal;

pub use artifacts::Artifacts;
pub use clock::{Clock, FixedClock, SystemClock};
pub use diagnostics::Diagnostic;
pub use error::{HostError, HostResult, SessionError};
pub use files::{FileSystem, FileTable, Overlay};
pub use library::{HostImports, Library};
pub use memory::{MemoryBridge, ScratchSegment};
pub use render::{normalize_document, CommandRenderer, RenderError, Renderer};
pub use resources::{DirectoryStore, EmptyStore, ResourceError, ResourceStore};
pub use session::{LifecycleState, Session, SessionConfig};
pub use signal::{CompletionSignal, CompletionWaiter};
pub use texrt_abi::CompletionReason;
