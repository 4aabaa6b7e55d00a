//! Error types for the host runtime
//!
//! Two layers of failure exist. [`HostError`] is raised inside a host function
//! while the module is running and always becomes a wasm trap, ending the run.
//! [`SessionError`] is what callers of [`crate::Session`] see: every fatal
//! integration fault, including a trapped run, surfaces as one of its variants.
//!
//! A file the module asks for but which cannot be found is *not* an error at
//! either layer; it is reported to the module through `erstat`.

use crate::session::LifecycleState;
use std::path::PathBuf;
use thiserror::Error;

/// Faults raised by host functions while servicing a module call
#[derive(Debug, Error)]
pub enum HostError {
    /// The module passed an address range outside the memory region
    #[error("Memory access out of bounds: address={address}, length={length}, memory_size={size}")]
    MemoryAccess {
        address: usize,
        length: usize,
        size: usize,
    },

    /// A host function was called before the memory region was attached
    #[error("No memory region is attached to the session")]
    NoMemory,

    /// The module used a descriptor it was never given
    #[error("Unknown file descriptor: {0}")]
    UnknownDescriptor(i64),

    /// A length or offset argument was negative
    #[error("Invalid argument to {function}: {reason}")]
    InvalidArgument {
        function: &'static str,
        reason: String,
    },
}

impl HostError {
    /// Create an invalid argument error
    pub fn invalid_argument(function: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function,
            reason: reason.into(),
        }
    }
}

/// Result type for host function bodies
pub type HostResult<T> = Result<T, HostError>;

/// Errors that abort a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// An artifact file could not be read
    #[error("Failed to read artifact '{path}': {source}")]
    ArtifactMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact was not valid gzip data
    #[error("Failed to decompress {artifact}: {source}")]
    Decompression {
        artifact: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The memory snapshot does not cover the configured memory exactly
    #[error("Memory snapshot is {actual} bytes, expected {expected}")]
    SnapshotSize { actual: usize, expected: usize },

    /// The terminal script does not fit in the scratch segment
    #[error("Terminal script is {actual} bytes, but the scratch segment holds {limit}")]
    StagingOverflow { actual: usize, limit: usize },

    /// The configuration is inconsistent
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Engine creation failed
    #[error("Engine creation failed: {0}")]
    EngineCreation(#[source] anyhow::Error),

    /// The module image did not compile
    #[error("Module compilation failed: {0}")]
    ModuleCompilation(#[source] anyhow::Error),

    /// The module imports something the host does not provide
    #[error("Module imports unsupported item {module}::{name}")]
    UnsupportedImport { module: String, name: String },

    /// Instantiation failed
    #[error("Instantiation failed: {0}")]
    Instantiation(#[source] anyhow::Error),

    /// The entry point is missing or has the wrong type
    #[error("Entry point not found: {0}")]
    EntryPointNotFound(String),

    /// The module trapped or a host function failed
    #[error("Module execution failed: {0}")]
    Execution(#[source] anyhow::Error),

    /// The step budget ran out
    #[error("Fuel exhausted (step limit exceeded)")]
    FuelExhausted,

    /// The module never signalled completion within the watchdog period
    #[error("Module did not signal completion within {0:?}")]
    CompletionTimeout(std::time::Duration),

    /// The module returned without ever signalling completion
    #[error("Module returned without signalling completion")]
    CompletionAbandoned,

    /// The worker thread running the module panicked or was cancelled
    #[error("Execution worker failed: {0}")]
    Worker(String),

    /// The designated output file was never written
    #[error("Output file not found: {0}")]
    OutputMissing(String),

    /// An operation was attempted in the wrong lifecycle state
    #[error("Invalid lifecycle state: expected {expected:?}, found {found:?}")]
    InvalidLifecycleState {
        expected: Vec<LifecycleState>,
        found: LifecycleState,
    },

    /// Rendering the output failed
    #[error("Rendering failed: {0}")]
    Render(#[from] crate::render::RenderError),
}

impl SessionError {
    /// Check whether the error came from the module itself rather than the host setup
    pub fn is_runtime_failure(&self) -> bool {
        matches!(
            self,
            Self::Execution(_)
                | Self::FuelExhausted
                | Self::CompletionTimeout(_)
                | Self::CompletionAbandoned
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_access_message() {
        let err = HostError::MemoryAccess {
            address: 70_000,
            length: 16,
            size: 65_536,
        };
        let message = err.to_string();
        assert!(message.contains("address=70000"));
        assert!(message.contains("memory_size=65536"));
    }

    #[test]
    fn test_runtime_failure_classification() {
        assert!(SessionError::FuelExhausted.is_runtime_failure());
        assert!(!SessionError::OutputMissing("input.dvi".into()).is_runtime_failure());
    }
}
