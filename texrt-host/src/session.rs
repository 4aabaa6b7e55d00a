//! Session lifecycle
//!
//! A [`Session`] owns everything one run of the module needs: the engine, the
//! memory region, the file table and the completion signal. It moves through
//! [`LifecycleState`] in a fixed order and refuses out-of-order calls.
//!
//! ```text
//! Idle --load--> Loaded --run--> Running --> Finished --teardown--> TornDown
//!  ^                                                                   |
//!  +------------------------------ reset ------------------------------+
//! ```
//!
//! Nothing is reused between runs. Reloading builds a new store, memory
//! region and file table from scratch.

use crate::artifacts::Artifacts;
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::files::{FileSystem, FileTable, OpenMode, Overlay};
use crate::library::Library;
use crate::linker::{self, SessionData};
use crate::memory::{MemoryBridge, ScratchSegment};
use crate::render::{normalize_document, Renderer};
use crate::resources::{EmptyStore, ResourceStore};
use crate::signal::{CompletionSignal, CompletionWaiter};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use texrt_abi::{CompletionReason, MEMORY_MODULE, MEMORY_NAME, PAGE_SIZE};
use wasmtime::*;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    /// No memory region, no files
    Idle,

    /// Artifacts decoded into a fresh memory region, input staged
    Loaded,

    /// The entry point is executing
    Running,

    /// The run is over; output can be read back
    Finished,

    /// All state discarded
    TornDown,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Size of the memory region, in wasm pages (fixed; the region never grows)
    pub memory_pages: u32,

    /// Pages at the top of the region reserved for staging terminal input
    pub scratch_pages: u32,

    /// Exported function that starts the module
    pub entry_point: String,

    /// Base name of the input, output and log files
    pub job_name: String,

    /// Text read from the terminal; `{job}` expands to the job name
    pub terminal_script: String,

    /// Prepended to documents that do not open their own body
    pub document_prefix: String,

    /// Appended to documents that do not open their own body
    pub document_suffix: String,

    /// Optional step budget, enforced with wasmtime fuel
    pub fuel_limit: Option<u64>,

    /// Wall-clock limit on a run
    pub completion_timeout: Duration,

    /// Element the rendered document is wrapped in
    pub wrapper_element: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory_pages: 2500,
            scratch_pages: 16,
            entry_point: texrt_abi::ENTRY_POINT.to_string(),
            job_name: "input".to_string(),
            terminal_script: " {job}.tex \n\\end\n".to_string(),
            document_prefix: "\\begin{document}\n".to_string(),
            document_suffix: "\n\\end{document}\n".to_string(),
            fuel_limit: None,
            completion_timeout: Duration::from_secs(120),
            wrapper_element: "svg".to_string(),
        }
    }
}

const BODY_MARKER: &str = "\\begin{document}";

impl SessionConfig {
    /// Name the input document is staged under
    pub fn input_name(&self) -> String {
        format!("{}.tex", self.job_name)
    }

    /// Name of the file the module writes its output to
    pub fn output_name(&self) -> String {
        format!("{}.dvi", self.job_name)
    }

    /// Name of the module's log file
    pub fn log_name(&self) -> String {
        format!("{}.log", self.job_name)
    }

    /// The terminal script with the job name filled in
    pub fn terminal_input(&self) -> String {
        self.terminal_script.replace("{job}", &self.job_name)
    }

    /// Wrap `document` in the body prefix and suffix unless it has its own
    pub fn wrap_document(&self, document: &str) -> String {
        if document.contains(BODY_MARKER) {
            document.to_string()
        } else {
            format!(
                "{}{}{}",
                self.document_prefix, document, self.document_suffix
            )
        }
    }

    /// Address range reserved for staging
    /// Size in bytes of the memory region, and of a matching snapshot
    pub fn memory_size(&self) -> usize {
        self.memory_pages as usize * PAGE_SIZE
    }

    pub fn scratch_segment(&self) -> ScratchSegment {
        let working = self.memory_pages.saturating_sub(self.scratch_pages) as usize;
        ScratchSegment {
            base: working * PAGE_SIZE,
            len: self.scratch_pages as usize * PAGE_SIZE,
        }
    }

    /// Check that the settings are consistent
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.scratch_pages == 0 {
            return Err(SessionError::InvalidConfig(
                "scratch_pages must be at least 1".into(),
            ));
        }
        if self.scratch_pages >= self.memory_pages {
            return Err(SessionError::InvalidConfig(format!(
                "scratch_pages ({}) must be smaller than memory_pages ({})",
                self.scratch_pages, self.memory_pages
            )));
        }
        if self.entry_point.is_empty() || self.job_name.is_empty() {
            return Err(SessionError::InvalidConfig(
                "entry_point and job_name must not be empty".into(),
            ));
        }
        if self.completion_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "completion_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Everything that exists between load and teardown
struct Context {
    store: Store<SessionData>,
    module: Module,
    linker: Linker<SessionData>,
    waiter: Option<CompletionWaiter>,
}

/// A single hosted run of the module
pub struct Session {
    config: SessionConfig,
    engine: Engine,
    resources: Arc<dyn ResourceStore>,
    clock: Arc<dyn Clock>,
    state: LifecycleState,
    context: Option<Context>,
    completion: Option<CompletionReason>,
}

impl Session {
    /// Create an idle session
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let mut engine_config = Config::new();
        engine_config.consume_fuel(config.fuel_limit.is_some());
        engine_config.epoch_interruption(true);
        engine_config.wasm_memory64(false);
        let engine = Engine::new(&engine_config).map_err(SessionError::EngineCreation)?;

        Ok(Self {
            config,
            engine,
            resources: Arc::new(EmptyStore),
            clock: Arc::new(SystemClock),
            state: LifecycleState::Idle,
            context: None,
            completion: None,
        })
    }

    /// Resolve unstaged files from `resources`
    pub fn with_resources(mut self, resources: Arc<dyn ResourceStore>) -> Self {
        self.resources = resources;
        self
    }

    /// Answer the module's clock queries from `clock`
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Why the last run ended, once it has
    pub fn completion(&self) -> Option<CompletionReason> {
        self.completion
    }

    fn expect_state(&self, expected: &[LifecycleState]) -> Result<(), SessionError> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidLifecycleState {
                expected: expected.to_vec(),
                found: self.state,
            })
        }
    }

    /// Decode the artifacts into a fresh memory region and stage `document`
    pub fn load(&mut self, artifacts: &Artifacts, document: &str) -> Result<(), SessionError> {
        self.expect_state(&[LifecycleState::Idle])?;

        let module =
            Module::new(&self.engine, &artifacts.image).map_err(SessionError::ModuleCompilation)?;
        linker::check_imports(&module)?;

        let expected = self.config.memory_size();
        if artifacts.snapshot.len() != expected {
            return Err(SessionError::SnapshotSize {
                actual: artifacts.snapshot.len(),
                expected,
            });
        }
        let scratch = self.config.scratch_segment();
        let script = self.config.terminal_input();
        if script.len() > scratch.capacity() {
            return Err(SessionError::StagingOverflow {
                actual: script.len(),
                limit: scratch.capacity(),
            });
        }

        let mut overlay = Overlay::new(self.resources.clone());
        overlay.insert(self.config.input_name(), self.config.wrap_document(document));

        let (signal, waiter) = CompletionSignal::new();
        let library = Library::new(FileTable::new(overlay), signal, scratch)
            .with_clock(self.clock.clone());
        let mut store = Store::new(&self.engine, SessionData::new(library));
        if let Some(fuel) = self.config.fuel_limit {
            store.set_fuel(fuel).map_err(SessionError::EngineCreation)?;
        }
        store.set_epoch_deadline(1);

        let pages = self.config.memory_pages;
        let memory = Memory::new(&mut store, MemoryType::new(pages, Some(pages)))
            .map_err(SessionError::Instantiation)?;
        let data = memory.data_mut(&mut store);
        data.copy_from_slice(&artifacts.snapshot);
        scratch
            .stage(&mut MemoryBridge::new(data), script.as_bytes())
            .map_err(|_| SessionError::StagingOverflow {
                actual: script.len(),
                limit: scratch.capacity(),
            })?;
        store.data_mut().memory = Some(memory);

        let mut linker = linker::build(&self.engine).map_err(SessionError::Instantiation)?;
        linker
            .define(&store, MEMORY_MODULE, MEMORY_NAME, memory)
            .map_err(SessionError::Instantiation)?;

        tracing::info!(
            pages,
            snapshot_bytes = artifacts.snapshot.len(),
            document_bytes = document.len(),
            "Session loaded"
        );

        self.context = Some(Context {
            store,
            module,
            linker,
            waiter: Some(waiter),
        });
        self.completion = None;
        self.state = LifecycleState::Loaded;
        Ok(())
    }

    /// Run the entry point and wait for the module to signal completion
    pub async fn run(&mut self) -> Result<CompletionReason, SessionError> {
        self.expect_state(&[LifecycleState::Loaded])?;
        let Context {
            mut store,
            module,
            linker,
            waiter,
        } = self
            .context
            .take()
            .ok_or(SessionError::InvalidLifecycleState {
                expected: vec![LifecycleState::Loaded],
                found: self.state,
            })?;
        self.state = LifecycleState::Running;

        let entry_point = self.config.entry_point.clone();
        let mut worker = tokio::task::spawn_blocking(move || {
            let result = execute(&linker, &mut store, &module, &entry_point);
            // Returning from the entry point without signalling releases the waiter
            store.data_mut().library.signal_mut().abandon();
            (store, module, linker, result)
        });

        let timeout = self.config.completion_timeout;
        let (joined, timed_out) = match tokio::time::timeout(timeout, &mut worker).await {
            Ok(joined) => (joined, false),
            Err(_) => {
                tracing::warn!(?timeout, "Completion watchdog expired, interrupting module");
                self.engine.increment_epoch();
                (worker.await, true)
            }
        };

        self.state = LifecycleState::Finished;
        let (store, module, linker, result) =
            joined.map_err(|e| SessionError::Worker(e.to_string()))?;
        self.context = Some(Context {
            store,
            module,
            linker,
            waiter: None,
        });

        if timed_out {
            return Err(SessionError::CompletionTimeout(timeout));
        }
        result?;

        let waiter = waiter.ok_or(SessionError::CompletionAbandoned)?;
        let reason = waiter
            .wait()
            .await
            .ok_or(SessionError::CompletionAbandoned)?;
        self.completion = Some(reason);
        tracing::info!(?reason, "Run finished");
        Ok(reason)
    }

    /// Read a file back through the file table
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>, SessionError> {
        self.expect_state(&[LifecycleState::Finished])?;
        let missing = || SessionError::OutputMissing(name.to_string());
        let context = self.context.as_mut().ok_or_else(missing)?;

        let files = context.store.data_mut().library.files_mut();
        let id = files.open(name, OpenMode::Read);
        if files.error_status(id) != 0 {
            return Err(missing());
        }
        files
            .read_to_end(id)
            .map_err(|e| SessionError::Execution(e.into()))
    }

    /// The module's output file
    pub fn read_output(&mut self) -> Result<Vec<u8>, SessionError> {
        let name = self.config.output_name();
        let output = self.read_file(&name)?;
        tracing::debug!(name, bytes = output.len(), "Output read back");
        Ok(output)
    }

    /// The module's log, decoded lossily
    pub fn read_log(&mut self) -> Result<String, SessionError> {
        let name = self.config.log_name();
        Ok(String::from_utf8_lossy(&self.read_file(&name)?).into_owned())
    }

    /// Convert the output with `renderer` and balance the wrapper element
    pub async fn render(&mut self, renderer: &dyn Renderer) -> Result<String, SessionError> {
        let output = self.read_output()?;
        let text = renderer.render(&output).await?;
        Ok(normalize_document(&text, &self.config.wrapper_element))
    }

    /// Discard the store, memory region, file table and signal
    pub fn teardown(&mut self) -> Result<(), SessionError> {
        self.expect_state(&[LifecycleState::Loaded, LifecycleState::Finished])?;
        let handles = self
            .context
            .take()
            .map_or(0, |context| context.store.data().library.files().len());
        self.completion = None;
        self.state = LifecycleState::TornDown;
        tracing::info!(handles, "Session torn down");
        Ok(())
    }

    /// Return a torn-down session to idle so it can be loaded again
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.expect_state(&[LifecycleState::TornDown])?;
        self.state = LifecycleState::Idle;
        Ok(())
    }
}

/// Instantiate the module and call its entry point
fn execute(
    linker: &Linker<SessionData>,
    store: &mut Store<SessionData>,
    module: &Module,
    entry_point: &str,
) -> Result<(), SessionError> {
    let instance = linker
        .instantiate(&mut *store, module)
        .map_err(SessionError::Instantiation)?;
    let main = instance
        .get_typed_func::<(), ()>(&mut *store, entry_point)
        .map_err(|_| SessionError::EntryPointNotFound(entry_point.to_string()))?;

    tracing::debug!(entry_point, "Entering module");
    main.call(&mut *store, ()).map_err(|e| {
        if let Some(Trap::OutOfFuel) = e.downcast_ref::<Trap>() {
            SessionError::FuelExhausted
        } else {
            tracing::warn!(error = %e, "Module trapped");
            SessionError::Execution(e)
        }
    })
}
