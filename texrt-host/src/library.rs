//! Host import surface
//!
//! [`HostImports`] is the full set of operations the module calls: formatted
//! output, raw character I/O, opening files by name, line input, status
//! queries, the clock and the termination entry point. [`Library`] implements
//! it on top of any [`FileSystem`] plus a [`MemoryBridge`] handed in per call,
//! which keeps it usable without a live wasm instance.
//!
//! Descriptors are indices into the file system. A negative descriptor names
//! the console, whose output is discarded (trace-logged only).

use crate::clock::{Clock, SystemClock};
use crate::error::{HostError, HostResult};
use crate::files::{CharRead, FileId, FileName, FileSystem, FileTable, LineRead, OpenMode};
use crate::memory::{address, offset, MemoryBridge, ScratchSegment};
use crate::signal::CompletionSignal;
use texrt_abi::CompletionReason;

/// Operations exposed to the module
pub trait HostImports {
    /// Write a length-prefixed string stored at `address`
    fn print_string(
        &mut self,
        memory: &MemoryBridge<'_>,
        descriptor: i32,
        address: i32,
    ) -> HostResult<()>;

    fn print_boolean(&mut self, descriptor: i32, value: i32) -> HostResult<()>;

    fn print_char(&mut self, descriptor: i32, value: i32) -> HostResult<()>;

    fn print_integer(&mut self, descriptor: i32, value: i32) -> HostResult<()>;

    fn print_float(&mut self, descriptor: i32, value: f64) -> HostResult<()>;

    fn print_newline(&mut self, descriptor: i32) -> HostResult<()>;

    /// Open the file named by `length` bytes at `address` for reading
    fn reset(&mut self, memory: &MemoryBridge<'_>, length: i32, address: i32) -> HostResult<i32>;

    /// Open the file named by `length` bytes at `address` for writing
    fn rewrite(&mut self, memory: &MemoryBridge<'_>, length: i32, address: i32)
        -> HostResult<i32>;

    fn close(&mut self, descriptor: i32);

    fn eof(&self, descriptor: i32) -> i32;

    fn eoln(&self, descriptor: i32) -> i32;

    fn erstat(&self, descriptor: i32) -> i32;

    /// Read `length` raw bytes into memory at `address`
    fn get(
        &mut self,
        memory: &mut MemoryBridge<'_>,
        descriptor: i32,
        address: i32,
        length: i32,
    ) -> HostResult<()>;

    /// Write `length` raw bytes from memory at `address`
    fn put(
        &mut self,
        memory: &MemoryBridge<'_>,
        descriptor: i32,
        address: i32,
        length: i32,
    ) -> HostResult<()>;

    /// Read one line into the module's line buffer
    ///
    /// `first_ptr`, `last_ptr` and `max_buf_stack_ptr` point at `u32` cells in
    /// module memory. Returns 1 if a line was read and 0 at end of file.
    #[allow(clippy::too_many_arguments)]
    fn input_ln(
        &mut self,
        memory: &mut MemoryBridge<'_>,
        descriptor: i32,
        bypass_eol: i32,
        buffer: i32,
        first_ptr: i32,
        last_ptr: i32,
        max_buf_stack_ptr: i32,
        buf_size: i32,
    ) -> HostResult<i32>;

    fn current_minutes(&self) -> i32;

    fn current_day(&self) -> i32;

    fn current_month(&self) -> i32;

    fn current_year(&self) -> i32;

    /// The module is done
    fn final_end(&mut self);
}

/// The host's implementation of [`HostImports`]
pub struct Library<F: FileSystem = FileTable> {
    files: F,
    clock: Box<dyn Clock>,
    signal: CompletionSignal,
    scratch: ScratchSegment,
}

impl<F: FileSystem> Library<F> {
    /// A library over `files`, reading the terminal script from `scratch`
    pub fn new(files: F, signal: CompletionSignal, scratch: ScratchSegment) -> Self {
        Self {
            files,
            clock: Box::new(SystemClock),
            signal,
            scratch,
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut F {
        &mut self.files
    }

    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    pub fn signal_mut(&mut self) -> &mut CompletionSignal {
        &mut self.signal
    }

    fn file(&self, descriptor: i32) -> HostResult<FileId> {
        usize::try_from(descriptor).map_err(|_| HostError::UnknownDescriptor(descriptor as i64))
    }

    /// Append formatted output, or drop it for the console
    fn emit(&mut self, descriptor: i32, bytes: &[u8]) -> HostResult<()> {
        let id = match usize::try_from(descriptor) {
            Ok(id) if !self.files.is_console(id) => id,
            _ => {
                tracing::trace!(text = %String::from_utf8_lossy(bytes), "Console output");
                return Ok(());
            }
        };
        self.files.write(id, bytes, 0, bytes.len())
    }

    fn open(
        &mut self,
        memory: &MemoryBridge<'_>,
        length: i32,
        name_address: i32,
        mode: OpenMode,
    ) -> HostResult<i32> {
        let function = match mode {
            OpenMode::Read => "reset",
            OpenMode::Write => "rewrite",
        };
        let raw = memory.read_bytes(address(name_address), offset(function, length)?)?;
        let id = match (FileName::decode(raw), mode) {
            (FileName::Terminal, OpenMode::Read) => {
                let script = self.scratch.staged(memory)?.to_vec();
                self.files.open_terminal(script)
            }
            (FileName::Terminal, OpenMode::Write) => self.files.open_console(),
            (FileName::Path(path), mode) => self.files.open(&path, mode),
        };
        i32::try_from(id).map_err(|_| HostError::invalid_argument(function, "file table full"))
    }
}

fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        value.to_string()
    }
}

impl<F: FileSystem> HostImports for Library<F> {
    fn print_string(
        &mut self,
        memory: &MemoryBridge<'_>,
        descriptor: i32,
        address: i32,
    ) -> HostResult<()> {
        let text = memory.read_length_prefixed(self::address(address))?;
        self.emit(descriptor, text)
    }

    fn print_boolean(&mut self, descriptor: i32, value: i32) -> HostResult<()> {
        let text: &[u8] = if value != 0 { b"TRUE" } else { b"FALSE" };
        self.emit(descriptor, text)
    }

    fn print_char(&mut self, descriptor: i32, value: i32) -> HostResult<()> {
        self.emit(descriptor, &[value as u8])
    }

    fn print_integer(&mut self, descriptor: i32, value: i32) -> HostResult<()> {
        self.emit(descriptor, value.to_string().as_bytes())
    }

    fn print_float(&mut self, descriptor: i32, value: f64) -> HostResult<()> {
        self.emit(descriptor, format_float(value).as_bytes())
    }

    fn print_newline(&mut self, descriptor: i32) -> HostResult<()> {
        self.emit(descriptor, b"\n")
    }

    fn reset(&mut self, memory: &MemoryBridge<'_>, length: i32, address: i32) -> HostResult<i32> {
        self.open(memory, length, address, OpenMode::Read)
    }

    fn rewrite(
        &mut self,
        memory: &MemoryBridge<'_>,
        length: i32,
        address: i32,
    ) -> HostResult<i32> {
        self.open(memory, length, address, OpenMode::Write)
    }

    fn close(&mut self, descriptor: i32) {
        if let Ok(id) = usize::try_from(descriptor) {
            self.files.close(id);
        }
    }

    fn eof(&self, descriptor: i32) -> i32 {
        usize::try_from(descriptor).map_or(true, |id| self.files.eof(id)) as i32
    }

    fn eoln(&self, descriptor: i32) -> i32 {
        usize::try_from(descriptor).map_or(true, |id| self.files.eoln(id)) as i32
    }

    fn erstat(&self, descriptor: i32) -> i32 {
        usize::try_from(descriptor).map_or(1, |id| self.files.error_status(id))
    }

    fn get(
        &mut self,
        memory: &mut MemoryBridge<'_>,
        descriptor: i32,
        address: i32,
        length: i32,
    ) -> HostResult<()> {
        let id = self.file(descriptor)?;
        let destination = memory.bytes_mut(self::address(address), offset("get", length)?)?;
        if let CharRead::Exhausted {
            standard_input: true,
        } = self.files.get(id, destination)?
        {
            self.signal.fire(CompletionReason::InputExhausted);
        }
        Ok(())
    }

    fn put(
        &mut self,
        memory: &MemoryBridge<'_>,
        descriptor: i32,
        address: i32,
        length: i32,
    ) -> HostResult<()> {
        let id = self.file(descriptor)?;
        let source = memory.read_bytes(self::address(address), offset("put", length)?)?;
        self.files.write(id, source, 0, source.len())
    }

    fn input_ln(
        &mut self,
        memory: &mut MemoryBridge<'_>,
        descriptor: i32,
        bypass_eol: i32,
        buffer: i32,
        first_ptr: i32,
        last_ptr: i32,
        max_buf_stack_ptr: i32,
        buf_size: i32,
    ) -> HostResult<i32> {
        let id = self.file(descriptor)?;
        let first = memory.read_u32(address(first_ptr))?;
        memory.write_u32(address(last_ptr), first)?;

        let destination = memory.bytes_mut(address(buffer), offset("inputln", buf_size)?)?;
        match self
            .files
            .read_line(id, bypass_eol != 0, destination, first as usize)?
        {
            LineRead::Line { last } => {
                let last = last as u32;
                memory.write_u32(address(last_ptr), last)?;
                if last >= memory.read_u32(address(max_buf_stack_ptr))? {
                    memory.write_u32(address(max_buf_stack_ptr), last + 1)?;
                }
                Ok(1)
            }
            LineRead::Exhausted { standard_input } => {
                if standard_input {
                    self.signal.fire(CompletionReason::InputExhausted);
                }
                Ok(0)
            }
        }
    }

    fn current_minutes(&self) -> i32 {
        self.clock.minutes()
    }

    fn current_day(&self) -> i32 {
        self.clock.day()
    }

    fn current_month(&self) -> i32 {
        self.clock.month()
    }

    fn current_year(&self) -> i32 {
        self.clock.year()
    }

    fn final_end(&mut self) {
        if !self.signal.fire(CompletionReason::FinalEnd) {
            tracing::debug!("Repeated final end ignored");
        }
    }
}
