//! Wiring between [`HostImports`] and a wasmtime [`Linker`]
//!
//! Every host function named in [`texrt_abi::HOST_FUNCTIONS`] is registered
//! under [`texrt_abi::IMPORT_MODULE`]. A [`HostError`] returned by a host
//! function becomes a trap.

use crate::error::{HostError, HostResult, SessionError};
use crate::library::{HostImports, Library};
use crate::memory::MemoryBridge;
use texrt_abi::{host_function, imports, ValueKind, IMPORT_MODULE, MEMORY_MODULE, MEMORY_NAME};
use wasmtime::*;

/// Per-store state: the import surface plus the memory it reads through
pub struct SessionData {
    pub library: Library,
    pub memory: Option<Memory>,
}

impl SessionData {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            memory: None,
        }
    }
}

/// Run `f` against the library and a bridge over the attached memory
fn with_memory<R>(
    caller: &mut Caller<'_, SessionData>,
    f: impl FnOnce(&mut Library, &mut MemoryBridge<'_>) -> HostResult<R>,
) -> Result<R> {
    let memory = caller.data().memory.ok_or(HostError::NoMemory)?;
    let (data, state) = memory.data_and_store_mut(caller);
    let mut bridge = MemoryBridge::new(data);
    Ok(f(&mut state.library, &mut bridge)?)
}

/// Create a linker with every host function registered
pub fn build(engine: &Engine) -> Result<Linker<SessionData>> {
    let mut linker = Linker::new(engine);

    linker.func_wrap(
        IMPORT_MODULE,
        imports::PRINT_STRING,
        |mut caller: Caller<'_, SessionData>, fd: i32, address: i32| {
            with_memory(&mut caller, |library, memory| {
                library.print_string(memory, fd, address)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::PRINT_BOOLEAN,
        |mut caller: Caller<'_, SessionData>, fd: i32, value: i32| -> Result<()> {
            Ok(caller.data_mut().library.print_boolean(fd, value)?)
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::PRINT_CHAR,
        |mut caller: Caller<'_, SessionData>, fd: i32, value: i32| -> Result<()> {
            Ok(caller.data_mut().library.print_char(fd, value)?)
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::PRINT_INTEGER,
        |mut caller: Caller<'_, SessionData>, fd: i32, value: i32| -> Result<()> {
            Ok(caller.data_mut().library.print_integer(fd, value)?)
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::PRINT_FLOAT,
        |mut caller: Caller<'_, SessionData>, fd: i32, value: f64| -> Result<()> {
            Ok(caller.data_mut().library.print_float(fd, value)?)
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::PRINT_NEWLINE,
        |mut caller: Caller<'_, SessionData>, fd: i32| -> Result<()> {
            Ok(caller.data_mut().library.print_newline(fd)?)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        imports::RESET,
        |mut caller: Caller<'_, SessionData>, length: i32, address: i32| {
            with_memory(&mut caller, |library, memory| {
                library.reset(memory, length, address)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::REWRITE,
        |mut caller: Caller<'_, SessionData>, length: i32, address: i32| {
            with_memory(&mut caller, |library, memory| {
                library.rewrite(memory, length, address)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::CLOSE,
        |mut caller: Caller<'_, SessionData>, fd: i32| {
            caller.data_mut().library.close(fd);
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::EOF,
        |caller: Caller<'_, SessionData>, fd: i32| caller.data().library.eof(fd),
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::EOLN,
        |caller: Caller<'_, SessionData>, fd: i32| caller.data().library.eoln(fd),
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::ERSTAT,
        |caller: Caller<'_, SessionData>, fd: i32| caller.data().library.erstat(fd),
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        imports::GET,
        |mut caller: Caller<'_, SessionData>, fd: i32, address: i32, length: i32| {
            with_memory(&mut caller, |library, memory| {
                library.get(memory, fd, address, length)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::PUT,
        |mut caller: Caller<'_, SessionData>, fd: i32, address: i32, length: i32| {
            with_memory(&mut caller, |library, memory| {
                library.put(memory, fd, address, length)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::INPUT_LN,
        |mut caller: Caller<'_, SessionData>,
         fd: i32,
         bypass_eol: i32,
         buffer: i32,
         first_ptr: i32,
         last_ptr: i32,
         max_buf_stack_ptr: i32,
         buf_size: i32| {
            with_memory(&mut caller, |library, memory| {
                library.input_ln(
                    memory,
                    fd,
                    bypass_eol,
                    buffer,
                    first_ptr,
                    last_ptr,
                    max_buf_stack_ptr,
                    buf_size,
                )
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        imports::CURRENT_MINUTES,
        |caller: Caller<'_, SessionData>| caller.data().library.current_minutes(),
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::CURRENT_DAY,
        |caller: Caller<'_, SessionData>| caller.data().library.current_day(),
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::CURRENT_MONTH,
        |caller: Caller<'_, SessionData>| caller.data().library.current_month(),
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::CURRENT_YEAR,
        |caller: Caller<'_, SessionData>| caller.data().library.current_year(),
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        imports::FINAL_END,
        |mut caller: Caller<'_, SessionData>| {
            caller.data_mut().library.final_end();
        },
    )?;

    Ok(linker)
}

fn kind_of(ty: &ValType) -> Option<ValueKind> {
    match ty {
        ValType::I32 => Some(ValueKind::I32),
        ValType::F64 => Some(ValueKind::F64),
        _ => None,
    }
}

fn matches_signature(ty: &FuncType, params: &[ValueKind], results: &[ValueKind]) -> bool {
    let actual_params: Vec<_> = ty.params().map(|p| kind_of(&p)).collect();
    let actual_results: Vec<_> = ty.results().map(|r| kind_of(&r)).collect();
    actual_params.iter().copied().eq(params.iter().copied().map(Some))
        && actual_results.iter().copied().eq(results.iter().copied().map(Some))
}

/// Reject modules importing anything the host does not provide
///
/// Instantiation would fail on these too, but with a less specific error.
pub fn check_imports(module: &Module) -> Result<(), SessionError> {
    for import in module.imports() {
        let supported = match (import.module(), import.ty()) {
            (MEMORY_MODULE, ExternType::Memory(_)) => import.name() == MEMORY_NAME,
            (IMPORT_MODULE, ExternType::Func(ty)) => host_function(import.name())
                .is_some_and(|sig| matches_signature(&ty, sig.params, sig.results)),
            _ => false,
        };
        if !supported {
            return Err(SessionError::UnsupportedImport {
                module: import.module().to_string(),
                name: import.name().to_string(),
            });
        }
    }
    Ok(())
}
