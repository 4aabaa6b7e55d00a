//! texrt-abi: Contract between the host runtime and the typesetting module
//!
//! This crate names everything the compiled module expects to find when it is
//! instantiated: the import module, the host functions and their wasm
//! signatures, the imported linear memory and the exported entry point. It also
//! carries the legacy device names the module passes to `reset`/`rewrite`.
//!
//! The module is compiled from a Pascal-derived language, so all values cross
//! the boundary as `i32` (descriptors, addresses, lengths, booleans) except
//! floating-point output, which is `f64`.

use serde::{Deserialize, Serialize};

/// Size of one wasm page in bytes
pub const PAGE_SIZE: usize = 65_536;

/// Import module under which every host function is registered
pub const IMPORT_MODULE: &str = "library";

/// Import module of the shared linear memory
pub const MEMORY_MODULE: &str = "env";

/// Import name of the shared linear memory
pub const MEMORY_NAME: &str = "memory";

/// Default exported entry point
pub const ENTRY_POINT: &str = "main";

/// Device name the module opens to reach the terminal
pub const TERMINAL_DEVICE: &str = "TTY:";

/// Device prefix the module puts in front of font metric files
pub const FONT_AREA_PREFIX: &str = "TeXfonts:";

/// Legacy name of the string pool file
pub const POOL_FILE_LEGACY: &str = "TeXformats:TEX.POOL";

/// Name the string pool file is stored under
pub const POOL_FILE: &str = "tex.pool";

/// Byte written by `get` when the terminal is drained
pub const CARRIAGE_RETURN: u8 = 13;

/// Line terminator recognized by line input
pub const LINE_FEED: u8 = 10;

/// Byte stripped from the end of every input line
pub const SPACE: u8 = 32;

/// Value types that appear in host function signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    I32,
    F64,
}

/// Host function names and signatures, as imported by the module
pub mod imports {
    pub const PRINT_STRING: &str = "printString";
    pub const PRINT_BOOLEAN: &str = "printBoolean";
    pub const PRINT_CHAR: &str = "printChar";
    pub const PRINT_INTEGER: &str = "printInteger";
    pub const PRINT_FLOAT: &str = "printFloat";
    pub const PRINT_NEWLINE: &str = "printNewline";
    pub const RESET: &str = "reset";
    pub const REWRITE: &str = "rewrite";
    pub const CLOSE: &str = "close";
    pub const EOF: &str = "eof";
    pub const EOLN: &str = "eoln";
    pub const ERSTAT: &str = "erstat";
    pub const GET: &str = "get";
    pub const PUT: &str = "put";
    pub const INPUT_LN: &str = "inputln";
    pub const CURRENT_MINUTES: &str = "getCurrentMinutes";
    pub const CURRENT_DAY: &str = "getCurrentDay";
    pub const CURRENT_MONTH: &str = "getCurrentMonth";
    pub const CURRENT_YEAR: &str = "getCurrentYear";
    pub const FINAL_END: &str = "tex_final_end";
}

/// Signature of one host function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSignature {
    /// Function name within [`IMPORT_MODULE`]
    pub name: &'static str,

    /// Parameter types, in order
    pub params: &'static [ValueKind],

    /// Result types
    pub results: &'static [ValueKind],
}

use ValueKind::{F64, I32};

/// Every host function the runtime provides
pub const HOST_FUNCTIONS: &[ImportSignature] = &[
    sig(imports::PRINT_STRING, &[I32, I32], &[]),
    sig(imports::PRINT_BOOLEAN, &[I32, I32], &[]),
    sig(imports::PRINT_CHAR, &[I32, I32], &[]),
    sig(imports::PRINT_INTEGER, &[I32, I32], &[]),
    sig(imports::PRINT_FLOAT, &[I32, F64], &[]),
    sig(imports::PRINT_NEWLINE, &[I32], &[]),
    sig(imports::RESET, &[I32, I32], &[I32]),
    sig(imports::REWRITE, &[I32, I32], &[I32]),
    sig(imports::CLOSE, &[I32], &[]),
    sig(imports::EOF, &[I32], &[I32]),
    sig(imports::EOLN, &[I32], &[I32]),
    sig(imports::ERSTAT, &[I32], &[I32]),
    sig(imports::GET, &[I32, I32, I32], &[]),
    sig(imports::PUT, &[I32, I32, I32], &[]),
    sig(
        imports::INPUT_LN,
        &[I32, I32, I32, I32, I32, I32, I32],
        &[I32],
    ),
    sig(imports::CURRENT_MINUTES, &[], &[I32]),
    sig(imports::CURRENT_DAY, &[], &[I32]),
    sig(imports::CURRENT_MONTH, &[], &[I32]),
    sig(imports::CURRENT_YEAR, &[], &[I32]),
    sig(imports::FINAL_END, &[], &[]),
];

const fn sig(
    name: &'static str,
    params: &'static [ValueKind],
    results: &'static [ValueKind],
) -> ImportSignature {
    ImportSignature {
        name,
        params,
        results,
    }
}

/// Look up a host function by name
pub fn host_function(name: &str) -> Option<&'static ImportSignature> {
    HOST_FUNCTIONS.iter().find(|f| f.name == name)
}

/// Why the module's run came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The module called the termination entry point
    FinalEnd,

    /// The module asked for another terminal line after the terminal was drained
    InputExhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_function_lookup() {
        let input_ln = host_function("inputln").expect("inputln is provided");
        assert_eq!(input_ln.params.len(), 7);
        assert_eq!(input_ln.results, &[ValueKind::I32]);

        assert!(host_function("fopen").is_none());
    }

    #[test]
    fn test_host_function_names_are_unique() {
        for (i, a) in HOST_FUNCTIONS.iter().enumerate() {
            for b in &HOST_FUNCTIONS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_completion_reason_serialization() {
        let json = serde_json::to_string(&CompletionReason::InputExhausted).unwrap();
        assert_eq!(json, "\"input_exhausted\"");
    }
}
