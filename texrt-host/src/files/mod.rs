//! Virtual file system for the module
//!
//! The module sees files the way a Pascal runtime does: a file is opened for
//! reading or writing by name, then consumed one character or one line at a
//! time, with explicit end-of-line and end-of-file flags. All content lives in
//! memory for the duration of a session.
//!
//! # Structure
//!
//! - [`name`]: decoding of the raw names passed to `reset`/`rewrite`
//! - [`handle`]: one open file (buffer, cursors, flags)
//! - [`overlay`]: staged and cached content, backed by a [`crate::ResourceStore`]
//! - [`table`]: the arena of handles, implementing [`FileSystem`]
//!
//! The host functions depend only on the [`FileSystem`] trait, so tests can
//! drive them against a substitute implementation.

pub mod handle;
pub mod name;
pub mod overlay;
pub mod table;

pub use handle::{FileHandle, HandleKind};
pub use name::FileName;
pub use overlay::Overlay;
pub use table::FileTable;

use crate::error::HostResult;

/// Index of a handle in the file table, as seen by the module
pub type FileId = usize;

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `reset`: read existing content
    Read,

    /// `rewrite`: start a fresh, empty file
    Write,
}

/// Outcome of a line read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// A line was copied; `last` is one past its final non-blank byte
    Line { last: usize },

    /// Nothing is left to read
    Exhausted { standard_input: bool },
}

/// Outcome of a raw character read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRead {
    /// A character was stored in the destination
    Read,

    /// The file is drained; a sentinel byte was stored instead
    Exhausted { standard_input: bool },
}

/// File operations the host functions are built on
pub trait FileSystem {
    /// Open `name` for reading or writing, returning its id
    ///
    /// Opening never fails: an unresolvable read yields a handle whose
    /// [`error_status`](FileSystem::error_status) is nonzero.
    fn open(&mut self, name: &str, mode: OpenMode) -> FileId;

    /// Open the terminal, bound to `content`
    fn open_terminal(&mut self, content: Vec<u8>) -> FileId;

    /// Open the console
    fn open_console(&mut self) -> FileId;

    /// Close a file; content stays alive until the session ends
    fn close(&mut self, id: FileId);

    /// Whether writes to `id` are discarded
    fn is_console(&self, id: FileId) -> bool;

    /// Append `source[offset..offset + length]` at the write cursor
    fn write(&mut self, id: FileId, source: &[u8], offset: usize, length: usize)
        -> HostResult<()>;

    /// Copy up to `length` bytes from `seek` into `destination[offset..]`
    fn read(
        &mut self,
        id: FileId,
        destination: &mut [u8],
        offset: usize,
        length: usize,
        seek: usize,
    ) -> HostResult<usize>;

    /// Read the next line into `destination[first..]`
    fn read_line(
        &mut self,
        id: FileId,
        bypass_eol: bool,
        destination: &mut [u8],
        first: usize,
    ) -> HostResult<LineRead>;

    /// Read `destination.len()` raw bytes at the character cursor
    fn get(&mut self, id: FileId, destination: &mut [u8]) -> HostResult<CharRead>;

    fn eof(&self, id: FileId) -> bool;

    fn eoln(&self, id: FileId) -> bool;

    fn error_status(&self, id: FileId) -> i32;
}
