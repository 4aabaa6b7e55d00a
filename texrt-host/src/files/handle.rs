//! Per-file state

/// Minimum capacity of a fresh write buffer
const INITIAL_CAPACITY: usize = 1024;

/// Which device, if any, a handle stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// An ordinary virtual file
    File,

    /// The terminal, bound to the session's terminal script
    StandardInput,

    /// The console; everything written to it is discarded
    StandardOutput,
}

/// One open virtual file
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub(crate) name: String,
    pub(crate) kind: HandleKind,
    pub(crate) writable: bool,
    pub(crate) content: Vec<u8>,
    /// Write cursor, also used by raw `get`
    pub(crate) position: usize,
    /// Cursor of line input
    pub(crate) line_position: usize,
    pub(crate) error_state: i32,
    pub(crate) at_eof: bool,
    pub(crate) at_eol: bool,
}

impl FileHandle {
    fn with_content(name: impl Into<String>, kind: HandleKind, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            writable: false,
            content,
            position: 0,
            line_position: 0,
            error_state: 0,
            at_eof: false,
            at_eol: false,
        }
    }

    /// A handle positioned at the start of existing content
    pub fn reader(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self::with_content(name, HandleKind::File, content)
    }

    /// A handle with a fresh, empty buffer
    pub fn writer(name: impl Into<String>) -> Self {
        let mut handle =
            Self::with_content(name, HandleKind::File, Vec::with_capacity(INITIAL_CAPACITY));
        handle.writable = true;
        handle
    }

    /// A handle for a file that could not be resolved
    pub fn failed(name: impl Into<String>) -> Self {
        let mut handle = Self::with_content(name, HandleKind::File, Vec::new());
        handle.error_state = 1;
        handle.at_eof = true;
        handle.at_eol = true;
        handle
    }

    /// The terminal, reading from `content`
    pub fn standard_input(content: Vec<u8>) -> Self {
        Self::with_content("stdin", HandleKind::StandardInput, content)
    }

    /// The console
    pub fn standard_output() -> Self {
        Self::with_content("stdout", HandleKind::StandardOutput, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// The bytes written or loaded so far
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn line_position(&self) -> usize {
        self.line_position
    }

    /// Allocated capacity of the content buffer
    pub fn capacity(&self) -> usize {
        self.content.capacity()
    }

    /// Whether the handle was opened with `rewrite`
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_standard_input(&self) -> bool {
        self.kind == HandleKind::StandardInput
    }

    pub fn is_standard_output(&self) -> bool {
        self.kind == HandleKind::StandardOutput
    }

    /// Write `bytes` at the write cursor, growing the buffer as needed
    pub(crate) fn write(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        self.ensure_capacity(end);
        if self.content.len() < self.position {
            self.content.resize(self.position, 0);
        }
        let overlap = self.content.len().saturating_sub(self.position).min(bytes.len());
        self.content[self.position..self.position + overlap].copy_from_slice(&bytes[..overlap]);
        self.content.extend_from_slice(&bytes[overlap..]);
        self.position = end;
    }

    /// Grow capacity by doubling until `required` bytes fit
    fn ensure_capacity(&mut self, required: usize) {
        let capacity = self.content.capacity();
        if required <= capacity {
            return;
        }
        let mut target = capacity.max(INITIAL_CAPACITY);
        while target < required {
            target *= 2;
        }
        self.content.reserve_exact(target - self.content.len());
    }

    /// Copy up to `destination.len()` bytes starting at `seek`
    pub(crate) fn read_at(&self, seek: usize, destination: &mut [u8]) -> usize {
        let available = self.content.get(seek..).unwrap_or_default();
        let count = available.len().min(destination.len());
        destination[..count].copy_from_slice(&available[..count]);
        count
    }
}
