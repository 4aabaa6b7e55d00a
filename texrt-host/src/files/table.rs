//! Arena of open files
//!
//! Handles are appended on open and never removed or compacted; a [`FileId`]
//! is an index into the arena and is never reused within a session. Dropping
//! the table is the only way content is released.

use super::{CharRead, FileHandle, FileId, FileSystem, LineRead, OpenMode, Overlay};
use crate::error::{HostError, HostResult};
use texrt_abi::{CARRIAGE_RETURN, LINE_FEED, SPACE};

/// The session's open files
#[derive(Debug, Default)]
pub struct FileTable {
    handles: Vec<FileHandle>,
    overlay: Overlay,
    terminal: Option<FileId>,
    console: Option<FileId>,
}

impl FileTable {
    /// A table resolving reads through `overlay`
    pub fn new(overlay: Overlay) -> Self {
        Self {
            handles: Vec::new(),
            overlay,
            terminal: None,
            console: None,
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    /// Number of handles opened so far
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handle(&self, id: FileId) -> Option<&FileHandle> {
        self.handles.get(id)
    }

    fn handle_mut(&mut self, id: FileId) -> HostResult<&mut FileHandle> {
        self.handles
            .get_mut(id)
            .ok_or(HostError::UnknownDescriptor(id as i64))
    }

    fn push(&mut self, handle: FileHandle) -> FileId {
        self.handles.push(handle);
        self.handles.len() - 1
    }

    /// Content of the most recently opened write handle named `name`
    fn latest_written(&self, name: &str) -> Option<Vec<u8>> {
        self.handles
            .iter()
            .rev()
            .find(|handle| handle.writable && handle.name == name)
            .map(|handle| handle.content.clone())
    }

    /// Latest content written under `name` during this session
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.latest_written(name)
    }

    /// Read all content of `id` through the ordinary read path
    pub fn read_to_end(&mut self, id: FileId) -> HostResult<Vec<u8>> {
        const CHUNK: usize = 64 * 1024;
        let mut out = Vec::new();
        let mut seek = 0;
        loop {
            out.resize(seek + CHUNK, 0);
            let copied = self.read(id, &mut out, seek, CHUNK, seek)?;
            seek += copied;
            if copied < CHUNK {
                out.truncate(seek);
                return Ok(out);
            }
        }
    }
}

impl FileSystem for FileTable {
    fn open(&mut self, name: &str, mode: OpenMode) -> FileId {
        let handle = match mode {
            OpenMode::Write => FileHandle::writer(name),
            OpenMode::Read => {
                match self
                    .latest_written(name)
                    .or_else(|| self.overlay.resolve(name))
                {
                    Some(content) => FileHandle::reader(name, content),
                    None => {
                        tracing::debug!(name, "File not found, reporting through erstat");
                        FileHandle::failed(name)
                    }
                }
            }
        };
        let id = self.push(handle);
        tracing::debug!(name, ?mode, id, "File opened");
        id
    }

    fn open_terminal(&mut self, content: Vec<u8>) -> FileId {
        if let Some(id) = self.terminal {
            return id;
        }
        let id = self.push(FileHandle::standard_input(content));
        self.terminal = Some(id);
        id
    }

    fn open_console(&mut self) -> FileId {
        if let Some(id) = self.console {
            return id;
        }
        let id = self.push(FileHandle::standard_output());
        self.console = Some(id);
        id
    }

    fn close(&mut self, _id: FileId) {}

    fn is_console(&self, id: FileId) -> bool {
        self.handles
            .get(id)
            .is_some_and(FileHandle::is_standard_output)
    }

    fn write(
        &mut self,
        id: FileId,
        source: &[u8],
        offset: usize,
        length: usize,
    ) -> HostResult<()> {
        let bytes = offset
            .checked_add(length)
            .and_then(|end| source.get(offset..end))
            .ok_or_else(|| {
                HostError::invalid_argument(
                    "write",
                    format!("range {}+{} exceeds source of {}", offset, length, source.len()),
                )
            })?;
        let handle = self.handle_mut(id)?;
        if !handle.is_standard_output() {
            handle.write(bytes);
        }
        Ok(())
    }

    fn read(
        &mut self,
        id: FileId,
        destination: &mut [u8],
        offset: usize,
        length: usize,
        seek: usize,
    ) -> HostResult<usize> {
        let handle = self.handle_mut(id)?;
        let window = destination.get_mut(offset..).ok_or_else(|| {
            HostError::invalid_argument("read", format!("offset {} out of range", offset))
        })?;
        let length = length.min(window.len());
        Ok(handle.read_at(seek, &mut window[..length]))
    }

    fn read_line(
        &mut self,
        id: FileId,
        bypass_eol: bool,
        destination: &mut [u8],
        first: usize,
    ) -> HostResult<LineRead> {
        if first > destination.len() {
            return Err(HostError::invalid_argument(
                "inputln",
                format!("first index {} beyond buffer of {}", first, destination.len()),
            ));
        }
        let handle = self.handle_mut(id)?;

        if bypass_eol && !handle.at_eof && handle.at_eol {
            handle.line_position += 1;
        }

        let start = handle.line_position;
        if start >= handle.content.len() {
            handle.at_eof = true;
            return Ok(LineRead::Exhausted {
                standard_input: handle.is_standard_input(),
            });
        }

        let end = handle.content[start..]
            .iter()
            .position(|&byte| byte == LINE_FEED)
            .map_or(handle.content.len(), |i| start + i);

        let capacity = destination.len() - first;
        if end - start > capacity {
            tracing::warn!(
                id,
                line_length = end - start,
                capacity,
                "Line truncated to fit the input buffer"
            );
        }
        let count = (end - start).min(capacity);
        destination[first..first + count].copy_from_slice(&handle.content[start..start + count]);

        let mut last = first + count;
        while last > first && destination[last - 1] == SPACE {
            last -= 1;
        }

        handle.line_position = end;
        handle.at_eol = true;
        Ok(LineRead::Line { last })
    }

    fn get(&mut self, id: FileId, destination: &mut [u8]) -> HostResult<CharRead> {
        let handle = self.handle_mut(id)?;
        if destination.is_empty() {
            return Ok(CharRead::Read);
        }

        let outcome = if handle.is_standard_input() {
            match handle.content.get(handle.position) {
                Some(&byte) => {
                    destination[0] = byte;
                    CharRead::Read
                }
                None => {
                    destination[0] = CARRIAGE_RETURN;
                    handle.at_eof = true;
                    CharRead::Exhausted {
                        standard_input: true,
                    }
                }
            }
        } else {
            if handle.read_at(handle.position, destination) == 0 {
                destination[0] = 0;
                handle.at_eof = true;
                handle.at_eol = true;
                return Ok(CharRead::Exhausted {
                    standard_input: false,
                });
            }
            CharRead::Read
        };

        handle.at_eol = matches!(destination[0], LINE_FEED | CARRIAGE_RETURN);
        handle.position += destination.len();
        Ok(outcome)
    }

    fn eof(&self, id: FileId) -> bool {
        self.handles.get(id).map_or(true, |handle| handle.at_eof)
    }

    fn eoln(&self, id: FileId) -> bool {
        self.handles.get(id).map_or(true, |handle| handle.at_eol)
    }

    fn error_status(&self, id: FileId) -> i32 {
        self.handles.get(id).map_or(1, |handle| handle.error_state)
    }
}
