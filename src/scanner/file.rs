use super::mime::MimeResolver;
use crate::error::Error;
use std::fmt;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Kind of a filesystem entry as seen by the walk. Only regular files go on
/// to the admission pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Device,
    Pipe,
    Socket,
    Irregular,
}

impl EntryKind {
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            return EntryKind::Symlink;
        }
        if file_type.is_dir() {
            return EntryKind::Directory;
        }
        if file_type.is_file() {
            return EntryKind::Regular;
        }
        special_kind(file_type)
    }
}

#[cfg(unix)]
fn special_kind(file_type: FileType) -> EntryKind {
    use std::os::unix::fs::FileTypeExt;

    if file_type.is_block_device() || file_type.is_char_device() {
        EntryKind::Device
    } else if file_type.is_fifo() {
        EntryKind::Pipe
    } else if file_type.is_socket() {
        EntryKind::Socket
    } else {
        EntryKind::Irregular
    }
}

#[cfg(not(unix))]
fn special_kind(_file_type: FileType) -> EntryKind {
    EntryKind::Irregular
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Regular => "regular",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symlink",
            EntryKind::Device => "device",
            EntryKind::Pipe => "pipe",
            EntryKind::Socket => "socket",
            EntryKind::Irregular => "irregular",
        };
        f.write_str(name)
    }
}

/// One filesystem entry selected for possible submission.
///
/// The MIME type is resolved at most once, on first request.
#[derive(Debug)]
pub struct FileDescriptor {
    path: PathBuf,
    size: u64,
    kind: EntryKind,
    mime: OnceLock<String>,
}

impl FileDescriptor {
    pub fn new(path: PathBuf, size: u64, kind: EntryKind) -> Self {
        Self {
            path,
            size,
            kind,
            mime: OnceLock::new(),
        }
    }

    /// Build a descriptor from `lstat` of `path`.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self::new(
            path.to_path_buf(),
            metadata.len(),
            EntryKind::from_file_type(metadata.file_type()),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::Regular
    }

    pub fn mime(&self, resolver: &dyn MimeResolver) -> Result<&str, Error> {
        if let Some(mime) = self.mime.get() {
            return Ok(mime);
        }
        let resolved = resolver.resolve(&self.path)?;
        Ok(self.mime.get_or_init(|| resolved))
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mime.get() {
            Some(mime) => write!(f, "[{}] {}", mime, self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}
