//! Copy specification models and top-level error types.

use std::fs::FileType;
use std::io;
use std::path::PathBuf;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Entry type as seen by a non-dereferencing metadata query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumEntryKind {
    /// Regular file, copied byte-for-byte.
    RegularFile,
    /// Symbolic link, replicated by target string.
    Symlink,
    /// Directory, mirrored recursively.
    Directory,
    /// Device, FIFO, socket or anything else; never copied.
    Other,
}

impl EnumEntryKind {
    /// Classify a `FileType` obtained from `symlink_metadata`.
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_file() {
            Self::RegularFile
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::Other
        }
    }
}

/// Category of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyWarningKind {
    /// Destination symlink/directory already existed.
    AlreadyExists,
    /// Access/modification times could not be reapplied.
    TimestampsNotApplied,
    /// One or more extended attributes could not be copied.
    XattrsNotCopied,
    /// Releasing a file handle reported an error.
    CloseFailed,
    /// Source entry is neither regular file, symlink nor directory.
    UnsupportedType,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `copy_paths`.
#[derive(Debug, Clone)]
pub struct SpecCopyOptions {
    /// Chunk size for the regular-file byte stream.
    pub n_bytes_chunk: usize,
    /// Copy extended attributes of files and directories (Linux only).
    pub if_preserve_xattrs: bool,
    /// Reapply directory timestamps once more after children are copied.
    pub if_restore_dir_times: bool,
    /// Do not mutate filesystem; log what would happen.
    pub if_dry_run: bool,
}

/// Default byte-stream chunk (glibc `BUFSIZ`).
pub const N_BYTES_CHUNK_DEFAULT: usize = 8192;

impl Default for SpecCopyOptions {
    fn default() -> Self {
        Self {
            n_bytes_chunk: N_BYTES_CHUNK_DEFAULT,
            if_preserve_xattrs: false,
            if_restore_dir_times: false,
            if_dry_run: false,
        }
    }
}

/// One non-fatal diagnostic with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyWarning {
    /// Offending source or destination path.
    pub path: PathBuf,
    /// Diagnostic category.
    pub kind: EnumCopyWarningKind,
    /// User-facing text.
    pub message: String,
}

/// Fatal errors. Any of these aborts the whole run.
#[derive(thiserror::Error, Debug)]
pub enum CopyTreeError {
    /// No source path was given.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Option combination or value cannot be used.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Destination directory lacks write or traversal access.
    #[error("access() error on destination folder {}", .path.display())]
    DestinationNotAccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Non-dereferencing metadata query failed.
    #[error("lstat() error on {}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Source regular file could not be opened for reading.
    #[error("open() error on {}", .path.display())]
    OpenSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Destination regular file could not be created or truncated.
    #[error("open() error on {}", .path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the source byte stream failed.
    #[error("read() error on {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the destination byte stream failed.
    #[error("write() error on {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Symlink target could not be read.
    #[error("readlink() error on {}", .path.display())]
    ReadLink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Symlink target does not fit the path-length bound.
    #[error("readlink() error on {}: symlink target too long ({len} bytes)", .path.display())]
    SymlinkTargetTooLong { path: PathBuf, len: usize },

    /// Symlink creation failed for a reason other than "already exists".
    #[error("symlink() error on {}", .path.display())]
    CreateSymlink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory creation failed for a reason other than "already exists".
    #[error("mkdir() error on {}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Source directory could not be opened or iterated.
    #[error("opendir() error on {}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CopyTreeError {
    /// Path the error is about, when it has one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::InvalidArguments(_) | Self::InvalidOptions(_) => None,
            Self::DestinationNotAccessible { path, .. }
            | Self::Stat { path, .. }
            | Self::OpenSource { path, .. }
            | Self::CreateDestination { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::ReadLink { path, .. }
            | Self::SymlinkTargetTooLong { path, .. }
            | Self::CreateSymlink { path, .. }
            | Self::CreateDirectory { path, .. }
            | Self::ReadDirectory { path, .. } => Some(path.as_path()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
