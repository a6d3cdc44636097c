//! `treecp_io_fs` v1:
//! Recursive copy engine for regular files, symlinks and directories.
//!
//! Modules:
//! - `copy`   : driver, type dispatch and per-type copiers
//! - `spec`   : enums/options/errors
//! - `report` : run-time report model
//! - `util`   : path composition, byte-stream and metadata helpers

#[cfg(not(unix))]
compile_error!("treecp_io_fs relies on POSIX permission bits and symlinks; only unix targets are supported.");

pub mod copy;
pub mod report;
pub mod spec;
mod util;

pub use copy::copy_paths;
pub use report::{ReportCopy, ReportCopyBuilder};
pub use spec::{
    CopyTreeError, EnumCopyWarningKind, EnumEntryKind, N_BYTES_CHUNK_DEFAULT, SpecCopyOptions,
    SpecCopyWarning,
};
