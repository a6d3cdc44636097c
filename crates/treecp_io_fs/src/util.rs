use std::ffi::{CString, OsStr, OsString};
use std::fs::{File, Metadata};
use std::io::{self, Read, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::io::IntoRawFd;
use std::path::{Path, PathBuf};

use filetime::{FileTime, set_file_handle_times, set_file_times, set_symlink_file_times};

/// Symlink targets must be strictly shorter than this many bytes.
pub(crate) const N_LEN_PATH_MAX: usize = libc::PATH_MAX as usize;

////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Final component of `path_src`, ignoring trailing separators.
///
/// Works on raw bytes: `"/a/b/"` -> `"b"`, `"b"` -> `"b"`, `"///"` -> `"/"`.
/// `.` and `..` are returned as-is.
pub(crate) fn derive_basename(path_src: &Path) -> &OsStr {
    let raw = path_src.as_os_str().as_bytes();
    let n_end = raw.iter().rposition(|&b| b != b'/').map(|i| i + 1);
    let Some(n_end) = n_end else {
        return OsStr::new("/");
    };
    let raw = &raw[..n_end];
    let n_start = raw.iter().rposition(|&b| b == b'/').map_or(0, |i| i + 1);
    OsStr::from_bytes(&raw[n_start..])
}

/// Join `name` under `path_dir` as `<path_dir>/<name>`, byte-for-byte.
pub(crate) fn join_child_path(path_dir: &Path, name: &OsStr) -> PathBuf {
    let raw_dir = path_dir.as_os_str().as_bytes();

    let mut raw = Vec::with_capacity(raw_dir.len() + name.len() + 1);
    raw.extend_from_slice(raw_dir);
    raw.push(b'/');
    raw.extend_from_slice(name.as_bytes());
    PathBuf::from(OsString::from_vec(raw))
}

/// Compose `<path_dir_dst>/<basename(path_src)>` with exactly one separator
/// introduced between the two parts.
///
/// # Examples
/// ```ignore
/// use std::path::Path;
/// let dst = compose_destination_path(Path::new("/a/b/"), Path::new("/dst"));
/// assert_eq!(dst, Path::new("/dst/b"));
/// ```
pub(crate) fn compose_destination_path(path_src: &Path, path_dir_dst: &Path) -> PathBuf {
    join_child_path(path_dir_dst, derive_basename(path_src))
}

/// Check the destination directory grants write and search access to the
/// real user (`access(2)` with `W_OK | X_OK`).
pub(crate) fn check_destination_access(path_dir_dst: &Path) -> io::Result<()> {
    let c_path = CString::new(path_dir_dst.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the call.
    let n_ret = unsafe { libc::access(c_path.as_ptr(), libc::W_OK | libc::X_OK) };
    if n_ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StreamCopy

/// Which side of a byte-stream copy failed.
#[derive(Debug)]
pub(crate) enum EnumStreamFailure {
    Read(io::Error),
    Write(io::Error),
}

/// Copy `reader` into `writer` in `n_bytes_chunk` pieces.
///
/// The loop ends on the first read returning fewer bytes than requested
/// (zero included). Interrupted reads are retried. Returns bytes written.
pub(crate) fn copy_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    n_bytes_chunk: usize,
) -> Result<u64, EnumStreamFailure> {
    let mut buffer = vec![0_u8; n_bytes_chunk];
    let mut n_bytes_total = 0_u64;
    loop {
        let n_read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EnumStreamFailure::Read(e)),
        };
        writer
            .write_all(&buffer[..n_read])
            .map_err(EnumStreamFailure::Write)?;
        n_bytes_total += n_read as u64;
        if n_read < n_bytes_chunk {
            return Ok(n_bytes_total);
        }
    }
}

/// Close `file` explicitly so that a failing `close(2)` is observable.
pub(crate) fn release_handle(file: File) -> io::Result<()> {
    let fd = file.into_raw_fd();
    // SAFETY: `fd` was just detached from its owner and is closed exactly once.
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Metadata

fn derive_file_times(meta_src: &Metadata) -> (FileTime, FileTime) {
    (
        FileTime::from_last_access_time(meta_src),
        FileTime::from_last_modification_time(meta_src),
    )
}

/// Reapply source access/modification times through an open handle.
pub(crate) fn apply_times_to_handle(file_dst: &File, meta_src: &Metadata) -> io::Result<()> {
    let (file_time_access, file_time_modify) = derive_file_times(meta_src);
    set_file_handle_times(file_dst, Some(file_time_access), Some(file_time_modify))
}

/// Reapply source access/modification times to a path (followed).
pub(crate) fn apply_times_to_path(path_dst: &Path, meta_src: &Metadata) -> io::Result<()> {
    let (file_time_access, file_time_modify) = derive_file_times(meta_src);
    set_file_times(path_dst, file_time_access, file_time_modify)
}

/// Reapply source access/modification times to a symlink itself.
pub(crate) fn apply_times_to_symlink(path_dst: &Path, meta_src: &Metadata) -> io::Result<()> {
    let (file_time_access, file_time_modify) = derive_file_times(meta_src);
    set_symlink_file_times(path_dst, file_time_access, file_time_modify)
}

/// Copy every readable extended attribute from `path_src` to `path_dst`.
///
/// Returns the list of attributes (name + error text) that failed.
#[cfg(target_os = "linux")]
pub(crate) fn copy_xattrs(path_src: &Path, path_dst: &Path) -> Result<(), Vec<String>> {
    let iter_xattr_names = match xattr::list(path_src) {
        Ok(v) => v,
        Err(e) => return Err(vec![format!("list ({e})")]),
    };

    let mut l_failures = Vec::new();
    for name in iter_xattr_names {
        let raw_value = match xattr::get(path_src, &name) {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => {
                l_failures.push(format!("{} ({e})", name.to_string_lossy()));
                continue;
            }
        };
        if let Err(e) = xattr::set(path_dst, &name, &raw_value) {
            l_failures.push(format!("{} ({e})", name.to_string_lossy()));
        }
    }

    if l_failures.is_empty() {
        Ok(())
    } else {
        Err(l_failures)
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn copy_xattrs(_path_src: &Path, _path_dst: &Path) -> Result<(), Vec<String>> {
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
