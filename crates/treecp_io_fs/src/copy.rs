//! Recursive copy orchestration: driver, type dispatcher and per-type copiers.

use std::ffi::OsString;
use std::fs::{self, DirBuilder, File, Metadata, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt, symlink};
use std::path::Path;

use tracing::{debug, info, trace};

use crate::report::{ReportCopy, ReportCopyBuilder};
use crate::spec::{CopyTreeError, EnumCopyWarningKind, EnumEntryKind, SpecCopyOptions};
use crate::util::{
    EnumStreamFailure, N_LEN_PATH_MAX, apply_times_to_handle, apply_times_to_path,
    apply_times_to_symlink, check_destination_access, compose_destination_path, copy_stream,
    copy_xattrs, join_child_path, release_handle,
};

#[derive(Debug)]
struct SpecCopyContext {
    spec_cp_options: SpecCopyOptions,
    builder_cp_report: ReportCopyBuilder,
}

/// Copy every path in `paths_source` into the existing directory
/// `dir_destination`.
///
/// Sources are processed left-to-right. Each one may be a regular file, a
/// symlink or a directory (copied recursively); other types are skipped
/// with a warning. The destination must grant write and search access.
///
/// Returns [`ReportCopy`] when the run completes. Any [`CopyTreeError`] aborts
/// the run at the point of failure, leaving whatever was already written.
pub fn copy_paths<P, Q>(
    paths_source: &[P],
    dir_destination: Q,
    spec_cp_options: SpecCopyOptions,
) -> Result<ReportCopy, CopyTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    if paths_source.is_empty() {
        return Err(CopyTreeError::InvalidArguments(
            "at least one source path is required".to_string(),
        ));
    }
    if spec_cp_options.n_bytes_chunk == 0 {
        return Err(CopyTreeError::InvalidOptions(
            "`n_bytes_chunk` must be >= 1.".to_string(),
        ));
    }

    let path_dir_dst = dir_destination.as_ref();
    check_destination_access(path_dir_dst).map_err(|source| {
        CopyTreeError::DestinationNotAccessible {
            path: path_dir_dst.to_path_buf(),
            source,
        }
    })?;

    let mut spec_cp_ctx = SpecCopyContext {
        spec_cp_options,
        builder_cp_report: ReportCopyBuilder::default(),
    };
    for path_src in paths_source {
        copy_entry(path_src.as_ref(), path_dir_dst, &mut spec_cp_ctx)?;
    }
    Ok(spec_cp_ctx.builder_cp_report.build())
}

/// Classify `path_src` without following links and route it to its copier.
fn copy_entry(
    path_src: &Path,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext,
) -> Result<(), CopyTreeError> {
    let meta_src = fs::symlink_metadata(path_src).map_err(|source| CopyTreeError::Stat {
        path: path_src.to_path_buf(),
        source,
    })?;
    spec_cp_ctx.builder_cp_report.add_scanned();

    match EnumEntryKind::from_file_type(meta_src.file_type()) {
        EnumEntryKind::Symlink => copy_symlink(path_src, path_dir_dst, spec_cp_ctx),
        EnumEntryKind::RegularFile => {
            copy_regular_file(path_src, &meta_src, path_dir_dst, spec_cp_ctx)
        }
        EnumEntryKind::Directory => copy_directory(path_src, &meta_src, path_dir_dst, spec_cp_ctx),
        EnumEntryKind::Other => {
            spec_cp_ctx.builder_cp_report.add_warning(
                path_src.to_path_buf(),
                EnumCopyWarningKind::UnsupportedType,
                format!("{} : Wrong file type", path_src.display()),
            );
            spec_cp_ctx.builder_cp_report.add_skipped();
            Ok(())
        }
    }
}

fn copy_regular_file(
    path_src: &Path,
    meta_src: &Metadata,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext,
) -> Result<(), CopyTreeError> {
    let path_file_dst = compose_destination_path(path_src, path_dir_dst);

    let mut file_src = File::open(path_src).map_err(|source| CopyTreeError::OpenSource {
        path: path_src.to_path_buf(),
        source,
    })?;

    if spec_cp_ctx.spec_cp_options.if_dry_run {
        info!(
            "[dry-run] copy file {} -> {}",
            path_src.display(),
            path_file_dst.display()
        );
        spec_cp_ctx.builder_cp_report.add_skipped();
        release_logged(file_src, path_src, spec_cp_ctx);
        return Ok(());
    }

    // Pre-existing destination files are truncated and overwritten.
    let mut file_dst = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(meta_src.permissions().mode() & 0o7777)
        .open(&path_file_dst)
        .map_err(|source| CopyTreeError::CreateDestination {
            path: path_file_dst.clone(),
            source,
        })?;

    let n_bytes = copy_stream(
        &mut file_src,
        &mut file_dst,
        spec_cp_ctx.spec_cp_options.n_bytes_chunk,
    )
    .map_err(|failure| match failure {
        EnumStreamFailure::Read(source) => CopyTreeError::Read {
            path: path_src.to_path_buf(),
            source,
        },
        EnumStreamFailure::Write(source) => CopyTreeError::Write {
            path: path_file_dst.clone(),
            source,
        },
    })?;
    debug!(
        "copied file {} -> {} ({n_bytes} bytes)",
        path_src.display(),
        path_file_dst.display()
    );

    if let Err(e) = apply_times_to_handle(&file_dst, meta_src) {
        spec_cp_ctx.builder_cp_report.add_warning(
            path_file_dst.clone(),
            EnumCopyWarningKind::TimestampsNotApplied,
            format!("futimens() error on {} : {e}", path_file_dst.display()),
        );
    }
    if spec_cp_ctx.spec_cp_options.if_preserve_xattrs {
        copy_xattrs_logged(path_src, &path_file_dst, spec_cp_ctx);
    }

    release_logged(file_src, path_src, spec_cp_ctx);
    release_logged(file_dst, &path_file_dst, spec_cp_ctx);
    spec_cp_ctx.builder_cp_report.add_copied();
    Ok(())
}

fn copy_symlink(
    path_src: &Path,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext,
) -> Result<(), CopyTreeError> {
    let path_target = fs::read_link(path_src).map_err(|source| CopyTreeError::ReadLink {
        path: path_src.to_path_buf(),
        source,
    })?;
    let n_len_target = path_target.as_os_str().len();
    if n_len_target >= N_LEN_PATH_MAX {
        return Err(CopyTreeError::SymlinkTargetTooLong {
            path: path_src.to_path_buf(),
            len: n_len_target,
        });
    }

    let path_link_dst = compose_destination_path(path_src, path_dir_dst);
    if spec_cp_ctx.spec_cp_options.if_dry_run {
        info!(
            "[dry-run] link {} -> {}",
            path_link_dst.display(),
            path_target.display()
        );
        spec_cp_ctx.builder_cp_report.add_skipped();
        return Ok(());
    }

    match symlink(&path_target, &path_link_dst) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            spec_cp_ctx.builder_cp_report.add_warning(
                path_src.to_path_buf(),
                EnumCopyWarningKind::AlreadyExists,
                format!("symlink(): ignored copy of {} : {e}", path_src.display()),
            );
            spec_cp_ctx.builder_cp_report.add_skipped();
            return Ok(());
        }
        Err(source) => {
            return Err(CopyTreeError::CreateSymlink {
                path: path_link_dst,
                source,
            });
        }
    }
    debug!(
        "created link {} -> {}",
        path_link_dst.display(),
        path_target.display()
    );
    spec_cp_ctx.builder_cp_report.add_copied();

    let res_times = fs::symlink_metadata(path_src)
        .map_err(|e| format!("lstat() error on {} : {e}", path_src.display()))
        .and_then(|meta_link| {
            apply_times_to_symlink(&path_link_dst, &meta_link)
                .map_err(|e| format!("utimensat() error on {} : {e}", path_link_dst.display()))
        });
    if let Err(message) = res_times {
        spec_cp_ctx.builder_cp_report.add_warning(
            path_link_dst,
            EnumCopyWarningKind::TimestampsNotApplied,
            message,
        );
    }
    Ok(())
}

fn copy_directory(
    path_src: &Path,
    meta_src: &Metadata,
    path_dir_dst: &Path,
    spec_cp_ctx: &mut SpecCopyContext,
) -> Result<(), CopyTreeError> {
    let path_dir_dst_sub = compose_destination_path(path_src, path_dir_dst);
    let if_dry_run = spec_cp_ctx.spec_cp_options.if_dry_run;

    if if_dry_run {
        info!(
            "[dry-run] create directory {}",
            path_dir_dst_sub.display()
        );
        spec_cp_ctx.builder_cp_report.add_skipped();
    } else {
        match DirBuilder::new()
            .mode(meta_src.permissions().mode() & 0o7777)
            .create(&path_dir_dst_sub)
        {
            Ok(()) => {
                debug!("created directory {}", path_dir_dst_sub.display());
                spec_cp_ctx.builder_cp_report.add_copied();
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                spec_cp_ctx.builder_cp_report.add_warning(
                    path_src.to_path_buf(),
                    EnumCopyWarningKind::AlreadyExists,
                    format!("mkdir(): ignored copy of {} : {e}", path_src.display()),
                );
                spec_cp_ctx.builder_cp_report.add_skipped();
            }
            Err(source) => {
                return Err(CopyTreeError::CreateDirectory {
                    path: path_dir_dst_sub,
                    source,
                });
            }
        }

        apply_dir_times_logged(&path_dir_dst_sub, meta_src, spec_cp_ctx);
        if spec_cp_ctx.spec_cp_options.if_preserve_xattrs {
            copy_xattrs_logged(path_src, &path_dir_dst_sub, spec_cp_ctx);
        }
    }

    // The iteration handle is released before descending.
    let mut l_names = fs::read_dir(path_src)
        .and_then(|iter_entries| {
            iter_entries
                .map(|entry| entry.map(|v| v.file_name()))
                .collect::<Result<Vec<OsString>, io::Error>>()
        })
        .map_err(|source| CopyTreeError::ReadDirectory {
            path: path_src.to_path_buf(),
            source,
        })?;
    l_names.sort();
    trace!(
        "descending into {} ({} entries)",
        path_src.display(),
        l_names.len()
    );

    for name in l_names {
        let path_child_src = join_child_path(path_src, &name);
        copy_entry(&path_child_src, &path_dir_dst_sub, spec_cp_ctx)?;
    }

    if spec_cp_ctx.spec_cp_options.if_restore_dir_times && !if_dry_run {
        apply_dir_times_logged(&path_dir_dst_sub, meta_src, spec_cp_ctx);
    }
    Ok(())
}

fn apply_dir_times_logged(
    path_dir_dst: &Path,
    meta_src: &Metadata,
    spec_cp_ctx: &mut SpecCopyContext,
) {
    if let Err(e) = apply_times_to_path(path_dir_dst, meta_src) {
        spec_cp_ctx.builder_cp_report.add_warning(
            path_dir_dst.to_path_buf(),
            EnumCopyWarningKind::TimestampsNotApplied,
            format!("utimensat() error on {} : {e}", path_dir_dst.display()),
        );
    }
}

fn copy_xattrs_logged(path_src: &Path, path_dst: &Path, spec_cp_ctx: &mut SpecCopyContext) {
    if let Err(l_failures) = copy_xattrs(path_src, path_dst) {
        spec_cp_ctx.builder_cp_report.add_warning(
            path_dst.to_path_buf(),
            EnumCopyWarningKind::XattrsNotCopied,
            format!(
                "xattr error on {} : {}",
                path_dst.display(),
                l_failures.join(", ")
            ),
        );
    }
}

fn release_logged(file: File, path: &Path, spec_cp_ctx: &mut SpecCopyContext) {
    if let Err(e) = release_handle(file) {
        spec_cp_ctx.builder_cp_report.add_warning(
            path.to_path_buf(),
            EnumCopyWarningKind::CloseFailed,
            format!("close() error on {} : {e}", path.display()),
        );
    }
}
