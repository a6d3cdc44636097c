//! Copy report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumCopyWarningKind, SpecCopyWarning};

/// Aggregate counters and diagnostics for one `copy_paths` run.
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Total entries handed to the type dispatcher.
    pub cnt_scanned: u64,
    /// Number of entries created or overwritten at the destination.
    pub cnt_copied: u64,
    /// Number of entries skipped (collision, unsupported type or dry-run).
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during traversal/copy.
    pub warnings: Vec<SpecCopyWarning>,
}

impl ReportCopy {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Warnings of one category.
    pub fn warnings_of(
        &self,
        kind: EnumCopyWarningKind,
    ) -> impl Iterator<Item = &SpecCopyWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} scanned={} copied={} skipped={} warnings={}",
            self.cnt_scanned,
            self.cnt_copied,
            self.cnt_skipped,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for copy statistics.
///
/// Counts only move through the `add_*` methods.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    cnt_scanned: u64,
    cnt_copied: u64,
    cnt_skipped: u64,
    warnings: Vec<SpecCopyWarning>,
}

impl ReportCopyBuilder {
    /// Increment scanned count by one.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Increment copied count by one.
    pub fn add_copied(&mut self) {
        self.cnt_copied += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Log one path-scoped warning to the diagnostic channel and keep it.
    pub fn add_warning(&mut self, path: PathBuf, kind: EnumCopyWarningKind, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(SpecCopyWarning {
            path,
            kind,
            message,
        });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportCopy {
        ReportCopy {
            cnt_scanned: self.cnt_scanned,
            cnt_copied: self.cnt_copied,
            cnt_skipped: self.cnt_skipped,
            warnings: self.warnings,
        }
    }
}
