//! Input discovery: recursively find source documents under the input root.
//!
//! The scanner is stateless. [`Scanner::iter`] can be called any number of
//! times and re-reads the directory tree each time.
//!
//! ## Enumeration order
//!
//! Entries are sorted by file name within each directory and visited
//! depth-first, so for
//!
//! ```text
//! ofds/
//! ├── a.ofd
//! ├── b.ofd
//! └── sub/
//!     └── a.ofd
//! ```
//!
//! the order is `a.ofd`, `b.ofd`, `sub/a.ofd`. The scheduler reserves output
//! names in this order, which is what makes collision suffixes reproducible.

use crate::error::BatchError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Full path of the source document.
    pub source: PathBuf,
    /// File name without the source extension, e.g. `invoice` for `invoice.OFD`.
    pub base_name: String,
}

impl WorkItem {
    /// Build a work item, stripping `extension` (without dot) case-insensitively.
    pub fn new(source: impl Into<PathBuf>, extension: &str) -> Self {
        let source = source.into();
        let file_name = file_name_lossy(&source);
        let base_name = strip_extension(&file_name, extension).to_string();
        Self { source, base_name }
    }

    /// The source file name, used in summaries and log lines.
    pub fn file_name(&self) -> String {
        file_name_lossy(&self.source)
    }
}

/// Recursive, extension-filtered directory scanner.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    extension: String,
}

impl Scanner {
    /// `extension` is given without the dot; matching ignores case.
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree.
    ///
    /// Fails up front with `InvalidInputDirectory` if the root is missing or
    /// not a directory. Every later traversal error is yielded as
    /// `ScanFailure`.
    pub fn iter(&self) -> Result<impl Iterator<Item = Result<WorkItem, BatchError>> + '_, BatchError> {
        if !self.root.is_dir() {
            return Err(BatchError::InvalidInputDirectory {
                path: self.root.clone(),
            });
        }

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        Ok(walker.filter_map(move |entry| match entry {
            Ok(entry) => {
                if entry.file_type().is_dir() {
                    return None;
                }
                let path = entry.path();
                if has_extension(path, &self.extension) {
                    debug!("Found source document: {}", path.display());
                    Some(Ok(WorkItem::new(path, &self.extension)))
                } else {
                    None
                }
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                Some(Err(BatchError::ScanFailure {
                    path,
                    detail: e.to_string(),
                }))
            }
        }))
    }

    /// Collect every work item, aborting on the first traversal error.
    pub fn scan(&self) -> Result<Vec<WorkItem>, BatchError> {
        let items = self.iter()?.collect::<Result<Vec<_>, _>>()?;
        info!(
            "Scanned {} .{} documents in {}",
            items.len(),
            self.extension,
            self.root.display()
        );
        Ok(items)
    }
}

/// Case-insensitive extension test; `ext` has no leading dot.
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn strip_extension<'a>(file_name: &'a str, ext: &str) -> &'a str {
    let suffix_len = ext.len() + 1;
    if file_name.len() > suffix_len && file_name.is_char_boundary(file_name.len() - suffix_len) {
        let (stem, tail) = file_name.split_at(file_name.len() - suffix_len);
        if tail.starts_with('.') && tail[1..].eq_ignore_ascii_case(ext) {
            return stem;
        }
    }
    file_name
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
