use std::fs;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::RepositoryConfig;
use crate::error::ScrivenerError;
use crate::language;

/// A compiled set of shell-style glob patterns (`*`, `?`, character
/// classes — no recursive `**` semantics). A path matches the set if ANY
/// pattern matches the full repository-relative path, the bare file name,
/// or any single path component; a bare directory name like `__pycache__`
/// therefore matches files anywhere beneath such a directory.
///
/// Evaluation is a logical OR, so pattern order never affects the result.
#[derive(Debug)]
pub struct PatternSet {
    set: GlobSet,
    is_empty: bool,
}

impl PatternSet {
    /// Compile patterns eagerly. An invalid glob is a configuration error.
    pub fn new(patterns: &[String]) -> Result<Self, ScrivenerError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                ScrivenerError::config("pattern", pattern, format!("valid glob ({e})"))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| ScrivenerError::config("patterns", patterns.join(","), e.to_string()))?;
        Ok(Self {
            set,
            is_empty: patterns.is_empty(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// True if any pattern matches the relative path, the bare name, or
    /// any path component.
    pub fn matches(&self, relative_path: &Path, name: &str) -> bool {
        if self.set.is_match(relative_path) || self.set.is_match(name) {
            return true;
        }
        relative_path.components().any(|c| match c {
            Component::Normal(part) => self.set.is_match(Path::new(part)),
            _ => false,
        })
    }
}

/// One file accepted by a scan. Immutable; the scanner holds no state
/// between invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute, symlink-resolved-root-based path.
    pub path: PathBuf,
    /// Path relative to the scan root, used for pattern matching and for
    /// grouping in generated documentation.
    pub relative_path: PathBuf,
    /// Canonical language tag from the extension classifier.
    pub language: &'static str,
    pub size_bytes: u64,
}

/// Scan parameters. Empty include set means match everything; empty
/// exclude set means exclude nothing.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Files strictly larger than this are skipped (a file exactly at the
    /// limit is included).
    pub max_size_bytes: Option<u64>,
    pub follow_symlinks: bool,
}

impl From<&RepositoryConfig> for ScanOptions {
    fn from(cfg: &RepositoryConfig) -> Self {
        Self {
            include_patterns: cfg.include_patterns.clone(),
            exclude_patterns: cfg.exclude_patterns.clone(),
            max_size_bytes: Some(cfg.max_file_size),
            follow_symlinks: cfg.follow_symlinks,
        }
    }
}

/// Scan a directory tree and return the accepted absolute paths, sorted
/// lexicographically by path string. Two scans of an unchanged tree return
/// identical, identically ordered lists.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, ScrivenerError> {
    Ok(scan_records(root, options)?
        .into_iter()
        .map(|r| r.path)
        .collect())
}

/// Scan a directory tree and return one [`FileRecord`] per accepted file,
/// sorted lexicographically by absolute path string.
///
/// Entries that cannot be read or stat-ed (permission errors, files
/// deleted mid-scan) are skipped and the scan continues; a live tree must
/// tolerate churn. Only an unresolvable root is an error.
pub fn scan_records(
    root: &Path,
    options: &ScanOptions,
) -> Result<Vec<FileRecord>, ScrivenerError> {
    let root = fs::canonicalize(root)
        .map_err(|e| ScrivenerError::Scan(format!("cannot resolve root {}: {e}", root.display())))?;

    let include = PatternSet::new(&options.include_patterns)?;
    let exclude = PatternSet::new(&options.exclude_patterns)?;

    let mut records = Vec::new();
    let mut skipped_errors: u64 = 0;
    let mut pending = vec![root.clone()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                skipped_errors += 1;
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    skipped_errors += 1;
                    continue;
                }
            };
            let path = entry.path();

            // Symlink policy is a loop-safety and security boundary: with
            // follow_symlinks off, neither symlinked files nor symlinked
            // directories are visited at all.
            let link_meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "stat failed, skipping");
                    skipped_errors += 1;
                    continue;
                }
            };
            if link_meta.is_symlink() && !options.follow_symlinks {
                continue;
            }

            // Resolve through the link when following; broken links are
            // skipped like any other transient stat failure.
            let meta = if link_meta.is_symlink() {
                match fs::metadata(&path) {
                    Ok(meta) => meta,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "broken symlink, skipping");
                        skipped_errors += 1;
                        continue;
                    }
                }
            } else {
                link_meta
            };

            if meta.is_dir() {
                pending.push(path);
                continue;
            }
            // Only regular files are candidates (no sockets, fifos, devices).
            if !meta.is_file() {
                continue;
            }

            // Defensive: enumeration should never leave the root, but an
            // entry that does is dropped rather than trusted.
            let Ok(relative) = path.strip_prefix(&root) else {
                tracing::debug!(path = %path.display(), "entry outside root, skipping");
                continue;
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();

            // Excludes run first and dominate: a path matching both an
            // include and an exclude pattern is excluded.
            if exclude.matches(relative, &name) {
                continue;
            }
            if !include.is_empty() && !include.matches(relative, &name) {
                continue;
            }

            if let Some(max) = options.max_size_bytes
                && meta.len() > max
            {
                continue;
            }

            records.push(FileRecord {
                language: language::classify(&path),
                relative_path: relative.to_path_buf(),
                size_bytes: meta.len(),
                path,
            });
        }
    }

    if skipped_errors > 0 {
        tracing::warn!(count = skipped_errors, root = %root.display(), "entries skipped during scan");
    }

    // Lexicographic by absolute path string for reproducible output across
    // platforms and repeated runs; downstream generation is keyed by order.
    records.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
    Ok(records)
}
