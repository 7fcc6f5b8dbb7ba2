//! Generic filesystem verbs
//!
//! Implementations provide listing, metadata and the primitive mutations;
//! everything that can be expressed on top of those (existence checks,
//! walking, globbing, disk usage, recursive copy and move, local transfers)
//! comes as default methods.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use globset::GlobBuilder;
use tracing::debug;

use crate::error::{HffsError, Result};
use crate::hub::LfsInfo;
use crate::path;

/// File type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// Metadata of a file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Full path without protocol
    pub name: String,
    pub size: u64,
    pub file_type: FileType,
    /// Git blob or tree id
    pub blob_id: Option<String>,
    pub lfs: Option<LfsInfo>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            file_type: FileType::File,
            blob_id: None,
            lfs: None,
            last_modified: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            file_type: FileType::Directory,
            blob_id: None,
            lfs: None,
            last_modified: None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }
}

/// Whether a path contains glob characters
pub fn has_magic(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Directory a glob search starts from and how deep it has to go
///
/// `None` depth means unlimited (the pattern contains `**`).
pub fn glob_root(pattern: &str) -> (&str, Option<usize>) {
    let magic = pattern.find(['*', '?', '[']).unwrap_or(pattern.len());
    let root = match pattern[..magic].rfind('/') {
        Some(idx) => &pattern[..idx],
        None => "",
    };

    let depth = if pattern.contains("**") {
        None
    } else {
        let rest = pattern[root.len()..].trim_start_matches('/');
        Some(rest.matches('/').count() + 1)
    };
    (root, depth)
}

fn tolerate_missing<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() || matches!(e, HffsError::NotSupported(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Hierarchical filesystem over some storage
///
/// Paths are `/`-separated strings; implementations decide how to interpret
/// them and whether a protocol prefix is accepted.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// List the entries of a directory, or the single entry of a file
    async fn ls(&self, path: &str, refresh: bool) -> Result<Vec<FileInfo>>;

    /// Metadata of a path
    async fn info(&self, path: &str) -> Result<FileInfo>;

    /// Read a whole file, or the byte range `range` of it
    async fn cat_file(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes>;

    /// Create or overwrite a file with `data`
    async fn pipe_file(&self, path: &str, data: Bytes) -> Result<()>;

    async fn rm_file(&self, path: &str) -> Result<()>;

    /// Remove a path; directories need `recursive`
    async fn rm(&self, path: &str, recursive: bool, maxdepth: Option<usize>) -> Result<()>;

    /// Copy a single file
    async fn cp_file(&self, src: &str, dst: &str) -> Result<()>;

    /// Last modification time of a file
    async fn modified(&self, path: &str) -> Result<DateTime<Utc>>;

    /// Forget cached listings for `path`, or everything with `None`
    fn invalidate_cache(&self, path: Option<&str>);

    /// Normalize a user supplied path
    fn strip_protocol(&self, path: &str) -> String {
        path.trim_end_matches('/').to_string()
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tolerate_missing(self.info(path).await)?.is_some())
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(tolerate_missing(self.info(path).await)?.is_some_and(|i| i.is_dir()))
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(tolerate_missing(self.info(path).await)?.is_some_and(|i| i.is_file()))
    }

    async fn cat(&self, path: &str) -> Result<Bytes> {
        self.cat_file(path, None).await
    }

    /// Every entry below `path`, sorted by name
    ///
    /// `maxdepth` of 1 means direct children only. With `withdirs`,
    /// directories (including `path` itself) are part of the result.
    async fn find(
        &self,
        path: &str,
        maxdepth: Option<usize>,
        withdirs: bool,
    ) -> Result<Vec<FileInfo>> {
        if maxdepth == Some(0) {
            return Err(HffsError::InvalidArgument(
                "maxdepth must be at least 1".to_string(),
            ));
        }

        let path = self.strip_protocol(path);
        let mut found: BTreeMap<String, FileInfo> = BTreeMap::new();

        let root = self.info(&path).await?;
        if root.is_file() {
            found.insert(root.name.clone(), root);
            return Ok(found.into_values().collect());
        }
        if withdirs {
            found.insert(root.name.clone(), root.clone());
        }

        let mut pending = vec![(root.name, 1usize)];
        while let Some((dir, depth)) = pending.pop() {
            for entry in self.ls(&dir, false).await? {
                if entry.is_dir() {
                    if maxdepth.map_or(true, |max| depth < max) {
                        pending.push((entry.name.clone(), depth + 1));
                    }
                    if withdirs {
                        found.insert(entry.name.clone(), entry);
                    }
                } else {
                    found.insert(entry.name.clone(), entry);
                }
            }
        }

        debug!("find {}: {} entries", path, found.len());
        Ok(found.into_values().collect())
    }

    /// Paths matching a glob pattern (`*`, `?`, `[..]`, `**`), sorted
    ///
    /// `*` never matches across `/`.
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = self.strip_protocol(pattern);
        if !has_magic(&pattern) {
            return Ok(if self.exists(&pattern).await? {
                vec![pattern]
            } else {
                Vec::new()
            });
        }

        let matcher = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| HffsError::InvalidArgument(format!("Invalid glob '{}': {}", pattern, e)))?
            .compile_matcher();

        let (root, depth) = glob_root(&pattern);
        let candidates = match tolerate_missing(self.find(root, depth, true).await)? {
            Some(candidates) => candidates,
            None => return Ok(Vec::new()),
        };

        Ok(candidates
            .into_iter()
            .map(|info| info.name)
            .filter(|name| matcher.is_match(name))
            .collect())
    }

    /// Total size of the files below `path`
    async fn du(&self, path: &str, maxdepth: Option<usize>) -> Result<u64> {
        Ok(self.du_detail(path, maxdepth).await?.values().sum())
    }

    /// Size of each file below `path`
    async fn du_detail(&self, path: &str, maxdepth: Option<usize>) -> Result<BTreeMap<String, u64>> {
        Ok(self
            .find(path, maxdepth, false)
            .await?
            .into_iter()
            .map(|info| (info.name, info.size))
            .collect())
    }

    /// Expand globs and, with `recursive`, directories into concrete paths
    async fn expand_path(
        &self,
        paths: &[String],
        recursive: bool,
        maxdepth: Option<usize>,
    ) -> Result<Vec<String>> {
        let mut out = BTreeSet::new();

        for raw in paths {
            let p = self.strip_protocol(raw);
            if has_magic(&p) {
                for matched in self.glob(&p).await? {
                    if recursive {
                        for info in self.find(&matched, maxdepth, true).await? {
                            out.insert(info.name);
                        }
                    }
                    out.insert(matched);
                }
            } else if recursive {
                for info in self.find(&p, maxdepth, true).await? {
                    out.insert(info.name);
                }
            } else if self.exists(&p).await? {
                out.insert(p);
            }
        }

        if out.is_empty() {
            return Err(HffsError::NotFound(paths.join(", ")));
        }
        Ok(out.into_iter().collect())
    }

    /// Copy a file, or a directory tree with `recursive`
    async fn copy(&self, src: &str, dst: &str, recursive: bool) -> Result<()> {
        let src = self.strip_protocol(src);
        let dst = self.strip_protocol(dst);

        let root = self.info(&src).await?;
        if !recursive || root.is_file() {
            return self.cp_file(&src, &dst).await;
        }

        for info in self.find(&src, None, false).await? {
            let rel = info
                .name
                .strip_prefix(root.name.as_str())
                .unwrap_or(&info.name)
                .trim_start_matches('/');
            self.cp_file(&info.name, &path::join(&dst, rel)).await?;
        }
        Ok(())
    }

    /// Copy then remove the source
    async fn mv(&self, src: &str, dst: &str, recursive: bool) -> Result<()> {
        self.copy(src, dst, recursive).await?;
        self.rm(src, recursive, None).await
    }

    /// Download a file to a local path
    async fn get_file(&self, rpath: &str, lpath: &Path) -> Result<()> {
        if self.is_dir(rpath).await? {
            tokio::fs::create_dir_all(lpath).await?;
            return Ok(());
        }
        let data = self.cat_file(rpath, None).await?;
        if let Some(parent) = lpath.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(lpath, &data).await?;
        Ok(())
    }

    /// Upload a local file
    async fn put_file(&self, lpath: &Path, rpath: &str) -> Result<()> {
        let data = tokio::fs::read(lpath).await?;
        self.pipe_file(rpath, Bytes::from(data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_magic() {
        assert!(has_magic("data/*.txt"));
        assert!(has_magic("data/file?.txt"));
        assert!(has_magic("data/[ab].txt"));
        assert!(!has_magic("data/file.txt"));
    }

    #[test]
    fn test_glob_root_and_depth() {
        assert_eq!(glob_root("user/repo/*"), ("user/repo", Some(1)));
        assert_eq!(glob_root("user/repo/data/*.txt"), ("user/repo/data", Some(1)));
        assert_eq!(glob_root("user/repo/*/x.txt"), ("user/repo", Some(2)));
        assert_eq!(glob_root("user/repo/**/*.bin"), ("user/repo", None));
        assert_eq!(glob_root("*"), ("", Some(1)));
    }

    #[test]
    fn test_file_info_kinds() {
        let file = FileInfo::file("a/b.txt", 3);
        assert!(file.is_file());
        assert!(!file.is_dir());
        let dir = FileInfo::directory("a");
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
    }
}
