//! Filesystem over Hugging Face Hub repositories
//!
//! Paths name a repository and a path inside it:
//!
//! ```text
//! [hf://][datasets/|spaces/]<repo_id>[@<revision>]/<path/in/repo>
//! [hf://][<repo_type>/]<repo_id>[@<revision>]:/<path/in/repo>
//! ```
//!
//! Listings come from recursive tree requests and are kept in a
//! [`DirCache`]. Every mutation is one commit on the target revision.

pub mod dircache;
pub mod file;

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::auth;
use crate::config::{Config, DEFAULT_BLOCK_SIZE};
use crate::error::{HffsError, Result};
use crate::filesystem::{has_magic, FileInfo, FileSystem, FileType};
use crate::hub::{
    CommitInfo, CommitOperation, CommitRequest, HttpHub, HttpHubConfig, HubClient, RepoEntry,
    UploadSource,
};
use crate::path::{self, PathCandidates, RepoRef, RepoType, ResolvedPath};

pub use dircache::DirCache;
pub use file::{HfFileReader, HfFileWriter};

/// Commit message overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Replaces the generated summary ("Upload ...", "Delete ...")
    pub message: Option<String>,
    pub description: Option<String>,
}

/// Filesystem-wide settings
#[derive(Debug, Clone)]
pub struct HfFileSystemOptions {
    /// Revision used when a path does not name one; `main` when unset
    pub revision: Option<String>,
    /// Read-ahead block size, also the writer's spill threshold
    pub block_size: usize,
    pub listings_ttl: Option<std::time::Duration>,
    /// Repo type of explicit `:/` paths without a type prefix
    pub default_repo_type: RepoType,
    pub commit: CommitOptions,
}

impl Default for HfFileSystemOptions {
    fn default() -> Self {
        Self {
            revision: None,
            block_size: DEFAULT_BLOCK_SIZE,
            listings_ttl: None,
            default_repo_type: RepoType::Model,
            commit: CommitOptions::default(),
        }
    }
}

/// How to open a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

/// An open file
pub enum HfFile {
    Reader(HfFileReader),
    Writer(HfFileWriter),
}

type RepoCacheKey = (RepoRef, Option<String>);

/// Filesystem over Hub repositories
///
/// Cloning is cheap; clones share the hub client and caches.
#[derive(Clone)]
pub struct HfFileSystem {
    hub: Arc<dyn HubClient>,
    options: Arc<HfFileSystemOptions>,
    dircache: Arc<DirCache>,
    /// Whether `(repo, revision)` exists
    repo_cache: Arc<DashMap<RepoCacheKey, bool>>,
}

impl HfFileSystem {
    pub fn new(hub: Arc<dyn HubClient>, options: HfFileSystemOptions) -> Self {
        Self {
            hub,
            dircache: Arc::new(DirCache::new(options.listings_ttl)),
            options: Arc::new(options),
            repo_cache: Arc::new(DashMap::new()),
        }
    }

    /// Filesystem talking to the Hub over HTTP, as configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let hub = HttpHub::new(
            HttpHubConfig {
                endpoint: config.hub.endpoint.clone(),
                timeout: config.http.timeout,
                max_retries: config.http.max_retries,
                ..Default::default()
            },
            auth::provider_for(config.hub.token.clone()),
        )?;

        Ok(Self::new(
            Arc::new(hub),
            HfFileSystemOptions {
                revision: config.hub.revision.clone(),
                block_size: config.cache.block_size,
                listings_ttl: config.cache.listings_ttl,
                default_repo_type: config.hub.repo_type,
                commit: CommitOptions::default(),
            },
        ))
    }

    /// A view of this filesystem committing with `commit` options
    pub fn with_commit_options(&self, commit: CommitOptions) -> Self {
        let mut options = (*self.options).clone();
        options.commit = commit;
        Self {
            options: Arc::new(options),
            ..self.clone()
        }
    }

    pub fn options(&self) -> &HfFileSystemOptions {
        &self.options
    }

    pub fn hub(&self) -> &Arc<dyn HubClient> {
        &self.hub
    }

    pub fn dircache(&self) -> &DirCache {
        &self.dircache
    }

    fn revision_for<'a>(&'a self, resolved: &'a ResolvedPath) -> &'a str {
        resolved.revision_or(self.options.revision.as_deref())
    }

    /// Whether a repository exists at a revision; cached
    ///
    /// A missing revision of an existing repository is an error rather than
    /// `false`, so that probing stops there.
    async fn repo_exists(&self, repo: &RepoRef, revision: Option<&str>) -> Result<bool> {
        let revision = revision.or(self.options.revision.as_deref());
        let key = (repo.clone(), revision.map(str::to_string));
        if let Some(exists) = self.repo_cache.get(&key) {
            return Ok(*exists);
        }

        let exists = match self.hub.repo_info(repo, revision).await {
            Ok(_) => true,
            Err(HffsError::RepositoryNotFound(_))
            | Err(HffsError::NotFound(_))
            | Err(HffsError::InvalidPath(_)) => false,
            Err(e) => return Err(e),
        };
        self.repo_cache.insert(key, exists);
        Ok(exists)
    }

    /// Split a path into repository, revision and path in repo
    pub async fn resolve(&self, path: &str) -> Result<ResolvedPath> {
        let (repo_type, segments) =
            match path::candidates(path, self.options.default_repo_type)? {
                PathCandidates::Explicit(resolved) => return Ok(resolved),
                PathCandidates::Probe {
                    repo_type,
                    segments,
                } => (repo_type, segments),
            };

        // a segment that is no valid `name[@rev]` rules the namespace candidate out
        if segments.len() >= 2 && !segments[0].contains('@') {
            if let Ok((name, revision)) = path::split_revision(&segments[1]) {
                let repo = RepoRef::new(repo_type, format!("{}/{}", segments[0], name));
                if self.repo_exists(&repo, revision.as_deref()).await? {
                    return Ok(ResolvedPath {
                        repo,
                        revision,
                        path_in_repo: segments[2..].join("/"),
                    });
                }
            }
        }

        let (name, revision) = path::split_revision(&segments[0])?;
        let repo = RepoRef::new(repo_type, name);
        if self.repo_exists(&repo, revision.as_deref()).await? {
            return Ok(ResolvedPath {
                repo,
                revision,
                path_in_repo: segments[1..].join("/"),
            });
        }

        if segments.len() == 1 {
            Err(HffsError::NotSupported(
                "Access to repositories lists is not implemented".to_string(),
            ))
        } else {
            Err(HffsError::NotFound(format!(
                "No such repository: {}",
                path::strip_protocol(path)
            )))
        }
    }

    fn to_file_info(resolved: &ResolvedPath, entry: RepoEntry) -> FileInfo {
        let name = resolved.sibling(&entry.path);
        if !entry.is_file() {
            return FileInfo::directory(name);
        }
        FileInfo {
            name,
            size: entry.size,
            file_type: FileType::File,
            blob_id: (!entry.oid.is_empty()).then_some(entry.oid),
            lfs: entry.lfs,
            last_modified: entry.last_commit.map(|c| c.date),
        }
    }

    /// Look `key` up in the listing cache: its own listing, or its file entry
    /// in the parent listing
    fn cached_ls(&self, key: &str, is_root: bool) -> Option<Result<Vec<FileInfo>>> {
        if let Some(entries) = self.dircache.get(key) {
            return Some(Ok(entries));
        }
        if is_root {
            return None;
        }
        let siblings = self.dircache.get(path::parent(key))?;
        match siblings.into_iter().find(|e| e.name == key) {
            Some(entry) if entry.is_file() => Some(Ok(vec![entry])),
            // a directory whose own listing is not loaded yet
            Some(_) => None,
            None => Some(Err(HffsError::NotFound(key.to_string()))),
        }
    }

    async fn ls_resolved(&self, resolved: &ResolvedPath, refresh: bool) -> Result<Vec<FileInfo>> {
        let key = resolved.canonical();
        if !refresh {
            if let Some(cached) = self.cached_ls(&key, resolved.is_repo_root()) {
                return cached;
            }
        }

        let list_from = path::parent(&resolved.path_in_repo);
        let listed = resolved.sibling(list_from);
        let revision = self.revision_for(resolved);
        debug!("listing {} at {}", listed, revision);

        let entries = self
            .hub
            .list_tree_all(&resolved.repo, revision, list_from, true)
            .await?;
        let infos = entries
            .into_iter()
            .map(|entry| Self::to_file_info(resolved, entry))
            .collect();
        self.dircache.fill(&resolved.root(), &listed, infos);

        self.cached_ls(&key, resolved.is_repo_root())
            .unwrap_or_else(|| Err(HffsError::NotFound(key)))
    }

    async fn info_resolved(&self, resolved: &ResolvedPath) -> Result<FileInfo> {
        if resolved.is_repo_root() {
            return Ok(FileInfo::directory(resolved.root()));
        }

        let parent = ResolvedPath {
            path_in_repo: path::parent(&resolved.path_in_repo).to_string(),
            ..resolved.clone()
        };
        let key = resolved.canonical();
        self.ls_resolved(&parent, false)
            .await?
            .into_iter()
            .find(|e| e.name == key)
            .ok_or(HffsError::NotFound(key))
    }

    /// Create one commit on `revision`, applying commit message overrides
    pub(crate) async fn commit(
        &self,
        resolved: &ResolvedPath,
        revision: &str,
        operations: Vec<CommitOperation>,
        summary: String,
    ) -> Result<CommitInfo> {
        let request = CommitRequest {
            summary: self.options.commit.message.clone().unwrap_or(summary),
            description: self.options.commit.description.clone(),
            operations,
        };
        self.hub
            .create_commit(&resolved.repo, revision, request)
            .await
    }

    /// Drop cached listings touched by a change at `resolved`
    pub(crate) fn invalidate_resolved(&self, resolved: &ResolvedPath) {
        self.dircache.invalidate(&resolved.canonical());
    }

    pub async fn open_read(&self, path: &str) -> Result<HfFileReader> {
        let resolved = self.resolve(path).await?;
        let info = self.info_resolved(&resolved).await?;
        if info.is_dir() {
            return Err(HffsError::IsADirectory(info.name));
        }
        let revision = self.revision_for(&resolved).to_string();
        Ok(HfFileReader::new(
            self.hub.clone(),
            resolved,
            revision,
            info.size,
            self.options.block_size,
        ))
    }

    pub async fn open_write(&self, path: &str) -> Result<HfFileWriter> {
        let resolved = self.resolve(path).await?;
        if resolved.is_repo_root() {
            return Err(HffsError::IsADirectory(resolved.canonical()));
        }
        let revision = self.revision_for(&resolved).to_string();
        Ok(HfFileWriter::new(
            self.clone(),
            resolved,
            revision,
            self.options.block_size,
        ))
    }

    pub async fn open(&self, path: &str, mode: OpenMode) -> Result<HfFile> {
        match mode {
            OpenMode::Read => Ok(HfFile::Reader(self.open_read(path).await?)),
            OpenMode::Write => Ok(HfFile::Writer(self.open_write(path).await?)),
            OpenMode::Append => Err(HffsError::NotSupported(
                "Appending to remote files is not yet supported.".to_string(),
            )),
        }
    }

    /// Source of a copy: an LFS reference inside the same repository, else
    /// the content itself
    async fn copy_source(
        &self,
        info: &FileInfo,
        same_repo: bool,
        dst_path_in_repo: String,
    ) -> Result<CommitOperation> {
        match (&info.lfs, same_repo) {
            (Some(lfs), true) => Ok(CommitOperation::CopyLfs {
                path_in_repo: dst_path_in_repo,
                oid: lfs.oid.clone(),
                size: lfs.size,
            }),
            _ => Ok(CommitOperation::Add {
                path_in_repo: dst_path_in_repo,
                source: UploadSource::Bytes(self.cat_file(&info.name, None).await?),
            }),
        }
    }

    /// Files to move and their destination path in repo
    async fn move_plan(
        &self,
        src: &ResolvedPath,
        dst: &ResolvedPath,
        recursive: bool,
    ) -> Result<Vec<(FileInfo, String)>> {
        let root = self.info_resolved(src).await?;
        if root.is_file() {
            return Ok(vec![(root, dst.path_in_repo.clone())]);
        }
        if !recursive {
            return Err(HffsError::IsADirectory(root.name));
        }

        let mut plan = Vec::new();
        for info in self.find(&root.name, None, false).await? {
            let rel = src.relative(&info.name).ok_or_else(|| {
                HffsError::InvalidPath(format!("{} is outside {}", info.name, root.name))
            })?;
            let rel = rel
                .strip_prefix(src.path_in_repo.as_str())
                .unwrap_or(rel)
                .trim_start_matches('/');
            plan.push((info.clone(), path::join(&dst.path_in_repo, rel)));
        }
        Ok(plan)
    }
}

fn same_target(fs: &HfFileSystem, a: &ResolvedPath, b: &ResolvedPath) -> bool {
    a.repo == b.repo && fs.revision_for(a) == fs.revision_for(b)
}

#[async_trait]
impl FileSystem for HfFileSystem {
    /// Filesystem name of a path; explicit `:/` paths map to their canonical
    /// name so that patterns and listed names agree
    fn strip_protocol(&self, path: &str) -> String {
        match path::candidates(path, self.options.default_repo_type) {
            Ok(PathCandidates::Explicit(resolved)) => resolved.canonical(),
            _ => path::strip_protocol(path),
        }
    }

    async fn ls(&self, path: &str, refresh: bool) -> Result<Vec<FileInfo>> {
        let resolved = self.resolve(path).await?;
        self.ls_resolved(&resolved, refresh).await
    }

    async fn info(&self, path: &str) -> Result<FileInfo> {
        let resolved = self.resolve(path).await?;
        self.info_resolved(&resolved).await
    }

    async fn cat_file(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes> {
        let resolved = self.resolve(path).await?;
        let info = self.info_resolved(&resolved).await?;
        if info.is_dir() {
            return Err(HffsError::IsADirectory(info.name));
        }

        let (start, end) = match range {
            Some(range) => (range.start.min(info.size), range.end.min(info.size)),
            None => (0, info.size),
        };
        if start >= end {
            return Ok(Bytes::new());
        }
        self.hub
            .fetch_range(
                &resolved.repo,
                self.revision_for(&resolved),
                &resolved.path_in_repo,
                start,
                end,
            )
            .await
    }

    async fn pipe_file(&self, path: &str, data: Bytes) -> Result<()> {
        let mut writer = self.open_write(path).await?;
        writer.write(&data).await?;
        writer.close().await?;
        Ok(())
    }

    async fn put_file(&self, lpath: &Path, rpath: &str) -> Result<()> {
        let resolved = self.resolve(rpath).await?;
        if resolved.is_repo_root() {
            return Err(HffsError::IsADirectory(resolved.canonical()));
        }
        let revision = self.revision_for(&resolved).to_string();
        let result = self
            .commit(
                &resolved,
                &revision,
                vec![CommitOperation::Add {
                    path_in_repo: resolved.path_in_repo.clone(),
                    source: UploadSource::File(lpath.to_path_buf()),
                }],
                format!("Upload {}", self.strip_protocol(rpath)),
            )
            .await;
        self.invalidate_resolved(&resolved);
        result.map(|_| ())
    }

    async fn rm_file(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path).await?;
        let revision = self.revision_for(&resolved).to_string();
        let result = self
            .commit(
                &resolved,
                &revision,
                vec![CommitOperation::Delete {
                    path_in_repo: resolved.path_in_repo.clone(),
                }],
                format!("Delete {}", self.strip_protocol(path)),
            )
            .await;
        self.invalidate_resolved(&resolved);
        result.map(|_| ())
    }

    async fn rm(&self, path: &str, recursive: bool, maxdepth: Option<usize>) -> Result<()> {
        let resolved = self.resolve(path).await?;
        let revision = self.revision_for(&resolved).to_string();

        let mut summary = format!("Delete {}", self.strip_protocol(path));
        if recursive {
            summary.push_str(" recursively");
        }
        if let Some(depth) = maxdepth {
            summary.push_str(&format!(" up to depth {}", depth));
        }

        // a whole folder goes in one operation
        if recursive
            && maxdepth.is_none()
            && !has_magic(&resolved.path_in_repo)
            && !resolved.is_repo_root()
            && self.info_resolved(&resolved).await?.is_dir()
        {
            let operations = vec![CommitOperation::DeleteFolder {
                path_in_repo: resolved.path_in_repo.clone(),
            }];
            let result = self.commit(&resolved, &revision, operations, summary).await;
            self.invalidate_resolved(&resolved);
            return result.map(|_| ());
        }

        let mut operations = Vec::new();
        for expanded in self
            .expand_path(&[path.to_string()], recursive, maxdepth)
            .await?
        {
            let info = self.info(&expanded).await?;
            if !info.is_file() {
                continue;
            }
            let path_in_repo = resolved.relative(&info.name).ok_or_else(|| {
                HffsError::InvalidPath(format!("{} is outside {}", info.name, resolved.root()))
            })?;
            operations.push(CommitOperation::Delete {
                path_in_repo: path_in_repo.to_string(),
            });
        }

        if operations.is_empty() {
            return Err(HffsError::IsADirectory(resolved.canonical()));
        }

        let result = self.commit(&resolved, &revision, operations, summary).await;
        self.invalidate_resolved(&resolved);
        result.map(|_| ())
    }

    async fn cp_file(&self, src: &str, dst: &str) -> Result<()> {
        let src_resolved = self.resolve(src).await?;
        let dst_resolved = self.resolve(dst).await?;
        let info = self.info_resolved(&src_resolved).await?;
        if info.is_dir() {
            return Err(HffsError::IsADirectory(info.name));
        }
        if dst_resolved.is_repo_root() {
            return Err(HffsError::IsADirectory(dst_resolved.canonical()));
        }

        let same_repo = same_target(self, &src_resolved, &dst_resolved);
        let operation = self
            .copy_source(&info, same_repo, dst_resolved.path_in_repo.clone())
            .await?;
        let revision = self.revision_for(&dst_resolved).to_string();
        let result = self
            .commit(
                &dst_resolved,
                &revision,
                vec![operation],
                format!(
                    "Copy {} to {}",
                    self.strip_protocol(src),
                    self.strip_protocol(dst)
                ),
            )
            .await;
        self.invalidate_resolved(&src_resolved);
        self.invalidate_resolved(&dst_resolved);
        result.map(|_| ())
    }

    async fn mv(&self, src: &str, dst: &str, recursive: bool) -> Result<()> {
        let src_resolved = self.resolve(src).await?;
        let dst_resolved = self.resolve(dst).await?;

        let same_repo = same_target(self, &src_resolved, &dst_resolved);
        if same_repo && src_resolved.path_in_repo == dst_resolved.path_in_repo {
            debug!("mv {}: source and destination are the same", src);
            return Ok(());
        }
        if !same_repo {
            self.copy(src, dst, recursive).await?;
            return self.rm(src, recursive, None).await;
        }

        let plan = self
            .move_plan(&src_resolved, &dst_resolved, recursive)
            .await?;
        let destinations: HashSet<&str> = plan.iter().map(|(_, dst)| dst.as_str()).collect();

        let mut copies = Vec::with_capacity(plan.len());
        let mut deletes = Vec::with_capacity(plan.len());
        for (info, dst_path_in_repo) in &plan {
            copies.push(
                self.copy_source(info, true, dst_path_in_repo.clone())
                    .await?,
            );
            let src_path_in_repo = src_resolved.relative(&info.name).unwrap_or_default();
            // overwritten by this same commit
            if !destinations.contains(src_path_in_repo) {
                deletes.push(CommitOperation::Delete {
                    path_in_repo: src_path_in_repo.to_string(),
                });
            }
        }
        let mut operations = copies;
        operations.extend(deletes);

        let revision = self.revision_for(&dst_resolved).to_string();
        let result = self
            .commit(
                &dst_resolved,
                &revision,
                operations,
                format!(
                    "Move {} to {}",
                    self.strip_protocol(src),
                    self.strip_protocol(dst)
                ),
            )
            .await;
        self.invalidate_resolved(&src_resolved);
        self.invalidate_resolved(&dst_resolved);
        result.map(|_| ())
    }

    async fn modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let resolved = self.resolve(path).await?;
        let info = self.info_resolved(&resolved).await?;
        if !info.is_file() {
            return Err(HffsError::NotFound(format!("{} is not a file", info.name)));
        }
        if let Some(date) = info.last_modified {
            return Ok(date);
        }

        let entries = self
            .hub
            .paths_info(
                &resolved.repo,
                self.revision_for(&resolved),
                &[resolved.path_in_repo.clone()],
                true,
            )
            .await?;
        entries
            .into_iter()
            .find_map(|e| e.last_commit.map(|c| c.date))
            .ok_or_else(|| HffsError::NotFound(format!("No commit found for {}", info.name)))
    }

    fn invalidate_cache(&self, path: Option<&str>) {
        match path {
            None => {
                self.dircache.clear();
                self.repo_cache.clear();
            }
            Some(p) => self.dircache.invalidate(&self.strip_protocol(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MemoryHub;

    async fn fs_with_repo(repo: RepoRef) -> (Arc<MemoryHub>, HfFileSystem) {
        let hub = Arc::new(MemoryHub::new());
        hub.create_repo(&repo).unwrap();
        let fs = HfFileSystem::new(hub.clone(), HfFileSystemOptions::default());
        (hub, fs)
    }

    #[tokio::test]
    async fn test_resolve_namespace_then_name() {
        let (hub, fs) = fs_with_repo(RepoRef::dataset("user/data")).await;
        hub.create_repo(&RepoRef::model("gpt2")).unwrap();

        let resolved = fs.resolve("hf://datasets/user/data/a/b.txt").await.unwrap();
        assert_eq!(resolved.repo, RepoRef::dataset("user/data"));
        assert_eq!(resolved.path_in_repo, "a/b.txt");

        let resolved = fs.resolve("gpt2/config.json").await.unwrap();
        assert_eq!(resolved.repo, RepoRef::model("gpt2"));
        assert_eq!(resolved.path_in_repo, "config.json");
    }

    #[tokio::test]
    async fn test_resolve_invalid_namespace_candidate_falls_through() {
        let (hub, fs) = fs_with_repo(RepoRef::dataset("user/data")).await;
        hub.create_repo(&RepoRef::model("gpt2")).unwrap();

        let resolved = fs.resolve("gpt2/notes@").await.unwrap();
        assert_eq!(resolved.repo, RepoRef::model("gpt2"));
        assert_eq!(resolved.path_in_repo, "notes@");
    }

    #[tokio::test]
    async fn test_strip_protocol_canonicalizes_explicit_form() {
        let (_hub, fs) = fs_with_repo(RepoRef::dataset("user/data")).await;
        assert_eq!(
            fs.strip_protocol("hf://datasets/user/data:/a/*.txt"),
            "datasets/user/data/a/*.txt"
        );
        assert_eq!(fs.strip_protocol("hf://gpt2/a/"), "gpt2/a");
    }

    #[tokio::test]
    async fn test_resolve_revision_in_path() {
        let repo = RepoRef::dataset("user/data");
        let (hub, fs) = fs_with_repo(repo.clone()).await;
        hub.create_branch(&repo, "refs/pr/1", "main").unwrap();

        let resolved = fs
            .resolve("datasets/user/data@refs%2Fpr%2F1/x.txt")
            .await
            .unwrap();
        assert_eq!(resolved.revision.as_deref(), Some("refs/pr/1"));
        assert_eq!(resolved.canonical(), "datasets/user/data@refs%2Fpr%2F1/x.txt");
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let (_hub, fs) = fs_with_repo(RepoRef::dataset("user/data")).await;

        assert!(matches!(
            fs.resolve("").await,
            Err(HffsError::NotSupported(_))
        ));
        assert!(matches!(
            fs.resolve("datasets").await,
            Err(HffsError::NotSupported(_))
        ));
        assert!(matches!(
            fs.resolve("datasets/user").await,
            Err(HffsError::NotSupported(_))
        ));
        assert!(matches!(
            fs.resolve("datasets/nobody/nothing/file").await,
            Err(HffsError::NotFound(_))
        ));
        assert!(matches!(
            fs.resolve("datasets/user/data@nope/file").await,
            Err(HffsError::RevisionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_explicit_form_skips_probing() {
        let (_hub, fs) = fs_with_repo(RepoRef::dataset("user/data")).await;
        let resolved = fs.resolve("hf://dataset/user/data:/x/y.txt").await.unwrap();
        assert_eq!(resolved.repo, RepoRef::dataset("user/data"));
        assert_eq!(resolved.path_in_repo, "x/y.txt");
        assert!(fs.repo_cache.is_empty());
    }

    #[tokio::test]
    async fn test_repo_existence_is_cached() {
        let (_hub, fs) = fs_with_repo(RepoRef::dataset("user/data")).await;
        fs.resolve("datasets/user/data/a").await.unwrap();
        fs.resolve("datasets/user/data/b").await.unwrap();
        assert_eq!(fs.repo_cache.len(), 1);

        fs.invalidate_cache(None);
        assert!(fs.repo_cache.is_empty());
    }

    #[tokio::test]
    async fn test_commit_options_override_message() {
        let repo = RepoRef::dataset("user/data");
        let (hub, fs) = fs_with_repo(repo.clone()).await;
        let fs = fs.with_commit_options(CommitOptions {
            message: Some("custom message".to_string()),
            description: Some("details".to_string()),
        });

        fs.pipe_file("datasets/user/data/a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap();
        assert_eq!(
            hub.last_commit_summary(&repo, "main").as_deref(),
            Some("custom message")
        );
        assert_eq!(
            hub.last_commit_description(&repo, "main").as_deref(),
            Some("details")
        );
    }

    #[tokio::test]
    async fn test_fs_wide_revision() {
        let repo = RepoRef::dataset("user/data");
        let hub = Arc::new(MemoryHub::new());
        hub.create_repo(&repo).unwrap();
        hub.create_branch(&repo, "dev", "main").unwrap();
        let fs = HfFileSystem::new(
            hub.clone(),
            HfFileSystemOptions {
                revision: Some("dev".to_string()),
                ..Default::default()
            },
        );

        fs.pipe_file("datasets/user/data/dev.txt", Bytes::from_static(b"dev"))
            .await
            .unwrap();
        assert_eq!(
            hub.last_commit_summary(&repo, "dev").as_deref(),
            Some("Upload datasets/user/data/dev.txt")
        );
        assert_eq!(
            hub.last_commit_summary(&repo, "main").as_deref(),
            Some("Initial commit")
        );
    }
}
