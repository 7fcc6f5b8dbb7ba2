//! In-process hub
//!
//! Keeps repositories, branches and LFS objects in memory and applies commits
//! the way the Hub does: atomically, with LFS classification driven by
//! `.gitattributes`. Used by the test suites and for offline experiments.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use globset::{Glob, GlobMatcher};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::http::read_source;
use super::{
    CommitInfo, CommitOperation, CommitRequest, EntryType, HubClient, LastCommit, LfsInfo,
    RepoEntry, RepoEntryStream, RepoInfo,
};
use crate::error::{HffsError, Result};
use crate::path::{RepoRef, DEFAULT_REVISION};

/// Files above this size always go to LFS
pub const LFS_SIZE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Size of a git LFS pointer file
const LFS_POINTER_SIZE: u64 = 134;

/// `.gitattributes` written when a repository is created
pub const DEFAULT_GITATTRIBUTES: &str = "\
*.7z filter=lfs diff=lfs merge=lfs -text
*.arrow filter=lfs diff=lfs merge=lfs -text
*.bin filter=lfs diff=lfs merge=lfs -text
*.ckpt filter=lfs diff=lfs merge=lfs -text
*.gz filter=lfs diff=lfs merge=lfs -text
*.h5 filter=lfs diff=lfs merge=lfs -text
*.msgpack filter=lfs diff=lfs merge=lfs -text
*.npy filter=lfs diff=lfs merge=lfs -text
*.npz filter=lfs diff=lfs merge=lfs -text
*.onnx filter=lfs diff=lfs merge=lfs -text
*.parquet filter=lfs diff=lfs merge=lfs -text
*.pickle filter=lfs diff=lfs merge=lfs -text
*.pkl filter=lfs diff=lfs merge=lfs -text
*.pt filter=lfs diff=lfs merge=lfs -text
*.pth filter=lfs diff=lfs merge=lfs -text
*.safetensors filter=lfs diff=lfs merge=lfs -text
*.tar filter=lfs diff=lfs merge=lfs -text
*.zip filter=lfs diff=lfs merge=lfs -text
";

const GITATTRIBUTES: &str = ".gitattributes";

#[derive(Debug, Clone)]
struct StoredFile {
    data: Bytes,
    blob_id: String,
    lfs: Option<LfsInfo>,
    last_commit: LastCommit,
}

#[derive(Debug, Clone)]
struct CommitRecord {
    summary: String,
    description: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Branch {
    files: BTreeMap<String, StoredFile>,
    history: Vec<CommitRecord>,
}

#[derive(Debug, Default)]
struct MemoryRepo {
    branches: HashMap<String, Branch>,
    /// LFS objects by sha256
    lfs_objects: HashMap<String, Bytes>,
    commits: usize,
}

/// Hub held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryHub {
    repos: DashMap<RepoRef, MemoryRepo>,
    bytes_uploaded: AtomicU64,
    sequence: AtomicU64,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository whose `main` branch holds the default `.gitattributes`
    pub fn create_repo(&self, repo: &RepoRef) -> Result<CommitInfo> {
        if self.repos.contains_key(repo) {
            return Err(HffsError::InvalidArgument(format!(
                "Repository {} already exists",
                repo
            )));
        }

        let mut state = MemoryRepo::default();
        state
            .branches
            .insert(DEFAULT_REVISION.to_string(), Branch::default());

        let commit = self.apply(
            repo,
            &mut state,
            DEFAULT_REVISION,
            "Initial commit",
            None,
            vec![PreparedOp::Add {
                path_in_repo: GITATTRIBUTES.to_string(),
                data: Bytes::from_static(DEFAULT_GITATTRIBUTES.as_bytes()),
            }],
        )?;
        self.repos.insert(repo.clone(), state);
        Ok(commit)
    }

    /// Create `branch` pointing at the current state of `from`
    pub fn create_branch(&self, repo: &RepoRef, branch: &str, from: &str) -> Result<()> {
        let mut state = self.repo_mut(repo)?;
        let source = state
            .branches
            .get(from)
            .cloned()
            .ok_or_else(|| revision_not_found(repo, from))?;
        state.branches.insert(branch.to_string(), source);
        Ok(())
    }

    /// Number of commits created in the repository, across branches
    pub fn commit_count(&self, repo: &RepoRef) -> usize {
        self.repos.get(repo).map(|r| r.commits).unwrap_or(0)
    }

    /// Summary of the latest commit on a branch
    pub fn last_commit_summary(&self, repo: &RepoRef, revision: &str) -> Option<String> {
        let state = self.repos.get(repo)?;
        let branch = state.branches.get(revision)?;
        branch.history.last().map(|c| c.summary.clone())
    }

    /// Description of the latest commit on a branch
    pub fn last_commit_description(&self, repo: &RepoRef, revision: &str) -> Option<String> {
        let state = self.repos.get(repo)?;
        let branch = state.branches.get(revision)?;
        branch.history.last().and_then(|c| c.description.clone())
    }

    /// Total bytes received through `Add` operations
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::Relaxed)
    }

    fn repo_mut(&self, repo: &RepoRef) -> Result<dashmap::mapref::one::RefMut<'_, RepoRef, MemoryRepo>> {
        self.repos
            .get_mut(repo)
            .ok_or_else(|| repository_not_found(repo))
    }

    fn with_branch<T>(
        &self,
        repo: &RepoRef,
        revision: &str,
        f: impl FnOnce(&Branch) -> Result<T>,
    ) -> Result<T> {
        let state = self
            .repos
            .get(repo)
            .ok_or_else(|| repository_not_found(repo))?;
        let branch = state
            .branches
            .get(revision)
            .ok_or_else(|| revision_not_found(repo, revision))?;
        f(branch)
    }

    fn next_commit_id(&self, repo: &RepoRef, summary: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let digest = Sha256::digest(format!("{}\n{}\n{}", repo, n, summary));
        hex::encode(&digest[..20])
    }

    /// Apply prepared operations to a branch, all or nothing
    fn apply(
        &self,
        repo: &RepoRef,
        state: &mut MemoryRepo,
        revision: &str,
        summary: &str,
        description: Option<String>,
        operations: Vec<PreparedOp>,
    ) -> Result<CommitInfo> {
        let branch = state
            .branches
            .get(revision)
            .ok_or_else(|| revision_not_found(repo, revision))?;

        let lfs_patterns = branch
            .files
            .get(GITATTRIBUTES)
            .map(|f| lfs_patterns(&String::from_utf8_lossy(&f.data)))
            .unwrap_or_default();

        let oid = self.next_commit_id(repo, summary);
        let last_commit = LastCommit {
            id: oid.clone(),
            title: summary.to_string(),
            date: Utc::now(),
        };

        let mut files = branch.files.clone();
        let mut new_objects: Vec<(String, Bytes)> = Vec::new();
        let mut uploaded = 0u64;

        for operation in operations {
            match operation {
                PreparedOp::Add { path_in_repo, data } => {
                    uploaded += data.len() as u64;
                    let lfs = is_lfs(&path_in_repo, &data, &lfs_patterns).then(|| {
                        let sha256 = hex::encode(Sha256::digest(&data));
                        new_objects.push((sha256.clone(), data.clone()));
                        LfsInfo {
                            oid: sha256,
                            size: data.len() as u64,
                            pointer_size: Some(LFS_POINTER_SIZE),
                        }
                    });
                    files.insert(
                        path_in_repo,
                        StoredFile {
                            blob_id: blob_id(&data),
                            data,
                            lfs,
                            last_commit: last_commit.clone(),
                        },
                    );
                }
                PreparedOp::CopyLfs {
                    path_in_repo,
                    oid,
                    size,
                } => {
                    let data = state
                        .lfs_objects
                        .get(&oid)
                        .cloned()
                        .or_else(|| {
                            new_objects
                                .iter()
                                .find(|(o, _)| *o == oid)
                                .map(|(_, d)| d.clone())
                        })
                        .ok_or_else(|| {
                            HffsError::NotFound(format!("LFS object {} not in {}", oid, repo))
                        })?;
                    files.insert(
                        path_in_repo,
                        StoredFile {
                            blob_id: blob_id(&data),
                            data,
                            lfs: Some(LfsInfo {
                                oid,
                                size,
                                pointer_size: Some(LFS_POINTER_SIZE),
                            }),
                            last_commit: last_commit.clone(),
                        },
                    );
                }
                PreparedOp::Delete { path_in_repo } => {
                    if files.remove(&path_in_repo).is_none() {
                        return Err(entry_not_found(repo, revision, &path_in_repo));
                    }
                }
                PreparedOp::DeleteFolder { path_in_repo } => {
                    let prefix = format!("{}/", path_in_repo.trim_end_matches('/'));
                    let before = files.len();
                    files.retain(|p, _| !p.starts_with(&prefix));
                    if files.len() == before {
                        return Err(entry_not_found(repo, revision, &path_in_repo));
                    }
                }
            }
        }

        state.lfs_objects.extend(new_objects);
        state.commits += 1;
        let branch = state
            .branches
            .get_mut(revision)
            .ok_or_else(|| revision_not_found(repo, revision))?;
        branch.files = files;
        branch.history.push(CommitRecord {
            summary: summary.to_string(),
            description,
        });
        self.bytes_uploaded.fetch_add(uploaded, Ordering::Relaxed);

        debug!("memory commit {} on {}@{}: {}", oid, repo, revision, summary);
        Ok(CommitInfo {
            url: format!("memory://{}/commit/{}", repo.prefixed_id(), oid),
            oid,
        })
    }
}

/// Commit operation with its content loaded
enum PreparedOp {
    Add { path_in_repo: String, data: Bytes },
    Delete { path_in_repo: String },
    DeleteFolder { path_in_repo: String },
    CopyLfs { path_in_repo: String, oid: String, size: u64 },
}

fn repository_not_found(repo: &RepoRef) -> HffsError {
    HffsError::RepositoryNotFound(format!("Repository Not Found for {}", repo))
}

fn revision_not_found(repo: &RepoRef, revision: &str) -> HffsError {
    HffsError::RevisionNotFound(format!("Invalid rev id: {} for {}", revision, repo))
}

fn entry_not_found(repo: &RepoRef, revision: &str, path_in_repo: &str) -> HffsError {
    HffsError::NotFound(format!(
        "Entry not found: {}@{}/{}",
        repo, revision, path_in_repo
    ))
}

/// Git-style blob id of some content
fn blob_id(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", data.len()));
    hasher.update(data);
    hex::encode(&hasher.finalize()[..20])
}

/// Tree id of a directory, derived from the blob ids below it
fn tree_id<'a>(path: &str, blob_ids: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("tree {}\0", path));
    for id in blob_ids {
        hasher.update(id);
    }
    hex::encode(&hasher.finalize()[..20])
}

/// Patterns marked `filter=lfs` in a `.gitattributes` file
fn lfs_patterns(gitattributes: &str) -> Vec<GlobMatcher> {
    gitattributes
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let pattern = parts.next()?;
            parts
                .any(|attr| attr == "filter=lfs")
                .then(|| pattern.to_string())
        })
        .filter_map(|pattern| {
            // patterns without a slash apply at any depth
            let pattern = if pattern.contains('/') {
                pattern.trim_start_matches('/').to_string()
            } else {
                format!("**/{}", pattern)
            };
            Glob::new(&pattern).ok().map(|g| g.compile_matcher())
        })
        .collect()
}

fn is_lfs(path_in_repo: &str, data: &[u8], patterns: &[GlobMatcher]) -> bool {
    let sample = &data[..data.len().min(super::lfs::SAMPLE_SIZE)];
    data.len() as u64 > LFS_SIZE_THRESHOLD
        || sample.contains(&0)
        || patterns.iter().any(|m| m.is_match(path_in_repo))
}

fn file_entry(path_in_repo: &str, file: &StoredFile, expand: bool) -> RepoEntry {
    RepoEntry {
        entry_type: EntryType::File,
        path: path_in_repo.to_string(),
        size: file.data.len() as u64,
        oid: file.blob_id.clone(),
        lfs: file.lfs.clone(),
        last_commit: expand.then(|| file.last_commit.clone()),
    }
}

fn dir_entry(branch: &Branch, dir: &str, expand: bool) -> RepoEntry {
    let prefix = format!("{}/", dir);
    let below = branch
        .files
        .range(prefix.clone()..)
        .take_while(|(p, _)| p.starts_with(&prefix));
    let last_commit = if expand {
        below
            .clone()
            .map(|(_, f)| &f.last_commit)
            .max_by_key(|c| c.date)
            .cloned()
    } else {
        None
    };
    RepoEntry {
        entry_type: EntryType::Directory,
        path: dir.to_string(),
        size: 0,
        oid: tree_id(dir, below.map(|(_, f)| f.blob_id.as_str())),
        lfs: None,
        last_commit,
    }
}

/// Entries below `dir` ("" for the root), directories synthesized from file paths
fn tree_entries(branch: &Branch, dir: &str, recursive: bool) -> Vec<RepoEntry> {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };

    let mut dirs = BTreeSet::new();
    let mut files = Vec::new();
    for (file_path, file) in branch
        .files
        .range(prefix.clone()..)
        .take_while(|(p, _)| p.starts_with(&prefix))
    {
        let rest = &file_path[prefix.len()..];
        let components: Vec<&str> = rest.split('/').collect();
        let (parents, _) = components.split_at(components.len() - 1);

        if recursive {
            for depth in 1..=parents.len() {
                dirs.insert(format!("{}{}", prefix, parents[..depth].join("/")));
            }
            files.push(file_entry(file_path, file, false));
        } else if let Some(first) = parents.first() {
            dirs.insert(format!("{}{}", prefix, first));
        } else {
            files.push(file_entry(file_path, file, false));
        }
    }

    let mut entries: Vec<RepoEntry> = dirs.iter().map(|d| dir_entry(branch, d, false)).collect();
    entries.extend(files);
    entries
}

fn is_dir(branch: &Branch, dir: &str) -> bool {
    let prefix = format!("{}/", dir);
    branch
        .files
        .range(prefix.clone()..)
        .next()
        .is_some_and(|(p, _)| p.starts_with(&prefix))
}

#[async_trait]
impl HubClient for MemoryHub {
    async fn repo_info(&self, repo: &RepoRef, revision: Option<&str>) -> Result<RepoInfo> {
        let revision = revision.unwrap_or(DEFAULT_REVISION);
        let sha = self.with_branch(repo, revision, |branch| {
            Ok(branch
                .files
                .values()
                .map(|f| &f.last_commit)
                .max_by_key(|c| c.date)
                .map(|c| c.id.clone()))
        })?;
        Ok(RepoInfo {
            id: repo.repo_id.clone(),
            sha,
            private: false,
        })
    }

    fn list_tree<'a>(
        &'a self,
        repo: &'a RepoRef,
        revision: &'a str,
        path_in_repo: &'a str,
        recursive: bool,
    ) -> RepoEntryStream<'a> {
        let dir = path_in_repo.trim_matches('/');
        let entries = self.with_branch(repo, revision, |branch| {
            if !dir.is_empty() && !is_dir(branch, dir) {
                return Err(entry_not_found(repo, revision, dir));
            }
            Ok(tree_entries(branch, dir, recursive))
        });

        let items: Vec<Result<RepoEntry>> = match entries {
            Ok(entries) => entries.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        Box::pin(futures::stream::iter(items))
    }

    async fn paths_info(
        &self,
        repo: &RepoRef,
        revision: &str,
        paths: &[String],
        expand: bool,
    ) -> Result<Vec<RepoEntry>> {
        self.with_branch(repo, revision, |branch| {
            Ok(paths
                .iter()
                .map(|p| p.trim_matches('/'))
                .filter_map(|p| match branch.files.get(p) {
                    Some(file) => Some(file_entry(p, file, expand)),
                    None if is_dir(branch, p) => Some(dir_entry(branch, p, expand)),
                    None => None,
                })
                .collect())
        })
    }

    async fn fetch_range(
        &self,
        repo: &RepoRef,
        revision: &str,
        path_in_repo: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes> {
        self.with_branch(repo, revision, |branch| {
            let file = branch
                .files
                .get(path_in_repo)
                .ok_or_else(|| entry_not_found(repo, revision, path_in_repo))?;
            let len = file.data.len() as u64;
            let start = start.min(len) as usize;
            let end = end.min(len) as usize;
            Ok(if start < end {
                file.data.slice(start..end)
            } else {
                Bytes::new()
            })
        })
    }

    async fn create_commit(
        &self,
        repo: &RepoRef,
        revision: &str,
        commit: CommitRequest,
    ) -> Result<CommitInfo> {
        let mut prepared = Vec::with_capacity(commit.operations.len());
        for operation in commit.operations {
            prepared.push(match operation {
                CommitOperation::Add {
                    path_in_repo,
                    source,
                } => PreparedOp::Add {
                    data: read_source(&source).await?,
                    path_in_repo,
                },
                CommitOperation::Delete { path_in_repo } => PreparedOp::Delete { path_in_repo },
                CommitOperation::DeleteFolder { path_in_repo } => {
                    PreparedOp::DeleteFolder { path_in_repo }
                }
                CommitOperation::CopyLfs {
                    path_in_repo,
                    oid,
                    size,
                } => PreparedOp::CopyLfs {
                    path_in_repo,
                    oid,
                    size,
                },
            });
        }

        let mut state = self.repo_mut(repo)?;
        self.apply(
            repo,
            &mut state,
            revision,
            &commit.summary,
            commit.description,
            prepared,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::UploadSource;

    fn add(path: &str, data: &'static [u8]) -> CommitOperation {
        CommitOperation::Add {
            path_in_repo: path.to_string(),
            source: UploadSource::Bytes(Bytes::from_static(data)),
        }
    }

    fn commit(summary: &str, operations: Vec<CommitOperation>) -> CommitRequest {
        CommitRequest {
            summary: summary.to_string(),
            description: None,
            operations,
        }
    }

    async fn seeded() -> (MemoryHub, RepoRef) {
        let hub = MemoryHub::new();
        let repo = RepoRef::dataset("user/data");
        hub.create_repo(&repo).unwrap();
        hub.create_commit(
            &repo,
            "main",
            commit(
                "seed",
                vec![
                    add("data/text_data.txt", b"dummy text data"),
                    add("data/binary_data.bin", b"dummy binary data"),
                    add("data/nested/deep.txt", b"deep"),
                ],
            ),
        )
        .await
        .unwrap();
        (hub, repo)
    }

    #[tokio::test]
    async fn test_repo_starts_with_gitattributes() {
        let hub = MemoryHub::new();
        let repo = RepoRef::model("user/model");
        hub.create_repo(&repo).unwrap();

        let entries = hub.list_tree_all(&repo, "main", "", false).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, ".gitattributes");
        assert_eq!(hub.commit_count(&repo), 1);
    }

    #[tokio::test]
    async fn test_unknown_repo_and_revision() {
        let (hub, repo) = seeded().await;
        assert!(matches!(
            hub.repo_info(&RepoRef::model("nobody/nothing"), None).await,
            Err(HffsError::RepositoryNotFound(_))
        ));
        assert!(matches!(
            hub.repo_info(&repo, Some("dev")).await,
            Err(HffsError::RevisionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_tree_non_recursive_and_recursive() {
        let (hub, repo) = seeded().await;

        let shallow = hub.list_tree_all(&repo, "main", "data", false).await.unwrap();
        let names: Vec<_> = shallow.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            names,
            vec!["data/nested", "data/binary_data.bin", "data/text_data.txt"]
        );

        let deep = hub.list_tree_all(&repo, "main", "", true).await.unwrap();
        let dirs: Vec<_> = deep
            .iter()
            .filter(|e| !e.is_file())
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(dirs, vec!["data", "data/nested"]);
        assert_eq!(deep.iter().filter(|e| e.is_file()).count(), 4);
    }

    #[tokio::test]
    async fn test_list_tree_missing_dir() {
        let (hub, repo) = seeded().await;
        let result = hub.list_tree_all(&repo, "main", "nope", true).await;
        assert!(matches!(result, Err(HffsError::NotFound(_))));

        let result = hub
            .list_tree_all(&repo, "main", "data/text_data.txt", false)
            .await;
        assert!(matches!(result, Err(HffsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lfs_classification() {
        let (hub, repo) = seeded().await;
        hub.create_commit(&repo, "main", commit("nul", vec![add("raw.dat", b"a\0b")]))
            .await
            .unwrap();

        let infos = hub
            .paths_info(
                &repo,
                "main",
                &[
                    "data/text_data.txt".into(),
                    "data/binary_data.bin".into(),
                    "raw.dat".into(),
                ],
                false,
            )
            .await
            .unwrap();
        assert!(infos[0].lfs.is_none());
        let lfs = infos[1].lfs.as_ref().unwrap();
        assert_eq!(lfs.size, 17);
        assert_eq!(lfs.oid, hex::encode(Sha256::digest(b"dummy binary data")));
        assert!(infos[2].lfs.is_some());
    }

    #[tokio::test]
    async fn test_fetch_range_clamps() {
        let (hub, repo) = seeded().await;
        let bytes = hub
            .fetch_range(&repo, "main", "data/text_data.txt", 6, 100)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"text data");
        let empty = hub
            .fetch_range(&repo, "main", "data/text_data.txt", 100, 200)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_changes_nothing() {
        let (hub, repo) = seeded().await;
        let before = hub.commit_count(&repo);

        let result = hub
            .create_commit(
                &repo,
                "main",
                commit(
                    "bad",
                    vec![
                        CommitOperation::Delete {
                            path_in_repo: "data/text_data.txt".into(),
                        },
                        CommitOperation::Delete {
                            path_in_repo: "missing.txt".into(),
                        },
                    ],
                ),
            )
            .await;
        assert!(matches!(result, Err(HffsError::NotFound(_))));
        assert_eq!(hub.commit_count(&repo), before);

        let still_there = hub
            .fetch_range(&repo, "main", "data/text_data.txt", 0, 5)
            .await
            .unwrap();
        assert_eq!(&still_there[..], b"dummy");
    }

    #[tokio::test]
    async fn test_copy_lfs_needs_known_object() {
        let (hub, repo) = seeded().await;
        let oid = hex::encode(Sha256::digest(b"dummy binary data"));
        let uploaded = hub.bytes_uploaded();

        hub.create_commit(
            &repo,
            "main",
            commit(
                "copy",
                vec![CommitOperation::CopyLfs {
                    path_in_repo: "copy.bin".into(),
                    oid: oid.clone(),
                    size: 17,
                }],
            ),
        )
        .await
        .unwrap();
        assert_eq!(hub.bytes_uploaded(), uploaded);
        assert_eq!(hub.last_commit_summary(&repo, "main").as_deref(), Some("copy"));

        let result = hub
            .create_commit(
                &repo,
                "main",
                commit(
                    "copy unknown",
                    vec![CommitOperation::CopyLfs {
                        path_in_repo: "other.bin".into(),
                        oid: "00".repeat(32),
                        size: 1,
                    }],
                ),
            )
            .await;
        assert!(matches!(result, Err(HffsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_folder_and_branches() {
        let (hub, repo) = seeded().await;
        hub.create_branch(&repo, "dev", "main").unwrap();

        hub.create_commit(
            &repo,
            "dev",
            commit(
                "drop data",
                vec![CommitOperation::DeleteFolder {
                    path_in_repo: "data".into(),
                }],
            ),
        )
        .await
        .unwrap();

        let dev = hub.list_tree_all(&repo, "dev", "", true).await.unwrap();
        assert_eq!(dev.len(), 1);
        let main = hub.list_tree_all(&repo, "main", "", true).await.unwrap();
        assert!(main.len() > 1);
    }

    #[tokio::test]
    async fn test_paths_info_expand_has_last_commit() {
        let (hub, repo) = seeded().await;
        let infos = hub
            .paths_info(&repo, "main", &["data/text_data.txt".into(), "data".into()], true)
            .await
            .unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].last_commit.as_ref().unwrap().title, "seed");
        assert_eq!(infos[1].entry_type, EntryType::Directory);
        assert!(infos[1].last_commit.is_some());
    }

    #[test]
    fn test_gitattributes_patterns() {
        let patterns = lfs_patterns("# comment\n*.bin filter=lfs diff=lfs\n*.txt text\nweights/* filter=lfs\n");
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().any(|m| m.is_match("deep/model.bin")));
        assert!(patterns.iter().any(|m| m.is_match("weights/a")));
        assert!(!patterns.iter().any(|m| m.is_match("notes.txt")));
    }
}
