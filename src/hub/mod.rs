pub mod http;
pub mod lfs;
pub mod memory;

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use serde::Deserialize;

use crate::error::Result;
use crate::path::RepoRef;

pub use http::{HttpHub, HttpHubConfig};
pub use memory::MemoryHub;

/// Kind of entry in a repository tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

/// LFS pointer details of a file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LfsInfo {
    /// sha256 of the content, hex encoded
    pub oid: String,
    pub size: u64,
    #[serde(default)]
    pub pointer_size: Option<u64>,
}

/// Last commit touching an entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LastCommit {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub date: DateTime<Utc>,
}

/// Entry of a repository tree as returned by the Hub
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    /// Git blob id for files, tree id for directories
    #[serde(default)]
    pub oid: String,
    #[serde(default)]
    pub lfs: Option<LfsInfo>,
    #[serde(default)]
    pub last_commit: Option<LastCommit>,
}

impl RepoEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }
}

/// Subset of repository metadata used for existence checks
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub id: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub private: bool,
}

/// Content of a file to add in a commit
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Bytes),
    File(PathBuf),
}

/// One change in a commit
#[derive(Debug, Clone)]
pub enum CommitOperation {
    /// Create or overwrite a file
    Add {
        path_in_repo: String,
        source: UploadSource,
    },
    /// Delete a file
    Delete { path_in_repo: String },
    /// Delete a folder and everything below it
    DeleteFolder { path_in_repo: String },
    /// Point a path at an LFS object that already exists in the repository
    CopyLfs {
        path_in_repo: String,
        oid: String,
        size: u64,
    },
}

impl CommitOperation {
    pub fn path_in_repo(&self) -> &str {
        match self {
            CommitOperation::Add { path_in_repo, .. }
            | CommitOperation::Delete { path_in_repo }
            | CommitOperation::DeleteFolder { path_in_repo }
            | CommitOperation::CopyLfs { path_in_repo, .. } => path_in_repo,
        }
    }
}

/// A commit to create on a revision
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub summary: String,
    pub description: Option<String>,
    pub operations: Vec<CommitOperation>,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitInfo {
    #[serde(rename = "commitOid")]
    pub oid: String,
    #[serde(rename = "commitUrl", default)]
    pub url: String,
}

/// Stream type for tree listings
pub type RepoEntryStream<'a> = Pin<Box<dyn Stream<Item = Result<RepoEntry>> + Send + 'a>>;

/// Remote repository service seam
///
/// Implementations speak the Hub protocol (or simulate it); everything above
/// this trait is filesystem logic.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Fetch repository metadata; fails with `RepositoryNotFound` if the
    /// repository does not exist or is not visible
    async fn repo_info(&self, repo: &RepoRef, revision: Option<&str>) -> Result<RepoInfo>;

    /// List entries under `path_in_repo` at `revision`
    fn list_tree<'a>(
        &'a self,
        repo: &'a RepoRef,
        revision: &'a str,
        path_in_repo: &'a str,
        recursive: bool,
    ) -> RepoEntryStream<'a>;

    /// Fetch entries for exact paths, with last commit details when `expand`
    async fn paths_info(
        &self,
        repo: &RepoRef,
        revision: &str,
        paths: &[String],
        expand: bool,
    ) -> Result<Vec<RepoEntry>>;

    /// Read bytes `[start, end)` of a file
    async fn fetch_range(
        &self,
        repo: &RepoRef,
        revision: &str,
        path_in_repo: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes>;

    /// Apply a set of operations as a single commit
    async fn create_commit(
        &self,
        repo: &RepoRef,
        revision: &str,
        commit: CommitRequest,
    ) -> Result<CommitInfo>;

    /// Collect a full tree listing
    async fn list_tree_all(
        &self,
        repo: &RepoRef,
        revision: &str,
        path_in_repo: &str,
        recursive: bool,
    ) -> Result<Vec<RepoEntry>> {
        self.list_tree(repo, revision, path_in_repo, recursive)
            .try_collect()
            .await
    }
}
