//! Common test fixtures
//!
//! Every test gets its own in-memory Hub holding `datasets/user/repo`:
//!
//! ```text
//! .gitattributes
//! data/text_data.txt     "dummy text data"
//! data/binary_data.bin   LFS
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use hffs::hf::{HfFileSystem, HfFileSystemOptions};
use hffs::hub::{CommitOperation, CommitRequest, HubClient, MemoryHub, UploadSource};
use hffs::path::RepoRef;

pub const REPO_ID: &str = "user/repo";
pub const TEXT_DATA: &[u8] = b"dummy text data";
pub const BINARY_DATA: &[u8] = b"dummy binary data\x00\x01\x02";

/// An in-memory Hub with the seeded repository and a filesystem over it
pub struct TestRepo {
    pub hub: Arc<MemoryHub>,
    pub fs: HfFileSystem,
    pub repo: RepoRef,
}

impl TestRepo {
    /// Path of `rel` inside the repository, without protocol
    pub fn path(&self, rel: &str) -> String {
        if rel.is_empty() {
            format!("datasets/{}", REPO_ID)
        } else {
            format!("datasets/{}/{}", REPO_ID, rel)
        }
    }

    pub fn commits(&self) -> usize {
        self.hub.commit_count(&self.repo)
    }
}

pub async fn setup() -> anyhow::Result<TestRepo> {
    setup_with(HfFileSystemOptions::default()).await
}

pub async fn setup_with(options: HfFileSystemOptions) -> anyhow::Result<TestRepo> {
    let hub = Arc::new(MemoryHub::new());
    let repo = RepoRef::dataset(REPO_ID);
    hub.create_repo(&repo)?;

    hub.create_commit(
        &repo,
        "main",
        CommitRequest {
            summary: "Add dummy data".to_string(),
            description: None,
            operations: vec![
                add("data/text_data.txt", TEXT_DATA),
                add("data/binary_data.bin", BINARY_DATA),
            ],
        },
    )
    .await?;

    let fs = HfFileSystem::new(hub.clone(), options);
    Ok(TestRepo { hub, fs, repo })
}

pub fn add(path_in_repo: &str, content: &'static [u8]) -> CommitOperation {
    CommitOperation::Add {
        path_in_repo: path_in_repo.to_string(),
        source: UploadSource::Bytes(Bytes::from_static(content)),
    }
}
