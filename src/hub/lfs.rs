//! Upload preparation and the Git LFS transfer protocol
//!
//! Before a commit, every added file is described by its size, sha256 and a
//! 512-byte sample. The Hub's `preupload` route then decides per file whether
//! the content goes inline in the commit (`regular`) or through LFS. LFS
//! objects are negotiated with the batch API and sent with a single PUT
//! (`basic`) or in parts (`multipart`, signalled by a `chunk_size` header).

use std::collections::HashMap;
use std::io::SeekFrom;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use super::http::{check_response, HttpHub};
use super::UploadSource;
use crate::error::{HffsError, Result};
use crate::path::{self, RepoRef};

/// Bytes of content sent to `preupload` for type sniffing
pub const SAMPLE_SIZE: usize = 512;

/// Parts uploaded at the same time in a multipart transfer
const MULTIPART_CONCURRENCY: usize = 4;

/// Read buffer size when hashing local files
const HASH_BUFFER_SIZE: usize = 64 * 1024;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

/// How the Hub wants a file's content delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

/// Size, hash and sample of a file about to be uploaded
#[derive(Debug, Clone)]
pub struct UploadInfo {
    pub path_in_repo: String,
    pub size: u64,
    /// sha256 of the content, hex encoded
    pub sha256: String,
    pub sample: Bytes,
    pub source: UploadSource,
}

impl UploadInfo {
    pub fn from_bytes(path_in_repo: &str, data: &Bytes) -> Self {
        let sha256 = hex::encode(Sha256::digest(data));
        Self {
            path_in_repo: path_in_repo.to_string(),
            size: data.len() as u64,
            sha256,
            sample: data.slice(..data.len().min(SAMPLE_SIZE)),
            source: UploadSource::Bytes(data.clone()),
        }
    }

    pub async fn from_source(path_in_repo: &str, source: &UploadSource) -> Result<Self> {
        match source {
            UploadSource::Bytes(data) => Ok(Self::from_bytes(path_in_repo, data)),
            UploadSource::File(local) => {
                let mut file = tokio::fs::File::open(local).await?;
                let mut hasher = Sha256::new();
                let mut sample = Vec::with_capacity(SAMPLE_SIZE);
                let mut size = 0u64;
                let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

                loop {
                    let n = file.read(&mut buffer).await?;
                    if n == 0 {
                        break;
                    }
                    if sample.len() < SAMPLE_SIZE {
                        let take = (SAMPLE_SIZE - sample.len()).min(n);
                        sample.extend_from_slice(&buffer[..take]);
                    }
                    hasher.update(&buffer[..n]);
                    size += n as u64;
                }

                Ok(Self {
                    path_in_repo: path_in_repo.to_string(),
                    size,
                    sha256: hex::encode(hasher.finalize()),
                    sample: Bytes::from(sample),
                    source: source.clone(),
                })
            }
        }
    }

    /// Read `len` bytes of content starting at `offset`
    async fn read_chunk(&self, offset: u64, len: u64) -> Result<Bytes> {
        match &self.source {
            UploadSource::Bytes(data) => {
                let start = offset.min(data.len() as u64) as usize;
                let end = (offset + len).min(data.len() as u64) as usize;
                Ok(data.slice(start..end))
            }
            UploadSource::File(local) => {
                let mut file = tokio::fs::File::open(local).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut chunk = Vec::with_capacity(len as usize);
                file.take(len).read_to_end(&mut chunk).await?;
                Ok(Bytes::from(chunk))
            }
        }
    }

    /// Whole content as a request body, streamed for local files
    async fn body(&self) -> Result<reqwest::Body> {
        match &self.source {
            UploadSource::Bytes(data) => Ok(reqwest::Body::from(data.clone())),
            UploadSource::File(local) => {
                let file = tokio::fs::File::open(local).await?;
                Ok(reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(
                    file,
                )))
            }
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct PreuploadFile<'a> {
    path: &'a str,
    sample: String,
    size: u64,
}

#[derive(Debug, Serialize)]
struct PreuploadRequest<'a> {
    files: Vec<PreuploadFile<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadResult {
    path: String,
    upload_mode: UploadMode,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadResult>,
}

#[derive(Debug, Serialize)]
struct BatchObject<'a> {
    oid: &'a str,
    size: u64,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    operation: &'static str,
    transfers: [&'static str; 2],
    objects: Vec<BatchObject<'a>>,
    hash_algo: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LfsAction {
    pub href: String,
    #[serde(default)]
    pub header: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LfsActions {
    pub upload: Option<LfsAction>,
    pub verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponseObject {
    oid: String,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    objects: Vec<BatchResponseObject>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletedPart {
    part_number: usize,
    etag: String,
}

#[derive(Debug, Serialize)]
struct MultipartCompletion<'a> {
    oid: &'a str,
    parts: Vec<CompletedPart>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    oid: &'a str,
    size: u64,
}

/// Part URLs of a multipart upload, from the numbered keys of the action header
pub(crate) fn multipart_urls(header: &HashMap<String, String>) -> Result<Option<(u64, Vec<String>)>> {
    let Some(chunk_size) = header.get("chunk_size") else {
        return Ok(None);
    };
    let chunk_size: u64 = chunk_size.parse().map_err(|_| {
        HffsError::Serialization(format!("Invalid LFS chunk_size '{}'", chunk_size))
    })?;
    if chunk_size == 0 {
        return Err(HffsError::Serialization("LFS chunk_size is 0".to_string()));
    }

    let mut parts: Vec<(usize, String)> = header
        .iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|n| (n, v.clone())))
        .collect();
    parts.sort_by_key(|(n, _)| *n);

    Ok(Some((chunk_size, parts.into_iter().map(|(_, url)| url).collect())))
}

fn lfs_batch_url(endpoint: &str, repo: &RepoRef) -> String {
    format!(
        "{}/{}.git/info/lfs/objects/batch",
        endpoint.trim_end_matches('/'),
        repo.prefixed_id()
    )
}

impl HttpHub {
    /// Ask the Hub how each file should be uploaded
    pub(super) async fn preupload(
        &self,
        repo: &RepoRef,
        revision: &str,
        uploads: &[UploadInfo],
    ) -> Result<HashMap<String, UploadMode>> {
        if uploads.is_empty() {
            return Ok(HashMap::new());
        }

        use base64::Engine;
        let request = PreuploadRequest {
            files: uploads
                .iter()
                .map(|u| PreuploadFile {
                    path: &u.path_in_repo,
                    sample: base64::engine::general_purpose::STANDARD.encode(&u.sample),
                    size: u.size,
                })
                .collect(),
        };

        let url = format!(
            "{}/preupload/{}",
            path::api_url(&self.config.endpoint, repo),
            path::encode_revision(revision)
        );
        trace!("preupload: {} ({} files)", url, uploads.len());

        let response: PreuploadResponse = self.post_json(&url, &request).await?;
        Ok(response
            .files
            .into_iter()
            .map(|f| (f.path, f.upload_mode))
            .collect())
    }

    /// Push LFS objects that the Hub does not already have
    pub(super) async fn upload_lfs_objects(
        &self,
        repo: &RepoRef,
        uploads: &[&UploadInfo],
    ) -> Result<()> {
        let request = BatchRequest {
            operation: "upload",
            transfers: ["basic", "multipart"],
            objects: uploads
                .iter()
                .map(|u| BatchObject {
                    oid: &u.sha256,
                    size: u.size,
                })
                .collect(),
            hash_algo: "sha256",
        };

        let url = lfs_batch_url(&self.config.endpoint, repo);
        let token = self.token().await?;
        let response = self
            .authorized(self.client.post(&url), token.as_deref())
            .header(reqwest::header::ACCEPT, LFS_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_TYPE, LFS_CONTENT_TYPE)
            .json(&request)
            .send()
            .await?;
        let batch: BatchResponse = check_response(response).await?.json().await?;

        for object in batch.objects {
            if let Some(error) = object.error {
                return Err(HffsError::Http {
                    status: error.code,
                    message: format!("LFS upload of {} refused: {}", object.oid, error.message),
                });
            }

            let upload = uploads
                .iter()
                .find(|u| u.sha256 == object.oid)
                .ok_or_else(|| {
                    HffsError::Serialization(format!("Unexpected LFS object {}", object.oid))
                })?;

            let actions = object.actions.unwrap_or_default();
            let Some(upload_action) = actions.upload else {
                debug!("LFS object {} already present", object.oid);
                continue;
            };

            match multipart_urls(&upload_action.header)? {
                Some((chunk_size, part_urls)) => {
                    self.upload_multipart(upload, &upload_action, chunk_size, part_urls)
                        .await?
                }
                None => self.upload_basic(upload, &upload_action).await?,
            }

            if let Some(verify) = actions.verify {
                self.verify_lfs(upload, &verify).await?;
            }
        }

        Ok(())
    }

    async fn upload_basic(&self, upload: &UploadInfo, action: &LfsAction) -> Result<()> {
        debug!(
            "LFS basic upload of {} ({} bytes)",
            upload.path_in_repo, upload.size
        );
        let mut request = self.client.put(&action.href).body(upload.body().await?);
        for (key, value) in &action.header {
            request = request.header(key, value);
        }
        check_response(request.send().await?).await?;
        Ok(())
    }

    async fn upload_multipart(
        &self,
        upload: &UploadInfo,
        action: &LfsAction,
        chunk_size: u64,
        part_urls: Vec<String>,
    ) -> Result<()> {
        debug!(
            "LFS multipart upload of {} ({} bytes, {} parts)",
            upload.path_in_repo,
            upload.size,
            part_urls.len()
        );

        let mut parts: Vec<CompletedPart> = futures::stream::iter(part_urls.into_iter().enumerate())
            .map(|(idx, url)| async move {
                let chunk = upload.read_chunk(idx as u64 * chunk_size, chunk_size).await?;
                let response = check_response(self.client.put(&url).body(chunk).send().await?).await?;
                let etag = response
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        HffsError::Serialization(format!("Part {} returned no ETag", idx + 1))
                    })?;
                Ok::<_, HffsError>(CompletedPart {
                    part_number: idx + 1,
                    etag,
                })
            })
            .buffer_unordered(MULTIPART_CONCURRENCY)
            .try_collect()
            .await?;
        parts.sort_by_key(|p| p.part_number);

        let completion = MultipartCompletion {
            oid: &upload.sha256,
            parts,
        };
        let response = self
            .client
            .post(&action.href)
            .header(reqwest::header::ACCEPT, LFS_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_TYPE, LFS_CONTENT_TYPE)
            .json(&completion)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    async fn verify_lfs(&self, upload: &UploadInfo, action: &LfsAction) -> Result<()> {
        let mut request = self.client.post(&action.href).json(&VerifyRequest {
            oid: &upload.sha256,
            size: upload.size,
        });
        for (key, value) in &action.header {
            request = request.header(key, value);
        }
        check_response(request.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_info_from_bytes() {
        let info = UploadInfo::from_bytes("a.txt", &Bytes::from_static(b"hello"));
        assert_eq!(info.size, 5);
        assert_eq!(
            info.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(&info.sample[..], b"hello");
    }

    #[tokio::test]
    async fn test_upload_info_from_file_matches_bytes() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &data).unwrap();

        let from_file = UploadInfo::from_source("x.bin", &UploadSource::File(file.path().into()))
            .await
            .unwrap();
        let from_bytes = UploadInfo::from_bytes("x.bin", &Bytes::from(data));

        assert_eq!(from_file.size, from_bytes.size);
        assert_eq!(from_file.sha256, from_bytes.sha256);
        assert_eq!(from_file.sample.len(), SAMPLE_SIZE);
        assert_eq!(from_file.sample, from_bytes.sample);
    }

    #[tokio::test]
    async fn test_read_chunk_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"0123456789").unwrap();
        let info = UploadInfo::from_source("x", &UploadSource::File(file.path().into()))
            .await
            .unwrap();

        assert_eq!(&info.read_chunk(4, 4).await.unwrap()[..], b"4567");
        assert_eq!(&info.read_chunk(8, 4).await.unwrap()[..], b"89");
    }

    #[test]
    fn test_multipart_urls_sorted() {
        let header: HashMap<String, String> = [
            ("chunk_size", "5"),
            ("2", "https://s3/part2"),
            ("10", "https://s3/part10"),
            ("1", "https://s3/part1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let (chunk_size, urls) = multipart_urls(&header).unwrap().unwrap();
        assert_eq!(chunk_size, 5);
        assert_eq!(urls, vec!["https://s3/part1", "https://s3/part2", "https://s3/part10"]);
    }

    #[test]
    fn test_basic_transfer_has_no_parts() {
        let header: HashMap<String, String> =
            [("Authorization".to_string(), "Basic x".to_string())].into();
        assert!(multipart_urls(&header).unwrap().is_none());
    }

    #[test]
    fn test_batch_url() {
        assert_eq!(
            lfs_batch_url("https://huggingface.co", &RepoRef::dataset("user/data")),
            "https://huggingface.co/datasets/user/data.git/info/lfs/objects/batch"
        );
    }
}
