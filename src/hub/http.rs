//! HTTP client for the Hugging Face Hub API
//!
//! Speaks the public Hub routes: repository info, paginated tree listing,
//! `paths-info`, ranged downloads through `/resolve/`, and the NDJSON commit
//! endpoint (with the LFS upload steps in [`super::lfs`]).

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, AUTHORIZATION, LINK, RANGE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::lfs::{UploadInfo, UploadMode};
use super::{
    CommitInfo, CommitOperation, CommitRequest, HubClient, RepoEntry, RepoEntryStream, RepoInfo,
    UploadSource,
};
use crate::auth::TokenProvider;
use crate::error::{HffsError, Result};
use crate::path::{self, RepoRef};

/// Public Hub endpoint
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Header carrying the Hub's machine-readable error code
const ERROR_CODE_HEADER: &str = "x-error-code";
/// Header carrying the Hub's human-readable error message
const ERROR_MESSAGE_HEADER: &str = "x-error-message";

/// Matches `<url>; rel="next"` in a Link header
static RE_NEXT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("valid link pattern"));

/// HTTP hub client configuration
#[derive(Debug, Clone)]
pub struct HttpHubConfig {
    /// Hub endpoint, without trailing slash
    pub endpoint: String,
    /// Timeout applied to every request
    pub timeout: Duration,
    /// Retry attempts for transient failures
    pub max_retries: usize,
    /// Value of the `user-agent` header
    pub user_agent: String,
}

impl Default for HttpHubConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 5,
            user_agent: format!("hffs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Hub client over HTTP
pub struct HttpHub {
    pub(super) client: Client,
    pub(super) config: HttpHubConfig,
    token: Arc<dyn TokenProvider>,
}

impl HttpHub {
    /// Create a new HTTP hub client
    pub fn new(config: HttpHubConfig, token: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HffsError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            token,
        })
    }

    /// Current bearer token, if any
    pub(super) async fn token(&self) -> Result<Option<String>> {
        self.token
            .get_token()
            .await
            .map_err(|e| HffsError::Auth(format!("Failed to get token: {}", e)))
    }

    /// Attach user agent and authorization to a request
    pub(super) fn authorized(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let request = request.header(USER_AGENT, &self.config.user_agent);
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    pub(super) fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(8))
            .with_max_times(self.config.max_retries)
    }

    /// GET a URL, retrying transient failures
    async fn get_with_retry(&self, url: &str, headers: HeaderMap) -> Result<Response> {
        let token = self.token().await?;

        let send = || {
            let request = self
                .authorized(self.client.get(url), token.as_deref())
                .headers(headers.clone());
            async move { check_response(request.send().await?).await }
        };

        send.retry(self.backoff())
            .when(HffsError::is_retryable)
            .notify(|err: &HffsError, dur: Duration| {
                warn!("GET {} failed ({}), retrying in {:?}", url, err, dur);
            })
            .await
    }

    /// Send a JSON body and decode a JSON response
    pub(super) async fn post_json<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let token = self.token().await?;
        let response = self
            .authorized(self.client.post(url), token.as_deref())
            .json(body)
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Gather the upload details of every file added in a commit
    async fn prepare_uploads(&self, operations: &[CommitOperation]) -> Result<Vec<UploadInfo>> {
        let mut uploads = Vec::new();
        for operation in operations {
            if let CommitOperation::Add {
                path_in_repo,
                source,
            } = operation
            {
                uploads.push(UploadInfo::from_source(path_in_repo, source).await?);
            }
        }
        Ok(uploads)
    }
}

/// Map a non-success response to an error, using the Hub's error headers
pub(super) async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_code = header_str(response.headers(), ERROR_CODE_HEADER);
    let error_message = header_str(response.headers(), ERROR_MESSAGE_HEADER);
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = error_message.unwrap_or_else(|| {
        if body.is_empty() {
            format!("{} for {}", status, url)
        } else {
            format!("{} for {}: {}", status, url, body)
        }
    });

    Err(map_status(status, error_code.as_deref(), message))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Translate a Hub error response into an error variant
fn map_status(status: StatusCode, error_code: Option<&str>, message: String) -> HffsError {
    match error_code {
        Some("RepoNotFound") => return HffsError::RepositoryNotFound(message),
        Some("RevisionNotFound") => return HffsError::RevisionNotFound(message),
        Some("EntryNotFound") => return HffsError::NotFound(message),
        Some("GatedRepo") => return HffsError::PermissionDenied(message),
        _ => {}
    }

    match status {
        // missing and private repositories both answer 401
        StatusCode::UNAUTHORIZED => HffsError::RepositoryNotFound(message),
        StatusCode::FORBIDDEN => HffsError::PermissionDenied(message),
        StatusCode::NOT_FOUND => HffsError::NotFound(message),
        _ => HffsError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

/// URL of the next page from a `Link` header
pub(crate) fn next_page_url(link: &str) -> Option<String> {
    RE_NEXT_LINK
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `bytes=start-(end-1)` for the half-open range `[start, end)`
pub(crate) fn range_header(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end.saturating_sub(1))
}

/// One line of the NDJSON commit payload
#[derive(Debug, Serialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub(crate) enum CommitLine {
    Header {
        summary: String,
        description: String,
    },
    File {
        content: String,
        path: String,
        encoding: String,
    },
    LfsFile {
        path: String,
        algo: String,
        oid: String,
    },
    DeletedFile {
        path: String,
    },
    DeletedFolder {
        path: String,
    },
}

/// Serialize commit lines as newline-delimited JSON
pub(crate) fn commit_payload(lines: &[CommitLine]) -> Result<String> {
    let mut payload = String::new();
    for line in lines {
        payload.push_str(&serde_json::to_string(line)?);
        payload.push('\n');
    }
    Ok(payload)
}

#[async_trait]
impl HubClient for HttpHub {
    async fn repo_info(&self, repo: &RepoRef, revision: Option<&str>) -> Result<RepoInfo> {
        let base = path::api_url(&self.config.endpoint, repo);
        let url = match revision {
            Some(rev) => format!("{}/revision/{}", base, path::encode_revision(rev)),
            None => base,
        };
        trace!("repo_info: {}", url);

        let response = self.get_with_retry(&url, HeaderMap::new()).await?;
        Ok(response.json().await?)
    }

    fn list_tree<'a>(
        &'a self,
        repo: &'a RepoRef,
        revision: &'a str,
        path_in_repo: &'a str,
        recursive: bool,
    ) -> RepoEntryStream<'a> {
        let first_url = format!(
            "{}/tree/{}/{}",
            path::api_url(&self.config.endpoint, repo),
            path::encode_revision(revision),
            path::encode_path_in_repo(path_in_repo)
        );
        let first_url = format!(
            "{}?recursive={}",
            first_url.trim_end_matches('/'),
            recursive
        );

        Box::pin(try_stream! {
            let mut next_url = Some(first_url);

            while let Some(url) = next_url.take() {
                trace!("list_tree: {}", url);
                let response = self.get_with_retry(&url, HeaderMap::new()).await?;

                next_url = response
                    .headers()
                    .get(LINK)
                    .and_then(|v| v.to_str().ok())
                    .and_then(next_page_url);

                let entries: Vec<RepoEntry> = response.json().await?;
                for entry in entries {
                    yield entry;
                }
            }
        })
    }

    async fn paths_info(
        &self,
        repo: &RepoRef,
        revision: &str,
        paths: &[String],
        expand: bool,
    ) -> Result<Vec<RepoEntry>> {
        let url = format!(
            "{}/paths-info/{}",
            path::api_url(&self.config.endpoint, repo),
            path::encode_revision(revision)
        );
        trace!("paths_info: {} ({} paths)", url, paths.len());

        let mut form: Vec<(&str, String)> = paths.iter().map(|p| ("paths", p.clone())).collect();
        form.push(("expand", expand.to_string()));

        let token = self.token().await?;
        let response = self
            .authorized(self.client.post(&url), token.as_deref())
            .form(&form)
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_range(
        &self,
        repo: &RepoRef,
        revision: &str,
        path_in_repo: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes> {
        if end <= start {
            return Ok(Bytes::new());
        }

        let url = path::resolve_url(&self.config.endpoint, repo, revision, path_in_repo);
        trace!("fetch_range: {} [{}, {})", url, start, end);

        let mut headers = HeaderMap::new();
        let range = range_header(start, end)
            .parse()
            .map_err(|_| HffsError::InvalidArgument(format!("Invalid range {}-{}", start, end)))?;
        headers.insert(RANGE, range);

        let response = self.get_with_retry(&url, headers).await?;
        Ok(response.bytes().await?)
    }

    async fn create_commit(
        &self,
        repo: &RepoRef,
        revision: &str,
        commit: CommitRequest,
    ) -> Result<CommitInfo> {
        let uploads = self.prepare_uploads(&commit.operations).await?;
        let modes = self.preupload(repo, revision, &uploads).await?;

        let lfs_uploads: Vec<&UploadInfo> = uploads
            .iter()
            .filter(|u| modes.get(&u.path_in_repo) == Some(&UploadMode::Lfs))
            .collect();
        if !lfs_uploads.is_empty() {
            self.upload_lfs_objects(repo, &lfs_uploads).await?;
        }

        let mut lines = vec![CommitLine::Header {
            summary: commit.summary.clone(),
            description: commit.description.clone().unwrap_or_default(),
        }];

        for operation in &commit.operations {
            let line = match operation {
                CommitOperation::Add {
                    path_in_repo,
                    source,
                } => {
                    let upload = uploads
                        .iter()
                        .find(|u| &u.path_in_repo == path_in_repo)
                        .ok_or_else(|| {
                            HffsError::InvalidArgument(format!(
                                "No upload prepared for {}",
                                path_in_repo
                            ))
                        })?;
                    if modes.get(path_in_repo) == Some(&UploadMode::Lfs) {
                        CommitLine::LfsFile {
                            path: path_in_repo.clone(),
                            algo: "sha256".to_string(),
                            oid: upload.sha256.clone(),
                        }
                    } else {
                        let content = read_source(source).await?;
                        CommitLine::File {
                            content: base64::engine::general_purpose::STANDARD.encode(&content),
                            path: path_in_repo.clone(),
                            encoding: "base64".to_string(),
                        }
                    }
                }
                CommitOperation::Delete { path_in_repo } => CommitLine::DeletedFile {
                    path: path_in_repo.clone(),
                },
                CommitOperation::DeleteFolder { path_in_repo } => CommitLine::DeletedFolder {
                    path: path_in_repo.clone(),
                },
                CommitOperation::CopyLfs {
                    path_in_repo, oid, ..
                } => CommitLine::LfsFile {
                    path: path_in_repo.clone(),
                    algo: "sha256".to_string(),
                    oid: oid.clone(),
                },
            };
            lines.push(line);
        }

        let url = format!(
            "{}/commit/{}",
            path::api_url(&self.config.endpoint, repo),
            path::encode_revision(revision)
        );
        debug!(
            "create_commit: {} ({} operations)",
            url,
            commit.operations.len()
        );

        let token = self.token().await?;
        let response = self
            .authorized(self.client.post(&url), token.as_deref())
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(commit_payload(&lines)?)
            .send()
            .await?;
        let response = check_response(response).await?;
        let info: CommitInfo = response.json().await?;

        info!("Committed {} to {}@{}: {}", info.oid, repo, revision, commit.summary);
        Ok(info)
    }
}

/// Load the full content of an upload source
pub(super) async fn read_source(source: &UploadSource) -> Result<Bytes> {
    match source {
        UploadSource::Bytes(bytes) => Ok(bytes.clone()),
        UploadSource::File(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_url() {
        let link = r#"<https://huggingface.co/api/models/gpt2/tree/main?recursive=true&cursor=abc>; rel="next""#;
        assert_eq!(
            next_page_url(link).as_deref(),
            Some("https://huggingface.co/api/models/gpt2/tree/main?recursive=true&cursor=abc")
        );
        assert_eq!(next_page_url(r#"<https://x/prev>; rel="prev""#), None);
    }

    #[test]
    fn test_range_header() {
        assert_eq!(range_header(0, 10), "bytes=0-9");
        assert_eq!(range_header(5, 6), "bytes=5-5");
    }

    #[test]
    fn test_commit_payload_lines() {
        let payload = commit_payload(&[
            CommitLine::Header {
                summary: "Upload data/a.txt".into(),
                description: String::new(),
            },
            CommitLine::File {
                content: "aGk=".into(),
                path: "data/a.txt".into(),
                encoding: "base64".into(),
            },
            CommitLine::DeletedFile {
                path: "data/b.txt".into(),
            },
            CommitLine::LfsFile {
                path: "w.bin".into(),
                algo: "sha256".into(),
                oid: "ff".into(),
            },
        ])
        .unwrap();

        let lines: Vec<serde_json::Value> = payload
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Upload data/a.txt");
        assert_eq!(lines[1]["key"], "file");
        assert_eq!(lines[1]["value"]["encoding"], "base64");
        assert_eq!(lines[2]["key"], "deletedFile");
        assert_eq!(lines[2]["value"]["path"], "data/b.txt");
        assert_eq!(lines[3]["key"], "lfsFile");
        assert_eq!(lines[3]["value"]["algo"], "sha256");
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, None, "x".into()),
            HffsError::RepositoryNotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, Some("RevisionNotFound"), "x".into()),
            HffsError::RevisionNotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, Some("EntryNotFound"), "x".into()),
            HffsError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::SERVICE_UNAVAILABLE, None, "x".into()),
            HffsError::Http { status: 503, .. }
        ));
    }
}
