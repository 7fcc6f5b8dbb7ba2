//! Hub path and URL handling
//!
//! Remote paths are addressed as
//! `hf://[<repo_type_prefix>]<repo_id>[@<revision>]/<path/in/repo>`, where the
//! prefix is `datasets/` or `spaces/` and no prefix means a model repository.
//! The older `hf://[<repo_type>/]<repo_id>[@<revision>]:/<path/in/repo>` form is
//! also understood; there the repository id is explicit and needs no probing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HffsError, Result};

/// URL protocol handled by this crate
pub const PROTOCOL: &str = "hf";

/// Branch used when no revision is given
pub const DEFAULT_REVISION: &str = "main";

/// Separator of the explicit `<repo_id>:/<path>` form
const EXPLICIT_SEPARATOR: &str = ":/";

/// Kind of Hub repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Model => "model",
            RepoType::Dataset => "dataset",
            RepoType::Space => "space",
        }
    }

    /// Prefix of this repo type in filesystem paths and web URLs
    pub fn url_prefix(&self) -> &'static str {
        match self {
            RepoType::Model => "",
            RepoType::Dataset => "datasets/",
            RepoType::Space => "spaces/",
        }
    }

    /// Segment used in `/api/<segment>/<repo_id>` routes
    pub fn api_segment(&self) -> &'static str {
        match self {
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
            RepoType::Space => "spaces",
        }
    }

    /// Repo type named by a leading path segment in canonical paths.
    /// Model repositories have no prefix.
    fn from_url_segment(segment: &str) -> Option<Self> {
        match segment {
            "datasets" => Some(RepoType::Dataset),
            "spaces" => Some(RepoType::Space),
            _ => None,
        }
    }

    /// Repo type named by a leading segment in the explicit `:/` form, where
    /// singular names are accepted as well
    fn from_explicit_segment(segment: &str) -> Option<Self> {
        match segment {
            "models" | "model" => Some(RepoType::Model),
            "datasets" | "dataset" => Some(RepoType::Dataset),
            "spaces" | "space" => Some(RepoType::Space),
            _ => None,
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = HffsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "model" => Ok(RepoType::Model),
            "dataset" => Ok(RepoType::Dataset),
            "space" => Ok(RepoType::Space),
            other => Err(HffsError::InvalidArgument(format!(
                "Invalid repo type '{}', must be one of model, dataset, space",
                other
            ))),
        }
    }
}

/// A repository on the Hub
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub repo_type: RepoType,
    pub repo_id: String,
}

impl RepoRef {
    pub fn new(repo_type: RepoType, repo_id: impl Into<String>) -> Self {
        Self {
            repo_type,
            repo_id: repo_id.into(),
        }
    }

    pub fn model(repo_id: impl Into<String>) -> Self {
        Self::new(RepoType::Model, repo_id)
    }

    pub fn dataset(repo_id: impl Into<String>) -> Self {
        Self::new(RepoType::Dataset, repo_id)
    }

    pub fn space(repo_id: impl Into<String>) -> Self {
        Self::new(RepoType::Space, repo_id)
    }

    /// `<prefix><repo_id>`, e.g. `datasets/user/data`
    pub fn prefixed_id(&self) -> String {
        format!("{}{}", self.repo_type.url_prefix(), self.repo_id)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefixed_id())
    }
}

/// Repository reference parsed from a URL without contacting the Hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    pub repo_type: RepoType,
    pub repo_id: String,
    pub revision: Option<String>,
}

impl RepoLocator {
    /// Parse `[hf://][<prefix>/]<repo_id>[@<revision>][:/<path>]`.
    ///
    /// Everything before the explicit separator (or the whole input) is taken as
    /// the repository id.
    pub fn parse(url: &str) -> Result<Self> {
        Self::parse_with_default(url, RepoType::Model)
    }

    /// Parse like [`RepoLocator::parse`], using `default_type` when the input
    /// carries no repo type prefix
    pub fn parse_with_default(url: &str, default_type: RepoType) -> Result<Self> {
        let stripped = strip_protocol(url);
        match stripped.split_once(EXPLICIT_SEPARATOR) {
            Some((repo, _)) => Self::parse_repo_part(url, repo, true, default_type),
            None => Self::parse_repo_part(url, &stripped, false, default_type),
        }
    }

    fn parse_repo_part(
        input: &str,
        repo_part: &str,
        explicit: bool,
        default_type: RepoType,
    ) -> Result<Self> {
        let (repo_type, rest) = split_repo_type(repo_part, explicit, default_type);
        let (repo_id, revision) = split_revision(rest)?;
        validate_repo_id(input, &repo_id)?;

        Ok(Self {
            repo_type,
            repo_id,
            revision,
        })
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(self.repo_type, self.repo_id.clone())
    }
}

/// A path that has been resolved to a repository and a path inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub repo: RepoRef,
    /// Revision given in the path itself (`repo@rev/...`)
    pub revision: Option<String>,
    pub path_in_repo: String,
}

impl ResolvedPath {
    /// `<prefix><repo_id>[@<revision>]`
    pub fn root(&self) -> String {
        match &self.revision {
            Some(rev) => format!("{}@{}", self.repo.prefixed_id(), encode_revision(rev)),
            None => self.repo.prefixed_id(),
        }
    }

    /// Canonical filesystem name of this path
    pub fn canonical(&self) -> String {
        join(&self.root(), &self.path_in_repo)
    }

    /// Filesystem name of `path_in_repo` inside the same repository and revision
    pub fn sibling(&self, path_in_repo: &str) -> String {
        join(&self.root(), path_in_repo)
    }

    /// Strip this path's root from `name`, yielding the path inside the repo
    pub fn relative<'a>(&self, name: &'a str) -> Option<&'a str> {
        let root = self.root();
        let rest = name.strip_prefix(root.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Effective revision for hub requests
    pub fn revision_or<'a>(&'a self, fallback: Option<&'a str>) -> &'a str {
        self.revision
            .as_deref()
            .or(fallback)
            .unwrap_or(DEFAULT_REVISION)
    }

    pub fn is_repo_root(&self) -> bool {
        self.path_in_repo.is_empty()
    }
}

/// Unresolved path split into the candidates the filesystem needs to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathCandidates {
    /// Repository id given explicitly with `:/`
    Explicit(ResolvedPath),
    /// Repository id is either `namespace/name` or just `name`
    Probe {
        repo_type: RepoType,
        segments: Vec<String>,
    },
}

/// Split a stripped path into resolution candidates
pub(crate) fn candidates(path: &str, default_type: RepoType) -> Result<PathCandidates> {
    let stripped = strip_protocol(path);
    if stripped.is_empty() {
        return Err(HffsError::NotSupported(
            "Access to repositories lists is not implemented".to_string(),
        ));
    }

    if let Some((repo_part, path_in_repo)) = stripped.split_once(EXPLICIT_SEPARATOR) {
        let locator = RepoLocator::parse_repo_part(path, repo_part, true, default_type)?;
        return Ok(PathCandidates::Explicit(ResolvedPath {
            repo: locator.repo(),
            revision: locator.revision,
            path_in_repo: normalize(path_in_repo),
        }));
    }

    let (repo_type, rest) = match stripped.split_once('/') {
        Some((first, rest)) => match RepoType::from_url_segment(first) {
            Some(repo_type) => (repo_type, rest),
            None => (RepoType::Model, stripped.as_str()),
        },
        None if RepoType::from_url_segment(&stripped).is_some() => {
            // can't list repositories at the repo type level
            return Err(HffsError::NotSupported(
                "Access to repositories lists is not implemented".to_string(),
            ));
        }
        None => (RepoType::Model, stripped.as_str()),
    };

    let segments: Vec<String> = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        return Err(HffsError::NotSupported(
            "Access to repositories lists is not implemented".to_string(),
        ));
    }

    Ok(PathCandidates::Probe {
        repo_type,
        segments,
    })
}

/// Remove the `hf://` protocol and trailing slashes
pub fn strip_protocol(path: &str) -> String {
    let path = path
        .strip_prefix(PROTOCOL)
        .and_then(|p| p.strip_prefix("://"))
        .unwrap_or(path);
    path.trim_end_matches('/').to_string()
}

/// Add the `hf://` protocol to a filesystem name
pub fn unstrip_protocol(path: &str) -> String {
    if path.starts_with(&format!("{}://", PROTOCOL)) {
        path.to_string()
    } else {
        format!("{}://{}", PROTOCOL, path)
    }
}

/// Parent of a filesystem name; the root marker is the empty string
pub fn parent(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Join a root and a relative path without doubling separators
pub fn join(root: &str, rel: &str) -> String {
    let rel = rel.trim_matches('/');
    if rel.is_empty() {
        root.to_string()
    } else if root.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), rel)
    }
}

/// Percent-encode a revision for use in a single URL segment
pub fn encode_revision(revision: &str) -> String {
    urlencoding::encode(revision).into_owned()
}

/// Percent-encode a path in a repository, keeping `/` separators
pub fn encode_path_in_repo(path_in_repo: &str) -> String {
    path_in_repo
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Web URL of a file's raw content
pub fn resolve_url(endpoint: &str, repo: &RepoRef, revision: &str, path_in_repo: &str) -> String {
    format!(
        "{}/{}/resolve/{}/{}",
        endpoint.trim_end_matches('/'),
        repo.prefixed_id(),
        encode_revision(revision),
        encode_path_in_repo(path_in_repo)
    )
}

/// Base of the `/api/<type>s/<repo_id>` routes
pub fn api_url(endpoint: &str, repo: &RepoRef) -> String {
    format!(
        "{}/api/{}/{}",
        endpoint.trim_end_matches('/'),
        repo.repo_type.api_segment(),
        repo.repo_id
    )
}

/// Collapse duplicate separators and trim leading/trailing ones
fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn split_repo_type(repo_part: &str, explicit: bool, default_type: RepoType) -> (RepoType, &str) {
    if let Some((first, rest)) = repo_part.split_once('/') {
        let parsed = if explicit {
            RepoType::from_explicit_segment(first)
        } else {
            RepoType::from_url_segment(first)
        };
        if let Some(repo_type) = parsed {
            if !rest.is_empty() {
                return (repo_type, rest);
            }
        }
    }
    (default_type, repo_part)
}

/// Split `repo_id[@revision]`, decoding a percent-encoded revision
pub(crate) fn split_revision(repo: &str) -> Result<(String, Option<String>)> {
    match repo.split_once('@') {
        Some((id, rev)) => {
            if rev.is_empty() {
                return Err(HffsError::InvalidPath(format!(
                    "Empty revision in '{}'",
                    repo
                )));
            }
            let rev = urlencoding::decode(rev)
                .map_err(|e| HffsError::InvalidPath(format!("Invalid revision '{}': {}", rev, e)))?
                .into_owned();
            Ok((id.to_string(), Some(rev)))
        }
        None => Ok((repo.to_string(), None)),
    }
}

fn validate_repo_id(input: &str, repo_id: &str) -> Result<()> {
    let parts: Vec<&str> = repo_id.split('/').collect();
    let valid = !repo_id.is_empty()
        && parts.len() <= 2
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if valid {
        Ok(())
    } else {
        Err(HffsError::InvalidPath(format!(
            "Invalid repo id '{}' in '{}'",
            repo_id, input
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(repo_type: RepoType, repo_id: &str, revision: Option<&str>) -> RepoLocator {
        RepoLocator {
            repo_type,
            repo_id: repo_id.to_string(),
            revision: revision.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_locators() {
        let cases = [
            ("gpt2", locator(RepoType::Model, "gpt2", None)),
            ("hf://gpt2", locator(RepoType::Model, "gpt2", None)),
            (
                "datasets/username/my_dataset",
                locator(RepoType::Dataset, "username/my_dataset", None),
            ),
            (
                "hf://datasets/username/my_dataset",
                locator(RepoType::Dataset, "username/my_dataset", None),
            ),
            (
                "hf://datasets/username/my_dataset@0123456789",
                locator(RepoType::Dataset, "username/my_dataset", Some("0123456789")),
            ),
            ("datasets/squad", locator(RepoType::Dataset, "squad", None)),
            ("hf://datasets/squad", locator(RepoType::Dataset, "squad", None)),
        ];

        for (input, expected) in cases {
            assert_eq!(RepoLocator::parse(input).unwrap(), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_parse_explicit_form() {
        let parsed = RepoLocator::parse("hf://dataset/user/repo:/data/text_data.txt").unwrap();
        assert_eq!(parsed, locator(RepoType::Dataset, "user/repo", None));

        let parsed =
            RepoLocator::parse_with_default("hf://user/repo@dev:/data", RepoType::Dataset).unwrap();
        assert_eq!(parsed, locator(RepoType::Dataset, "user/repo", Some("dev")));
    }

    #[test]
    fn test_parse_encoded_revision() {
        let parsed = RepoLocator::parse("user/model@refs%2Fpr%2F1").unwrap();
        assert_eq!(parsed.revision.as_deref(), Some("refs/pr/1"));
    }

    #[test]
    fn test_invalid_repo_ids() {
        assert!(RepoLocator::parse("a/b/c").is_err());
        assert!(RepoLocator::parse("hf://").is_err());
        assert!(RepoLocator::parse("user/repo@").is_err());
    }

    #[test]
    fn test_candidates_explicit() {
        let c = candidates("hf://datasets/user/repo@v1:/data//file.txt", RepoType::Model).unwrap();
        match c {
            PathCandidates::Explicit(resolved) => {
                assert_eq!(resolved.repo, RepoRef::dataset("user/repo"));
                assert_eq!(resolved.revision.as_deref(), Some("v1"));
                assert_eq!(resolved.path_in_repo, "data/file.txt");
                assert_eq!(resolved.canonical(), "datasets/user/repo@v1/data/file.txt");
            }
            other => panic!("Expected explicit path, got {:?}", other),
        }
    }

    #[test]
    fn test_candidates_explicit_singular_type() {
        let c = candidates("hf://dataset/user/repo:/x.txt", RepoType::Model).unwrap();
        match c {
            PathCandidates::Explicit(resolved) => {
                assert_eq!(resolved.repo, RepoRef::dataset("user/repo"));
                assert_eq!(resolved.path_in_repo, "x.txt");
            }
            other => panic!("Expected explicit path, got {:?}", other),
        }
    }

    #[test]
    fn test_candidates_probe() {
        let c = candidates("hf://spaces/user/app/app.py", RepoType::Model).unwrap();
        assert_eq!(
            c,
            PathCandidates::Probe {
                repo_type: RepoType::Space,
                segments: vec!["user".into(), "app".into(), "app.py".into()],
            }
        );
    }

    #[test]
    fn test_candidates_listing_roots_unsupported() {
        for path in ["", "hf://", "datasets", "hf://spaces/"] {
            match candidates(path, RepoType::Model) {
                Err(HffsError::NotSupported(_)) => {}
                other => panic!("Expected NotSupported for {:?}, got {:?}", path, other),
            }
        }
    }

    #[test]
    fn test_parent_and_join() {
        assert_eq!(parent("datasets/user/repo/data/file.txt"), "datasets/user/repo/data");
        assert_eq!(parent("gpt2"), "");
        assert_eq!(join("user/repo", ""), "user/repo");
        assert_eq!(join("user/repo", "/data/"), "user/repo/data");
    }

    #[test]
    fn test_urls() {
        let repo = RepoRef::dataset("user/repo");
        assert_eq!(
            resolve_url("https://huggingface.co/", &repo, "refs/pr/1", "data/a b.txt"),
            "https://huggingface.co/datasets/user/repo/resolve/refs%2Fpr%2F1/data/a%20b.txt"
        );
        assert_eq!(
            api_url("https://huggingface.co", &RepoRef::model("gpt2")),
            "https://huggingface.co/api/models/gpt2"
        );
    }

    #[test]
    fn test_relative_name() {
        let resolved = ResolvedPath {
            repo: RepoRef::model("user/model"),
            revision: None,
            path_in_repo: String::new(),
        };
        assert_eq!(resolved.relative("user/model/config.json"), Some("config.json"));
        assert_eq!(resolved.relative("user/model"), Some(""));
        assert_eq!(resolved.relative("user/modelx/config.json"), None);
    }
}
