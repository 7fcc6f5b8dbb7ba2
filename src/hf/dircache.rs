//! Listing cache
//!
//! Maps a directory name (canonical, without protocol) to its entries. A
//! recursive tree listing fills every directory below the listed one at once.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use crate::filesystem::FileInfo;
use crate::path;

#[derive(Debug, Clone)]
struct CachedListing {
    entries: Vec<FileInfo>,
    cached_at: Instant,
}

/// Directory listings keyed by canonical name
#[derive(Debug, Default)]
pub struct DirCache {
    listings: DashMap<String, CachedListing>,
    /// Listings older than this are dropped on lookup
    ttl: Option<Duration>,
}

impl DirCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            listings: DashMap::new(),
            ttl,
        }
    }

    /// Cached entries of `dir`, if present and fresh
    pub fn get(&self, dir: &str) -> Option<Vec<FileInfo>> {
        {
            let cached = self.listings.get(dir)?;
            let fresh = self
                .ttl
                .map_or(true, |ttl| cached.cached_at.elapsed() < ttl);
            if fresh {
                return Some(cached.entries.clone());
            }
        }
        trace!("dircache: {} expired", dir);
        self.listings.remove(dir);
        None
    }

    pub fn contains(&self, dir: &str) -> bool {
        self.get(dir).is_some()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Store a recursive listing of `listed` (entries of every depth below it)
    ///
    /// Keys inside the listed subtree are replaced. Cached ancestors between
    /// `repo_root` and `listed` only gain the directory entries they were
    /// missing.
    pub fn fill(&self, repo_root: &str, listed: &str, entries: Vec<FileInfo>) {
        let mut grouped: HashMap<String, Vec<FileInfo>> = HashMap::new();
        grouped.insert(listed.to_string(), Vec::new());
        for entry in entries {
            if entry.is_dir() {
                grouped.entry(entry.name.clone()).or_default();
            }
            grouped
                .entry(path::parent(&entry.name).to_string())
                .or_default()
                .push(entry);
        }

        let subtree = format!("{}/", listed);
        self.listings
            .retain(|key, _| key != listed && !key.starts_with(&subtree));

        let now = Instant::now();
        let count = grouped.len();
        for (dir, mut entries) in grouped {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            self.listings.insert(
                dir,
                CachedListing {
                    entries,
                    cached_at: now,
                },
            );
        }

        let mut child = listed.to_string();
        while child.len() > repo_root.len() {
            let parent = path::parent(&child).to_string();
            if let Some(mut cached) = self.listings.get_mut(&parent) {
                if !cached.entries.iter().any(|e| e.name == child) {
                    cached.entries.push(FileInfo::directory(child.clone()));
                    cached.entries.sort_by(|a, b| a.name.cmp(&b.name));
                }
            }
            child = parent;
        }

        trace!("dircache: filled {} listings under {}", count, listed);
    }

    /// Drop `path`, everything below it and all of its ancestors
    pub fn invalidate(&self, path: &str) {
        let below = format!("{}/", path);
        self.listings
            .retain(|key, _| key != path && !key.starts_with(&below));

        let mut current = path;
        while !current.is_empty() {
            current = path::parent(current);
            self.listings.remove(current);
        }
    }

    pub fn clear(&self) {
        self.listings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[FileInfo]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sample_tree(root: &str) -> Vec<FileInfo> {
        vec![
            FileInfo::file(format!("{}/.gitattributes", root), 10),
            FileInfo::directory(format!("{}/data", root)),
            FileInfo::file(format!("{}/data/a.txt", root), 1),
            FileInfo::directory(format!("{}/data/sub", root)),
            FileInfo::file(format!("{}/data/sub/b.txt", root), 2),
        ]
    }

    #[test]
    fn test_fill_groups_by_directory() {
        let cache = DirCache::new(None);
        cache.fill("user/repo", "user/repo", sample_tree("user/repo"));

        assert_eq!(
            names(&cache.get("user/repo").unwrap()),
            vec!["user/repo/.gitattributes", "user/repo/data"]
        );
        assert_eq!(
            names(&cache.get("user/repo/data").unwrap()),
            vec!["user/repo/data/a.txt", "user/repo/data/sub"]
        );
        assert_eq!(
            names(&cache.get("user/repo/data/sub").unwrap()),
            vec!["user/repo/data/sub/b.txt"]
        );
    }

    #[test]
    fn test_refill_replaces_subtree_without_duplicates() {
        let cache = DirCache::new(None);
        cache.fill("user/repo", "user/repo", sample_tree("user/repo"));
        cache.fill("user/repo", "user/repo", sample_tree("user/repo"));

        assert_eq!(cache.get("user/repo").unwrap().len(), 2);
        assert_eq!(cache.get("user/repo/data").unwrap().len(), 2);
    }

    #[test]
    fn test_refill_drops_removed_dirs() {
        let cache = DirCache::new(None);
        cache.fill("user/repo", "user/repo", sample_tree("user/repo"));
        cache.fill(
            "user/repo",
            "user/repo/data",
            vec![FileInfo::file("user/repo/data/a.txt", 1)],
        );

        assert!(cache.get("user/repo/data/sub").is_none());
        assert_eq!(
            names(&cache.get("user/repo/data").unwrap()),
            vec!["user/repo/data/a.txt"]
        );
        // the ancestor keeps its listing
        assert_eq!(cache.get("user/repo").unwrap().len(), 2);
    }

    #[test]
    fn test_ancestor_gains_missing_directory() {
        let cache = DirCache::new(None);
        cache.fill(
            "user/repo",
            "user/repo",
            vec![FileInfo::file("user/repo/.gitattributes", 10)],
        );
        cache.fill(
            "user/repo",
            "user/repo/new",
            vec![FileInfo::file("user/repo/new/x.txt", 3)],
        );

        assert_eq!(
            names(&cache.get("user/repo").unwrap()),
            vec!["user/repo/.gitattributes", "user/repo/new"]
        );
    }

    #[test]
    fn test_uncached_ancestor_stays_absent() {
        let cache = DirCache::new(None);
        cache.fill(
            "user/repo",
            "user/repo/a/b",
            vec![FileInfo::file("user/repo/a/b/x.txt", 3)],
        );
        assert!(cache.get("user/repo/a").is_none());
        assert!(cache.get("user/repo").is_none());
    }

    #[test]
    fn test_invalidate_drops_descendants_and_ancestors() {
        let cache = DirCache::new(None);
        cache.fill("user/repo", "user/repo", sample_tree("user/repo"));
        cache.fill("other/repo", "other/repo", sample_tree("other/repo"));

        cache.invalidate("user/repo/data");
        assert!(cache.get("user/repo/data").is_none());
        assert!(cache.get("user/repo/data/sub").is_none());
        assert!(cache.get("user/repo").is_none());
        assert!(cache.get("other/repo/data").is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = DirCache::new(Some(Duration::ZERO));
        cache.fill("user/repo", "user/repo", sample_tree("user/repo"));
        assert!(cache.get("user/repo").is_none());
        assert!(!cache.contains("user/repo/data"));
    }
}
