//! Git-backed template cache
//!
//! Each remote is cloned once under `<cache root>/<host>/<path>` and
//! fast-forwarded from `origin` on later use. Concurrent processes touching
//! the same cache entry are not coordinated.

use crate::error::{Error, IoResultExt, Result};
use crate::paths;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks, Repository};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

const REMOTE_NAME: &str = "origin";

/// Host segment used for `file://` URLs, which have none
const LOCAL_HOST: &str = "local";

/// Clone-or-update cache of remote template repositories
#[derive(Debug, Clone)]
pub struct GitCache {
    root: PathBuf,
    offline: bool,
}

impl GitCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            offline: false,
        }
    }

    /// Reuse existing cache entries without contacting the remote
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Cache directory for `url`: `<root>/<host>/<path>`, with a trailing
    /// `/` or `.git` removed so equivalent spellings share one entry
    pub fn dir_for(&self, url: &Url) -> Result<PathBuf> {
        let host = url.host_str().filter(|h| !h.is_empty()).unwrap_or(LOCAL_HOST);
        let path = url.path().trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        if path.is_empty() {
            return Err(Error::invalid_identifier(
                url.as_str(),
                "repository URL has no path",
            ));
        }

        paths::contained_join(&self.root, Path::new(host).join(path))
    }

    /// Return a local checkout of `url`, cloning or fast-forwarding it first
    pub fn obtain(&self, url: &Url) -> Result<PathBuf> {
        let dir = self.dir_for(url)?;

        if dir.is_dir() {
            if self.offline {
                info!("Using cached {} (offline)", dir.display());
            } else {
                self.update(&dir)?;
            }
            return Ok(dir);
        }

        if self.offline {
            return Err(Error::NotFound {
                identifier: url.to_string(),
            });
        }

        std::fs::create_dir_all(&dir).at(&dir)?;
        if let Err(e) = self.clone_into(url, &dir) {
            // an empty entry would otherwise be mistaken for a cached repo
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e);
        }
        Ok(dir)
    }

    fn clone_into(&self, url: &Url, dir: &Path) -> Result<()> {
        info!("Cloning {} into {}", url, dir.display());

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(progress_callbacks());

        RepoBuilder::new()
            .fetch_options(fetch_opts)
            .clone(url.as_str(), dir)
            .map_err(|e| Error::git(url, e))?;

        info!("Cloned {}", url);
        Ok(())
    }

    /// Fetch `origin` and fast-forward the checked-out branch.
    /// Already being up to date is success.
    fn update(&self, dir: &Path) -> Result<()> {
        let target = dir.display();
        info!("Updating cached template {}", target);

        let repo = Repository::open(dir).map_err(|e| Error::git(&target, e))?;
        let mut remote = repo
            .find_remote(REMOTE_NAME)
            .map_err(|e| Error::git(&target, e))?;

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(progress_callbacks());
        remote
            .fetch::<&str>(&[], Some(&mut fetch_opts), None)
            .map_err(|e| Error::git(&target, e))?;

        let head = repo.head().map_err(|e| Error::git(&target, e))?;
        if !head.is_branch() {
            return Err(Error::git(
                &target,
                git2::Error::from_str("HEAD is detached; cannot fast-forward"),
            ));
        }
        let branch = head
            .shorthand()
            .ok_or_else(|| Error::git(&target, git2::Error::from_str("branch name is not UTF-8")))?
            .to_string();
        let head_ref = head
            .name()
            .ok_or_else(|| Error::git(&target, git2::Error::from_str("ref name is not UTF-8")))?
            .to_string();

        let upstream = repo
            .find_reference(&format!("refs/remotes/{}/{}", REMOTE_NAME, branch))
            .map_err(|e| Error::git(&target, e))?;
        let upstream_commit = repo
            .reference_to_annotated_commit(&upstream)
            .map_err(|e| Error::git(&target, e))?;

        let (analysis, _) = repo
            .merge_analysis(&[&upstream_commit])
            .map_err(|e| Error::git(&target, e))?;

        if analysis.is_up_to_date() {
            info!("{} is already up to date", target);
            return Ok(());
        }

        if !analysis.is_fast_forward() {
            return Err(Error::git(
                &target,
                git2::Error::from_str("local branch has diverged from origin; cannot fast-forward"),
            ));
        }

        let mut reference = repo
            .find_reference(&head_ref)
            .map_err(|e| Error::git(&target, e))?;
        reference
            .set_target(upstream_commit.id(), "tpl: fast-forward")
            .map_err(|e| Error::git(&target, e))?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))
            .map_err(|e| Error::git(&target, e))?;

        info!("Fast-forwarded {} to {}", target, upstream_commit.id());
        Ok(())
    }
}

/// Server messages go to stderr, transfer statistics to the debug log
fn progress_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.sideband_progress(|data| {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(data);
        let _ = stderr.flush();
        true
    });
    callbacks.transfer_progress(|stats| {
        if stats.received_objects() == stats.total_objects() {
            debug!(
                "Resolving deltas {}/{}",
                stats.indexed_deltas(),
                stats.total_deltas()
            );
        } else {
            debug!(
                "Received {}/{} objects ({} bytes)",
                stats.received_objects(),
                stats.total_objects(),
                stats.received_bytes()
            );
        }
        true
    });
    callbacks
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    /// Commit `files` on top of the current HEAD of `repo`
    fn commit(repo: &Repository, files: &[(&str, &str)], message: &str) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (name, content) in files {
            let path = workdir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn remote_fixture() -> (TempDir, Repository, Url) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit(
            &repo,
            &[("README.md", "# {{{ .name }}}\n"), ("src/main.rs", "fn main() {}\n")],
            "initial",
        );
        let url = Url::from_directory_path(dir.path()).unwrap();
        (dir, repo, url)
    }

    #[test]
    fn test_dir_for_uses_host_and_path() {
        let cache = GitCache::new("/cache");
        let url = Url::parse("https://github.com/acme/starter").unwrap();
        assert_eq!(
            cache.dir_for(&url).unwrap(),
            PathBuf::from("/cache/github.com/acme/starter")
        );

        let dotted = Url::parse("https://github.com/acme/starter.git/").unwrap();
        assert_eq!(cache.dir_for(&dotted).unwrap(), cache.dir_for(&url).unwrap());
    }

    #[test]
    fn test_dir_for_rejects_empty_path() {
        let cache = GitCache::new("/cache");
        let url = Url::parse("https://github.com/").unwrap();
        assert!(matches!(
            cache.dir_for(&url),
            Err(Error::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_clone_then_up_to_date() {
        let (_remote_dir, _repo, url) = remote_fixture();
        let cache_root = TempDir::new().unwrap();
        let cache = GitCache::new(cache_root.path());

        let first = cache.obtain(&url).unwrap();
        assert_eq!(
            fs::read_to_string(first.join("README.md")).unwrap(),
            "# {{{ .name }}}\n"
        );

        // second call reuses the same entry via the up-to-date path
        let second = cache.obtain(&url).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            fs::read_to_string(second.join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
    }

    #[test]
    fn test_update_fast_forwards() {
        let (_remote_dir, repo, url) = remote_fixture();
        let cache_root = TempDir::new().unwrap();
        let cache = GitCache::new(cache_root.path());
        let dir = cache.obtain(&url).unwrap();
        assert!(!dir.join("NEW.md").exists());

        commit(&repo, &[("NEW.md", "added upstream\n")], "second");

        let again = cache.obtain(&url).unwrap();
        assert_eq!(again, dir);
        assert_eq!(
            fs::read_to_string(dir.join("NEW.md")).unwrap(),
            "added upstream\n"
        );
    }

    #[test]
    fn test_offline_mode() {
        let (_remote_dir, _repo, url) = remote_fixture();
        let cache_root = TempDir::new().unwrap();

        let offline = GitCache::new(cache_root.path()).offline(true);
        assert!(matches!(offline.obtain(&url), Err(Error::NotFound { .. })));

        let dir = GitCache::new(cache_root.path()).obtain(&url).unwrap();
        assert_eq!(offline.obtain(&url).unwrap(), dir);
    }

    #[test]
    fn test_clone_failure_is_git_error() {
        let missing = TempDir::new().unwrap();
        let url = Url::from_directory_path(missing.path().join("nope")).unwrap();
        let cache_root = TempDir::new().unwrap();

        let err = GitCache::new(cache_root.path()).obtain(&url).unwrap_err();
        assert!(matches!(err, Error::Git { .. }), "{}", err);
    }
}
