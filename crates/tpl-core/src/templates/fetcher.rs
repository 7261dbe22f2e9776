//! Template source resolution
//!
//! An identifier is tried, first match wins, as:
//!
//! 1. an existing path: a directory is used in place, an archive is unpacked
//! 2. the identifier plus each archive suffix (`proj` → `proj.tar.gz`, ...)
//! 3. steps 1–2 relative to each search-path entry
//! 4. a remote repository (full URL, `owner/repo` or `host/owner/repo`),
//!    obtained through the git cache
//!
//! The result is always a directory, never a single file.

use super::archive::{self, ARCHIVE_SUFFIXES};
use super::git::GitCache;
use crate::config::ScaffoldConfig;
use crate::error::{Error, IoResultExt, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use url::Url;

/// URL schemes accepted for remote templates
const REMOTE_SCHEMES: &[&str] = &["https", "http", "ssh", "git", "file"];

/// How a template tree was located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Directory given directly by the identifier
    LocalFile,
    /// Archive given directly (or by suffix probing), unpacked
    LocalArchive,
    /// Directory found under a search-path entry
    SearchPathEntry,
    /// Archive found under a search-path entry, unpacked
    SearchPathArchive,
    /// Repository from the git cache
    GitRemote,
}

/// A resolved template tree on local disk
#[derive(Debug)]
pub struct TemplateSource {
    kind: SourceKind,
    location: String,
    resolved_dir: PathBuf,
    /// Unpacked archives live here; removed when the source is dropped
    _scratch: Option<TempDir>,
}

impl TemplateSource {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The path or URL that matched
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Directory holding the template tree
    pub fn resolved_dir(&self) -> &Path {
        &self.resolved_dir
    }
}

/// Where a local candidate came from, which decides its [`SourceKind`]
#[derive(Debug, Clone, Copy)]
enum Origin {
    Local,
    SearchPath,
}

impl Origin {
    fn dir_kind(self) -> SourceKind {
        match self {
            Self::Local => SourceKind::LocalFile,
            Self::SearchPath => SourceKind::SearchPathEntry,
        }
    }

    fn archive_kind(self) -> SourceKind {
        match self {
            Self::Local => SourceKind::LocalArchive,
            Self::SearchPath => SourceKind::SearchPathArchive,
        }
    }
}

/// Template fetcher - turns an identifier into a local template directory
#[derive(Debug, Clone)]
pub struct TemplateFetcher {
    search_path: Vec<PathBuf>,
    default_host: String,
    cache: GitCache,
}

impl TemplateFetcher {
    pub fn new(search_path: Vec<PathBuf>, default_host: impl Into<String>, cache: GitCache) -> Self {
        Self {
            search_path,
            default_host: default_host.into(),
            cache,
        }
    }

    /// Create a fetcher from an explicit configuration
    pub fn from_config(config: &ScaffoldConfig) -> Self {
        Self::new(
            config.search_path.clone(),
            config.default_host.clone(),
            GitCache::new(&config.cache_root).offline(config.offline),
        )
    }

    /// Resolve `identifier` to a local directory holding a template tree
    pub fn resolve(&self, identifier: &str) -> Result<TemplateSource> {
        if identifier.trim().is_empty() {
            return Err(Error::invalid_identifier(identifier, "identifier is empty"));
        }

        let local = Path::new(identifier);
        if let Some(source) = self.try_candidate(local, Origin::Local)? {
            return Ok(source);
        }

        if local.is_relative() {
            for entry in &self.search_path {
                debug!("Searching {} for {}", entry.display(), identifier);
                if let Some(source) = self.try_candidate(&entry.join(local), Origin::SearchPath)? {
                    return Ok(source);
                }
            }
        }

        if looks_like_path(identifier) {
            return Err(Error::NotFound {
                identifier: identifier.to_string(),
            });
        }

        let url = parse_remote(identifier, &self.default_host)?;
        let resolved_dir = self.cache.obtain(&url)?;
        info!("Resolved {} to cached repository {}", identifier, resolved_dir.display());

        Ok(TemplateSource {
            kind: SourceKind::GitRemote,
            location: url.to_string(),
            resolved_dir,
            _scratch: None,
        })
    }

    /// Steps 1 and 2 for one candidate path
    fn try_candidate(&self, candidate: &Path, origin: Origin) -> Result<Option<TemplateSource>> {
        if candidate.is_dir() {
            info!("Using template directory {}", candidate.display());
            return Ok(Some(TemplateSource {
                kind: origin.dir_kind(),
                location: candidate.display().to_string(),
                resolved_dir: candidate.to_path_buf(),
                _scratch: None,
            }));
        }

        if candidate.is_file() {
            if !archive::is_archive(candidate) {
                return Err(Error::UnsupportedFormat {
                    path: candidate.to_path_buf(),
                });
            }
            return unpack(candidate, origin).map(Some);
        }

        for suffix in ARCHIVE_SUFFIXES {
            let mut name = OsString::from(candidate.as_os_str());
            name.push(suffix);
            let archive_path = PathBuf::from(name);
            if archive_path.is_file() {
                return unpack(&archive_path, origin).map(Some);
            }
        }

        Ok(None)
    }
}

/// Extract an archive into a fresh scratch directory
fn unpack(archive_path: &Path, origin: Origin) -> Result<TemplateSource> {
    let scratch = tempfile::Builder::new()
        .prefix("tpl-")
        .tempdir()
        .at(std::env::temp_dir())?;

    archive::extract(archive_path, scratch.path())?;
    info!(
        "Unpacked {} into {}",
        archive_path.display(),
        scratch.path().display()
    );

    Ok(TemplateSource {
        kind: origin.archive_kind(),
        location: archive_path.display().to_string(),
        resolved_dir: scratch.path().to_path_buf(),
        _scratch: Some(scratch),
    })
}

/// Identifiers that can only mean a filesystem path
fn looks_like_path(identifier: &str) -> bool {
    identifier.starts_with(['.', '/', '~', '\\']) || Path::new(identifier).is_absolute()
}

/// Turn a remote identifier into a URL.
///
/// Accepts a full URL with a supported scheme, scp-style
/// `user@host:owner/repo`, or shorthand with exactly two (`owner/repo`, on
/// `default_host`) or three (`host/owner/repo`) segments.
pub fn parse_remote(identifier: &str, default_host: &str) -> Result<Url> {
    if let Some((scheme, _)) = identifier.split_once("://") {
        if !REMOTE_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
            return Err(Error::invalid_identifier(
                identifier,
                format!("unsupported URL scheme '{}'", scheme),
            ));
        }
        return Url::parse(identifier)
            .map_err(|e| Error::invalid_identifier(identifier, e.to_string()));
    }

    if let Some((user_host, path)) = identifier.split_once(':') {
        if user_host.contains('@') && !user_host.contains('/') {
            return Url::parse(&format!("ssh://{}/{}", user_host, path.trim_start_matches('/')))
                .map_err(|e| Error::invalid_identifier(identifier, e.to_string()));
        }
    }

    let segments: Vec<&str> = identifier.trim_end_matches('/').split('/').collect();
    let (host, owner, repo) = match segments.as_slice() {
        [owner, repo] => (default_host, *owner, *repo),
        [host, owner, repo] => (*host, *owner, *repo),
        _ => {
            return Err(Error::invalid_identifier(
                identifier,
                format!(
                    "expected [<host>/]<owner>/<repo> or a URL, got {} segment(s)",
                    segments.len()
                ),
            ))
        }
    };

    for segment in [host, owner, repo] {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains(|c: char| c.is_whitespace() || matches!(c, ':' | '@' | '?' | '#'))
        {
            return Err(Error::invalid_identifier(
                identifier,
                format!("invalid segment '{}'", segment),
            ));
        }
    }

    Url::parse(&format!("https://{}/{}/{}", host, owner, repo))
        .map_err(|e| Error::invalid_identifier(identifier, e.to_string()))
}
