//! Explicit configuration for template resolution and rendering
//!
//! A `ScaffoldConfig` is built once per invocation (usually from the
//! environment plus CLI overrides) and handed to the components that need it.
//! Nothing in the core reads configuration from ambient state on its own.

use crate::error::{Error, Result};
use crate::templates::engine::Delimiters;
use std::path::PathBuf;

/// Environment variable holding the template search path
pub const SEARCH_PATH_ENV: &str = "TPL_PATH";

/// Environment variable overriding the git cache root
pub const CACHE_DIR_ENV: &str = "TPL_CACHE_DIR";

/// Subdirectory of the user's cache location used for cloned templates
pub const CACHE_SUBDIR: &str = "tpl";

/// Host assumed for `owner/repo` shorthand
pub const DEFAULT_REMOTE_HOST: &str = "github.com";

/// Configuration shared by the resolver, git cache and renderer
#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    /// Directories searched for templates by identifier, in order
    pub search_path: Vec<PathBuf>,

    /// Root under which remote repositories are cached by host and path
    pub cache_root: PathBuf,

    /// Host used when a remote shorthand has only two segments
    pub default_host: String,

    /// Delimiters for path and content templates
    pub delimiters: Delimiters,

    /// Reuse cached repositories without fetching
    pub offline: bool,
}

impl ScaffoldConfig {
    /// Build a configuration from `TPL_PATH`, `TPL_CACHE_DIR` and the
    /// platform cache directory
    pub fn from_env() -> Result<Self> {
        let search_path = std::env::var_os(SEARCH_PATH_ENV)
            .map(|value| parse_search_path(&value))
            .unwrap_or_default();

        let cache_root = match std::env::var_os(CACHE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_cache_root()?,
        };

        Ok(Self::new(cache_root).with_search_path(search_path))
    }

    /// A configuration with the given cache root and defaults elsewhere
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            search_path: Vec::new(),
            cache_root: cache_root.into(),
            default_host: DEFAULT_REMOTE_HOST.to_string(),
            delimiters: Delimiters::default(),
            offline: false,
        }
    }

    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }
}

/// Split an OS path list (`:` on unix, `;` on windows), dropping empty entries
pub fn parse_search_path(value: &std::ffi::OsStr) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// `<user cache dir>/tpl`
pub fn default_cache_root() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_SUBDIR))
        .ok_or_else(|| Error::Config("unable to determine the user cache directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[cfg(unix)]
    #[test]
    fn test_parse_search_path_skips_empty_entries() {
        let paths = parse_search_path(OsStr::new("/a::/b:"));
        assert_eq!(paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_parse_search_path_empty() {
        assert!(parse_search_path(OsStr::new("")).is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ScaffoldConfig::new("/cache")
            .with_default_host("gitlab.com")
            .with_offline(true)
            .with_search_path(vec![PathBuf::from("/templates")]);

        assert_eq!(config.cache_root, PathBuf::from("/cache"));
        assert_eq!(config.default_host, "gitlab.com");
        assert!(config.offline);
        assert_eq!(config.search_path, vec![PathBuf::from("/templates")]);
        assert_eq!(config.delimiters, Delimiters::default());
    }

    #[test]
    fn test_default_cache_root_ends_with_subdir() {
        if let Ok(root) = default_cache_root() {
            assert!(root.ends_with(CACHE_SUBDIR));
        }
    }
}
