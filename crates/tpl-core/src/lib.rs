//! tpl core - resolve a template tree and render it into a new project
//!
//! A template tree is a directory whose file names and file contents are
//! themselves templates. This crate finds such a tree from an identifier,
//! makes it available on local disk and renders it into a target directory.
//!
//! # Pipeline
//!
//! - **Resolution** (`templates::fetcher`) - local directory, local archive,
//!   search-path entry or archive, or remote git repository
//! - **Extraction** (`templates::archive`) - tar, tar.gz/tgz, tar.bz2, tar.xz
//!   and zip, with every entry confined to the destination root
//! - **Caching** (`templates::git`) - one clone per `(host, path)` under the
//!   cache root, fast-forwarded on reuse
//! - **Rendering** (`templates::copier`, `templates::engine`) - paths and
//!   contents rendered with custom delimiters against a `RenderContext`
//!
//! # Example Usage
//!
//! ```ignore
//! use tpl_core::{templates, RenderContext, ScaffoldConfig};
//!
//! let config = ScaffoldConfig::from_env()?;
//! let context = RenderContext::from_env().with_name("demo");
//! let generated = templates::generate(&config, "acme/rust-cli", "demo".as_ref(), &context)?;
//! println!("{} files", generated.files.len());
//! ```

pub mod config;
pub mod error;
pub mod paths;
pub mod templates;

// Re-export main types for convenience
pub use config::ScaffoldConfig;
pub use error::{Error, Result};
pub use templates::{
    copy_template, generate, Delimiters, Generated, GitCache, RenderContext, SourceKind,
    TemplateEngine, TemplateFetcher, TemplateSource,
};
