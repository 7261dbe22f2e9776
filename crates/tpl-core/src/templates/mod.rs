//! Template resolution, unpacking and rendering
//!
//! This module provides:
//! - Archive extraction with path containment (`archive`)
//! - A clone-or-update cache for remote repositories (`git`)
//! - Identifier resolution across local paths, the search path and remotes (`fetcher`)
//! - The render context and delimiter-aware engine (`context`, `engine`)
//! - Tree rendering into a target directory (`copier`)

pub mod archive;
pub mod context;
pub mod copier;
pub mod engine;
pub mod fetcher;
pub mod git;

use crate::config::ScaffoldConfig;
use crate::error::Result;
use std::path::Path;
use tracing::info;

pub use archive::{extract, ArchiveFormat, ARCHIVE_SUFFIXES};
pub use context::RenderContext;
pub use copier::{copy_template, MANIFEST_NAME, MANIFEST_SENTINEL};
pub use engine::{Delimiters, TemplateEngine};
pub use fetcher::{parse_remote, SourceKind, TemplateFetcher, TemplateSource};
pub use git::GitCache;

/// Outcome of a full resolve-and-render run
#[derive(Debug, Clone)]
pub struct Generated {
    /// How the template was located
    pub kind: SourceKind,
    /// Path or URL the identifier resolved to
    pub location: String,
    /// Rendered relative paths of the files written
    pub files: Vec<String>,
}

/// Resolve `identifier` and render it into `target_dir`
pub fn generate(
    config: &ScaffoldConfig,
    identifier: &str,
    target_dir: &Path,
    context: &RenderContext,
) -> Result<Generated> {
    let fetcher = TemplateFetcher::from_config(config);
    let source = fetcher.resolve(identifier)?;
    info!(
        "Template '{}' resolved via {:?} ({})",
        identifier,
        source.kind(),
        source.location()
    );

    let engine = TemplateEngine::new(config.delimiters.clone());
    let files = copy_template(source.resolved_dir(), target_dir, context, &engine)?;

    Ok(Generated {
        kind: source.kind(),
        location: source.location().to_string(),
        files,
    })
}
