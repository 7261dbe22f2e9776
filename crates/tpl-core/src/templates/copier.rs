//! Template tree rendering into a target directory
//!
//! Every relative path and every file's content is rendered with the same
//! engine and context. `.git` metadata is never copied.

use crate::error::{Error, IoResultExt, Result};
use crate::paths;
use crate::templates::context::RenderContext;
use crate::templates::engine::TemplateEngine;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// File name that stands in for [`MANIFEST_NAME`] inside template trees.
///
/// Cargo will not package a crate whose sources contain a nested
/// `Cargo.toml`, so templates shipped inside a crate store it under this name.
pub const MANIFEST_SENTINEL: &str = "_Cargo.toml";

/// Real name written for [`MANIFEST_SENTINEL`]
pub const MANIFEST_NAME: &str = "Cargo.toml";

const VCS_DIR: &str = ".git";

/// Render `source_dir` into `target_dir`, returning the rendered relative
/// paths of the files written, in walk order
pub fn copy_template(
    source_dir: &Path,
    target_dir: &Path,
    context: &RenderContext,
    engine: &TemplateEngine,
) -> Result<Vec<String>> {
    // Ensure target directory exists
    fs::create_dir_all(target_dir).at(target_dir)?;

    let tera_context = context.to_tera();
    let mut written = Vec::new();

    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_vcs_metadata(source_dir, entry));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_dir).to_path_buf();
            Error::io(path, e.into())
        })?;

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            warn!("Skipping symlink {}", entry.path().display());
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|_| Error::illegal_path(entry.path(), source_dir))?;
        let template_path = template_path(relative, file_type.is_dir());

        let rendered = engine.render_with(&template_path, &template_path, &tera_context)?;
        // an empty leading segment (`{{{ .org }}}/x` with no org) lands at the root
        let rendered = rendered.trim_start_matches('/').to_string();

        if file_type.is_dir() && rendered.is_empty() {
            debug!("  dir  {} -> (target root)", template_path);
            continue;
        }
        let dest = paths::contained_join(target_dir, &rendered)?;

        if file_type.is_dir() {
            debug!("  dir  {} -> {}", template_path, rendered);
            fs::create_dir_all(&dest).at(&dest)?;
            continue;
        }

        debug!("  file {} -> {}", template_path, rendered);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        let content = fs::read(entry.path()).at(entry.path())?;
        let output = match String::from_utf8(content) {
            Ok(text) => engine
                .render_with(&template_path, &text, &tera_context)?
                .into_bytes(),
            Err(binary) => {
                debug!("  {} is not UTF-8, copying verbatim", template_path);
                binary.into_bytes()
            }
        };

        fs::write(&dest, &output).at(&dest)?;
        let metadata = entry.metadata().map_err(|e| Error::io(entry.path(), e.into()))?;
        fs::set_permissions(&dest, owner_writable(metadata.permissions())).at(&dest)?;

        written.push(rendered);
    }

    info!(
        "Rendered {} file(s) from {} into {}",
        written.len(),
        source_dir.display(),
        target_dir.display()
    );

    Ok(written)
}

/// Source permissions plus owner write, so re-rendering can truncate the file
#[cfg(unix)]
fn owner_writable(permissions: fs::Permissions) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::Permissions::from_mode(permissions.mode() | 0o200)
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn owner_writable(mut permissions: fs::Permissions) -> fs::Permissions {
    permissions.set_readonly(false);
    permissions
}

/// `.git` as the first component of the relative path
fn is_vcs_metadata(source_dir: &Path, entry: &DirEntry) -> bool {
    entry
        .path()
        .strip_prefix(source_dir)
        .ok()
        .and_then(|rel| rel.components().next())
        .is_some_and(|first| first == Component::Normal(OsStr::new(VCS_DIR)))
}

/// Relative path as template text, `/`-separated, with the manifest
/// sentinel swapped for its real name
fn template_path(relative: &Path, is_dir: bool) -> String {
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if !is_dir {
        if let Some(last) = parts.last_mut() {
            if last == MANIFEST_SENTINEL {
                *last = MANIFEST_NAME.to_string();
            }
        }
    }

    parts.join("/")
}
