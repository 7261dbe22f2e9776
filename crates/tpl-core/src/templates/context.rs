//! Render context exposed to path and content templates

use crate::error::{Error, IoResultExt, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Data available to templates during one render pass.
///
/// Built fresh for every invocation and passed explicitly; it is never
/// mutated while rendering.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Process environment (UTF-8 names and values only)
    pub env: BTreeMap<String, String>,

    /// Target project name
    pub name: String,

    /// Owning organization
    pub org: String,

    /// Extra top-level values, typically loaded from a YAML file
    pub values: BTreeMap<String, tera::Value>,
}

impl RenderContext {
    /// Empty context; mostly useful for tests and library callers
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the current process environment
    pub fn from_env() -> Self {
        Self {
            env: env_map(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = org.into();
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: tera::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Merge the top-level keys of a YAML mapping file into `values`.
    /// Mappings with non-string keys, at any depth, are a `Values` error.
    pub fn with_values_file(mut self, path: &Path) -> Result<Self> {
        let values_error = |message: String| Error::Values {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).at(path)?;
        let parsed: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&content).map_err(|e| values_error(e.to_string()))?;

        for (key, value) in parsed {
            let converted = tera::to_value(&value)
                .map_err(|e| values_error(format!("key '{}': {}", key, e)))?;
            self.values.insert(key, converted);
        }
        Ok(self)
    }

    /// Convert into a tera context. Extra values go in first so that
    /// `env`, `name` and `org` always win on key collisions.
    pub(crate) fn to_tera(&self) -> tera::Context {
        let mut ctx = tera::Context::new();
        for (key, value) in &self.values {
            ctx.insert(key.as_str(), value);
        }
        ctx.insert("env", &self.env);
        ctx.insert("name", &self.name);
        ctx.insert("org", &self.org);
        ctx
    }
}

/// Snapshot of the process environment, skipping non-UTF-8 entries
pub fn env_map() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
