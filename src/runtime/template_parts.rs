//! Template part resolution.
//!
//! A template part is a named fragment of nodes stored outside the request
//! payload and spliced into the tree where a `template-part/<slug>` node sits.

use std::fmt;
use std::fs;
use std::path::{Component as PathComponent, Path, PathBuf};

use serde_json::Value;

use crate::node::NodeInput;

/// Error type for template part loading
#[derive(Debug, Clone)]
pub enum TemplatePartError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl fmt::Display for TemplatePartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplatePartError::Io { path, message } => {
                write!(f, "Failed to read template part {}: {}", path.display(), message)
            }
            TemplatePartError::Parse { path, message } => {
                write!(f, "Failed to parse template part {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for TemplatePartError {}

/// A resolved fragment: one node or several siblings.
#[derive(Debug, Clone)]
pub enum TemplatePart {
    One(NodeInput),
    Many(Vec<NodeInput>),
}

impl TemplatePart {
    /// Parse a loaded document. Arrays become [`TemplatePart::Many`];
    /// a falsy document resolves to nothing.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(_) => Some(TemplatePart::Many(NodeInput::list_from_value(value))),
            other => NodeInput::from_value(other).map(TemplatePart::One),
        }
    }

    pub fn into_nodes(self) -> Vec<NodeInput> {
        match self {
            TemplatePart::One(node) => vec![node],
            TemplatePart::Many(nodes) => nodes,
        }
    }
}

/// Locates template parts by slug.
///
/// `Ok(None)` means the part does not exist and the referencing node passes
/// through unchanged; `Err` means it exists but could not be loaded.
pub trait TemplatePartResolver: Send + Sync {
    fn resolve(&self, slug: &str) -> Result<Option<TemplatePart>, TemplatePartError>;
}

impl<F> TemplatePartResolver for F
where
    F: Fn(&str) -> Result<Option<TemplatePart>, TemplatePartError> + Send + Sync,
{
    fn resolve(&self, slug: &str) -> Result<Option<TemplatePart>, TemplatePartError> {
        self(slug)
    }
}

/// Resolves `<root>/<slug>.json`, `.yaml` or `.yml`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, slug: &str) -> Option<PathBuf> {
        let relative = Path::new(slug);
        let safe = !slug.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, PathComponent::Normal(_)));
        if !safe {
            tracing::debug!("Rejecting template part slug '{}'", slug);
            return None;
        }

        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", slug, ext)))
            .find(|path| path.is_file())
    }
}

impl TemplatePartResolver for DirectoryResolver {
    fn resolve(&self, slug: &str) -> Result<Option<TemplatePart>, TemplatePartError> {
        let Some(path) = self.locate(slug) else {
            return Ok(None);
        };

        let contents = fs::read_to_string(&path).map_err(|e| TemplatePartError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let document: Value = if is_json {
            serde_json::from_str(&contents).map_err(|e| TemplatePartError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| TemplatePartError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?
        };

        tracing::debug!("Loaded template part '{}' from {}", slug, path.display());
        Ok(TemplatePart::from_value(document))
    }
}
