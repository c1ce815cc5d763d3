//! Request-time orchestration around the node core.
//!
//! This module holds the traversal pipeline and the collaborator interfaces
//! it consumes (query descriptors, template part resolution), plus the
//! service configuration loader used by the binaries.

pub mod config_loader;
pub mod pipeline;
pub mod query;
pub mod template_parts;

// Re-export key types
pub use config_loader::{CanopyConfig, ConfigError};
pub use pipeline::{
    diagnostic_node, template_part_slug, Envelope, Fallback, PageRequest, PageResponse, Pipeline,
    Redirect, ERROR_NODE, TEMPLATE_PART_NODE,
};
pub use query::{QueryDescriptor, QueryState};
pub use template_parts::{DirectoryResolver, TemplatePart, TemplatePartError, TemplatePartResolver};
