//! # Canopy: typed node trees for remote renderers
//!
//! Canopy turns declarative arrays of `{name, config, children}` entries into
//! fully hydrated, schema-defaulted, context-aware component trees and
//! serializes them to the camelCase JSON a remote renderer consumes.
//!
//! ## Features
//!
//! - **Node registry**: map a type name to its config schema, theme options,
//!   provided/used context keys and callbacks
//! - **Context propagation**: ancestors provide values that descendants read
//!   without explicit threading, scoped to the provider's subtree
//! - **Typed transformer hooks**: global and name-scoped `T -> T` chains run in
//!   registration order
//! - **Template parts**: externally stored fragments spliced into the tree
//! - **Wire serialization**: camelCase keys, hidden fields present but nulled
//!
//! ## Example
//!
//! ```
//! use canopy::{HookBus, Pipeline, PageRequest, QueryState, Registry, RegistrationInput};
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     "core/post",
//!     RegistrationInput::new()
//!         .field("post_id", json!({"default": 0}))
//!         .provides("post/id", "post_id"),
//! );
//! registry.register("core/post-title", RegistrationInput::new().uses("post/id", "post_id"));
//!
//! let hooks = HookBus::new();
//! let request: PageRequest = serde_json::from_value(json!({
//!     "page": [{
//!         "name": "core/post",
//!         "config": {"post_id": 42},
//!         "children": [{"name": "core/post-title"}]
//!     }]
//! })).unwrap();
//!
//! let response = Pipeline::new(&registry, &hooks).render(request, &QueryState::default());
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body.page[0]["children"][0]["config"]["postId"], json!(42));
//! ```

// Core modules
pub mod component;
pub mod context;
pub mod hooks;
pub mod node;
pub mod registry;
pub mod serialization;

// Request-time traversal and collaborators
pub mod runtime;

// Re-export key types
pub use component::{Child, Component};
pub use context::{ContextFrame, ContextScope, ContextStore};
pub use hooks::{HookBus, HookId};
pub use node::{is_falsy, Config, NodeInput, NodeLiteral};
pub use registry::{
    ChildrenCallback, ConfigCallback, FieldType, Registration, RegistrationInput, Registry,
    RegistryError, SchemaField, VisibilityCallback,
};
pub use serialization::{camel_case, camel_case_keys};

// Re-export runtime types
pub use runtime::{
    CanopyConfig, DirectoryResolver, Envelope, Fallback, PageRequest, PageResponse, Pipeline,
    QueryDescriptor, QueryState, Redirect, TemplatePart, TemplatePartResolver,
};
