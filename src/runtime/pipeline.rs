//! Tree traversal, validation and response assembly.
//!
//! A request carries three independent top-level node arrays (`defaults`,
//! `page`, `providers`). Each is walked depth-first, pre-order:
//!
//! 1. template-part references are expanded in place (once per position),
//! 2. the global [`hooks::ANY_NODE`] chain runs,
//! 3. the name-scoped [`hooks::node`] chain runs,
//! 4. children are validated recursively.
//!
//! Text leaves short-circuit all of the above. Validated arrays are then
//! hydrated into [`Component`]s sharing one request-scoped [`ContextStore`],
//! and serialized into an [`Envelope`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::component::Component;
use crate::context::ContextStore;
use crate::hooks::{self, HookBus};
use crate::node::{deserialize_nodes, NodeInput, NodeLiteral};
use crate::registry::Registry;
use crate::runtime::query::QueryDescriptor;
use crate::runtime::template_parts::{TemplatePartError, TemplatePartResolver};
use crate::serialization::serialize_all;

/// Type name of the diagnostic node emitted when content fails to load.
pub const ERROR_NODE: &str = "canopy/error";

/// Type name of block-style template part references (`config.slug`).
pub const TEMPLATE_PART_NODE: &str = "core/template-part";

fn template_part_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^template-parts?/(?P<slug>[A-Za-z0-9_\-/.]+)$").expect("valid template part pattern")
    })
}

/// The slug referenced by a template-part node, if it is one.
pub fn template_part_slug(literal: &NodeLiteral) -> Option<String> {
    if literal.name == TEMPLATE_PART_NODE {
        return literal
            .config
            .get("slug")
            .and_then(Value::as_str)
            .filter(|slug| !slug.is_empty())
            .map(String::from);
    }

    template_part_pattern()
        .captures(&literal.name)
        .and_then(|captures| captures.name("slug"))
        .map(|slug| slug.as_str().to_string())
}

/// A pending redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub to: String,
    pub status: u16,
}

impl Redirect {
    pub const DEFAULT_STATUS: u16 = 302;

    pub fn new(to: impl Into<String>, status: u16) -> Self {
        Self { to: to.into(), status }
    }
}

/// Last-resort content used when a response would otherwise be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fallback {
    #[serde(deserialize_with = "deserialize_nodes")]
    pub welcome: Vec<NodeInput>,
    #[serde(alias = "not_found", deserialize_with = "deserialize_nodes")]
    pub not_found: Vec<NodeInput>,
}

impl Fallback {
    /// Generic welcome / no-results messages.
    pub fn standard() -> Self {
        let message = |title: &str, body: &str| {
            NodeInput::Literal(
                NodeLiteral::new("canopy/message")
                    .with_config_value("title", json!(title))
                    .with_config_value("message", json!(body)),
            )
        };

        Self {
            welcome: vec![message("Welcome", "There is no content here yet.")],
            not_found: vec![message("Nothing found", "No results matched this request.")],
        }
    }
}

/// Inbound request: three node arrays plus an optional redirect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(deserialize_with = "deserialize_nodes")]
    pub defaults: Vec<NodeInput>,
    #[serde(deserialize_with = "deserialize_nodes")]
    pub page: Vec<NodeInput>,
    #[serde(deserialize_with = "deserialize_nodes")]
    pub providers: Vec<NodeInput>,
    pub redirect_to: Option<String>,
    pub redirect_status: Option<u16>,
}

impl PageRequest {
    pub fn redirect(&self) -> Option<Redirect> {
        self.redirect_to
            .as_deref()
            .filter(|to| !to.is_empty())
            .map(|to| Redirect::new(to, self.redirect_status.unwrap_or(Redirect::DEFAULT_STATUS)))
    }
}

/// Serialized response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub defaults: Vec<Value>,
    pub page: Vec<Value>,
    pub providers: Vec<Value>,
    pub redirect_to: String,
    pub redirect_status: u16,
}

/// Envelope plus the HTTP status it should be sent with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse {
    pub status: u16,
    pub body: Envelope,
}

/// One traversal configuration: registry, hooks, and collaborators.
///
/// Cheap to build; construct one per request around shared boot-time state.
pub struct Pipeline<'a> {
    registry: &'a Registry,
    hooks: &'a HookBus,
    template_parts: Option<&'a dyn TemplatePartResolver>,
    fallback: Fallback,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a Registry, hooks: &'a HookBus) -> Self {
        Self {
            registry,
            hooks,
            template_parts: None,
            fallback: Fallback::default(),
        }
    }

    pub fn with_template_parts(mut self, resolver: &'a dyn TemplatePartResolver) -> Self {
        self.template_parts = Some(resolver);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Expand, transform and normalize a node array (steps 1–5).
    pub fn validate(&self, nodes: Vec<NodeInput>) -> Vec<NodeInput> {
        let mut validated = Vec::with_capacity(nodes.len());
        for node in nodes {
            for expanded in self.expand_template_part(node) {
                if let Some(node) = self.transform(expanded) {
                    validated.push(node);
                }
            }
        }
        validated
    }

    /// Hydrate a validated top-level array.
    ///
    /// Top-level text entries are dropped; top-level arrays hold nodes only.
    pub fn hydrate(&self, nodes: Vec<NodeInput>, store: &mut ContextStore) -> Vec<Component> {
        let depth = store.depth();

        let components = nodes
            .into_iter()
            .filter_map(|node| match node {
                NodeInput::Literal(literal) => Component::hydrate(literal, self.registry, store),
                NodeInput::Text(text) => {
                    tracing::debug!("Dropping top-level text leaf {:?}", text);
                    None
                }
            })
            .collect();

        debug_assert_eq!(store.depth(), depth, "context stack unbalanced after traversal");
        components
    }

    /// Validate then hydrate one top-level array.
    pub fn process(&self, nodes: Vec<NodeInput>, store: &mut ContextStore) -> Vec<Component> {
        let validated = self.validate(nodes);
        self.hydrate(validated, store)
    }

    /// Run a full request through the pipeline.
    pub fn render(&self, request: PageRequest, query: &dyn QueryDescriptor) -> PageResponse {
        let mut store = ContextStore::new();
        let redirect = self.hooks.publish(&hooks::REDIRECT, request.redirect());

        let mut defaults = self.process(request.defaults, &mut store);
        let mut page = self.process(request.page, &mut store);
        let mut providers = self.process(request.providers, &mut store);

        let not_found = query.is_not_found();

        if defaults.is_empty() && page.is_empty() && providers.is_empty() && redirect.is_none() {
            let fallback = if not_found {
                self.fallback.not_found.clone()
            } else {
                self.fallback.welcome.clone()
            };
            tracing::debug!("Empty response, using {} fallback node(s)", fallback.len());
            page = self.process(fallback, &mut store);
        }

        let status = self
            .hooks
            .publish(&hooks::STATUS, if not_found { 404 } else { 200 });

        let (redirect_to, redirect_status) = match redirect {
            Some(redirect) => (redirect.to, redirect.status),
            None => (String::new(), 0),
        };

        PageResponse {
            status,
            body: Envelope {
                defaults: serialize_all(&mut defaults, self.hooks),
                page: serialize_all(&mut page, self.hooks),
                providers: serialize_all(&mut providers, self.hooks),
                redirect_to,
                redirect_status,
            },
        }
    }

    /// Step 1. Expanded nodes are not checked again.
    fn expand_template_part(&self, node: NodeInput) -> Vec<NodeInput> {
        let (Some(resolver), NodeInput::Literal(literal)) = (self.template_parts, &node) else {
            return vec![node];
        };
        let Some(slug) = template_part_slug(literal) else {
            return vec![node];
        };

        match resolver.resolve(&slug) {
            Ok(Some(part)) => part.into_nodes(),
            Ok(None) => {
                tracing::debug!("Template part '{}' not found, passing node through", slug);
                vec![node]
            }
            Err(e) => {
                tracing::warn!("{}", e);
                vec![diagnostic_node(&slug, &e)]
            }
        }
    }

    /// Steps 2–5 for a single node.
    fn transform(&self, node: NodeInput) -> Option<NodeInput> {
        if node.is_text() {
            return (!node.is_falsy()).then_some(node);
        }

        let node = self.hooks.publish(&hooks::ANY_NODE, node);
        let node = match node {
            NodeInput::Literal(literal) if !literal.name.is_empty() => {
                let hook = hooks::node(&literal.name);
                self.hooks.publish(&hook, NodeInput::Literal(literal))
            }
            other => other,
        };

        match node {
            NodeInput::Text(_) => (!node.is_falsy()).then_some(node),
            NodeInput::Literal(mut literal) => {
                let children = std::mem::take(&mut literal.children);
                literal.children = self.validate(children);
                Some(NodeInput::Literal(literal))
            }
        }
    }
}

/// Node reported in place of content that failed to load.
pub fn diagnostic_node(slug: &str, error: &TemplatePartError) -> NodeInput {
    NodeInput::Literal(
        NodeLiteral::new(ERROR_NODE)
            .with_config_value("slug", json!(slug))
            .with_config_value("message", json!(error.to_string())),
    )
}
