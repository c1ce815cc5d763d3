//! Hydrated node entity.
//!
//! A [`Component`] is built from a [`NodeLiteral`] in a fixed order: structural
//! defaults, config, schema defaults, theme, context, callbacks, and finally
//! its children, which are hydrated inside the context frame the node
//! provides (if any).

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::context::{ContextFrame, ContextStore};
use crate::node::{is_falsy, is_falsy_text, Config, NodeInput, NodeLiteral};
use crate::registry::{ConfigCallback, Registration, Registry, DEFAULT_THEME};
use crate::serialization::camel_case;

/// A hydrated child: a nested component or a terminal text leaf.
#[derive(Debug, Clone)]
pub enum Child {
    Node(Component),
    Text(String),
}

impl Child {
    pub fn as_node(&self) -> Option<&Component> {
        match self {
            Child::Node(node) => Some(node),
            Child::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Child::Text(text) => Some(text),
            Child::Node(_) => None,
        }
    }

    fn is_falsy(&self) -> bool {
        match self {
            Child::Text(text) => is_falsy_text(text),
            Child::Node(_) => false,
        }
    }
}

impl From<Component> for Child {
    fn from(node: Component) -> Self {
        Child::Node(node)
    }
}

/// Drop falsy children, keeping order with no gaps.
pub fn reset_children(children: Vec<Child>) -> Vec<Child> {
    children.into_iter().filter(|child| !child.is_falsy()).collect()
}

/// A typed, hydrated tree node.
#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) name: String,
    pub(crate) config: Config,
    pub(crate) children: Vec<Child>,
    pub(crate) pending_children: Vec<NodeInput>,
    pub(crate) theme: String,
    pub(crate) theme_options: IndexSet<String>,
    pub(crate) provides_context: IndexMap<String, String>,
    pub(crate) uses_context: IndexMap<String, String>,
    pub(crate) resolved_context: Config,
    pub(crate) registration: Option<Arc<Registration>>,
}

impl Component {
    /// A bare component with structural defaults and no registration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::new(),
            children: Vec::new(),
            pending_children: Vec::new(),
            theme: DEFAULT_THEME.to_string(),
            theme_options: IndexSet::from([DEFAULT_THEME.to_string()]),
            provides_context: IndexMap::new(),
            uses_context: IndexMap::new(),
            resolved_context: Config::new(),
            registration: None,
        }
    }

    /// Build a component and, recursively, its children.
    ///
    /// Returns `None` when the registration's visibility callback rejects the
    /// node. The context store is left at the depth it had on entry.
    ///
    /// # Example
    /// ```
    /// use canopy::{Component, ContextStore, NodeLiteral, Registry, RegistrationInput};
    /// use serde_json::json;
    ///
    /// let mut registry = Registry::new();
    /// registry.register("test/schema", RegistrationInput::new().field("testDefault", json!({"default": "default"})));
    ///
    /// let mut store = ContextStore::new();
    /// let node = Component::hydrate(NodeLiteral::new("test/schema"), &registry, &mut store).unwrap();
    /// assert_eq!(node.get_config("testDefault"), Some(&json!("default")));
    /// ```
    pub fn hydrate(literal: NodeLiteral, registry: &Registry, store: &mut ContextStore) -> Option<Self> {
        let NodeLiteral {
            name,
            config,
            children,
            theme,
            theme_options,
            provides_context,
            uses_context,
            callback,
        } = literal;

        let mut node = Component::new(name);
        node.registration = registry.resolve(&node.name);

        if let Some(registration) = &node.registration {
            node.theme = registration.default_theme.clone();
            node.theme_options = registration.theme_options.clone();
            node.provides_context = registration.provides_context.clone();
            node.uses_context = registration.uses_context.clone();
        }
        if !provides_context.is_empty() {
            node.provides_context = provides_context;
        }
        if !uses_context.is_empty() {
            node.uses_context = uses_context;
        }

        node.set_config(config);
        node.apply_schema();

        node.pending_children = children.into_iter().filter(|child| !child.is_falsy()).collect();

        node.set_theme_options(theme_options);
        if let Some(theme) = theme {
            node.set_theme(theme);
        }

        node.apply_context(store);
        node.run_config_callbacks(callback.as_ref());

        if !node.is_visible() {
            tracing::debug!("Node '{}' hidden by its visibility callback", node.name);
            return None;
        }

        let pending = std::mem::take(&mut node.pending_children);
        node.hydrate_children(pending, registry, store);
        Some(node)
    }

    /// Hydrate `inputs` as this node's children.
    ///
    /// When the node provides context, the frame is pushed for the duration
    /// of the descent and popped afterwards. The registered children callback
    /// runs on the hydrated result.
    pub fn hydrate_children(&mut self, inputs: Vec<NodeInput>, registry: &Registry, store: &mut ContextStore) {
        let children = if self.provides_context.is_empty() {
            hydrate_inputs(inputs, registry, store)
        } else {
            let mut scope = store.scope(self.provided_frame());
            hydrate_inputs(inputs, registry, &mut scope)
        };
        self.set_children(children);

        let callback = self
            .registration
            .as_ref()
            .and_then(|registration| registration.children_callback.clone());
        if let Some(callback) = callback {
            let children = callback.call(self.children.clone(), self);
            self.set_children(children);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn get_config(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Replace the whole config map.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Child literals accepted for this node but not hydrated yet.
    ///
    /// Populated while config and visibility callbacks run; empty once
    /// [`Component::hydrate`] has built the children.
    pub fn pending_children(&self) -> &[NodeInput] {
        &self.pending_children
    }

    /// Replace the children, dropping falsy entries.
    pub fn set_children(&mut self, children: Vec<Child>) {
        self.children = reset_children(children);
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Assign a theme if it is one of the node's theme options.
    ///
    /// Returns `false` and keeps the current theme otherwise.
    pub fn set_theme(&mut self, theme: impl Into<String>) -> bool {
        let theme = theme.into();
        if self.theme_options.contains(&theme) {
            self.theme = theme;
            true
        } else {
            tracing::debug!("Ignoring theme '{}' for '{}': not a theme option", theme, self.name);
            false
        }
    }

    pub fn theme_options(&self) -> &IndexSet<String> {
        &self.theme_options
    }

    /// Replace the theme options (deduplicated). An empty list is ignored.
    pub fn set_theme_options<I, S>(&mut self, options: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options: IndexSet<String> = options
            .into_iter()
            .map(Into::into)
            .filter(|option: &String| !option.is_empty())
            .collect();
        if !options.is_empty() {
            self.theme_options = options;
        }
    }

    /// Context values read at hydration time, keyed by context key.
    pub fn resolved_context(&self) -> &Config {
        &self.resolved_context
    }

    pub fn provides_context(&self) -> &IndexMap<String, String> {
        &self.provides_context
    }

    pub fn uses_context(&self) -> &IndexMap<String, String> {
        &self.uses_context
    }

    pub fn registration(&self) -> Option<&Arc<Registration>> {
        self.registration.as_ref()
    }

    /// Fill every schema key missing from config with its default.
    ///
    /// A key already present in its camelCase wire form counts as present.
    fn apply_schema(&mut self) {
        if let Some(registration) = &self.registration {
            for (key, field) in &registration.config_schema {
                if !self.config.contains_key(key) && !self.config.contains_key(&camel_case(key)) {
                    self.config.insert(key.clone(), field.default.clone());
                }
            }
        }
    }

    /// Read used context keys; a non-null context value only fills an empty
    /// local config value.
    fn apply_context(&mut self, store: &ContextStore) {
        for (context_key, config_key) in &self.uses_context {
            let value = store.get(context_key).cloned();
            self.resolved_context
                .insert(context_key.clone(), value.clone().unwrap_or(Value::Null));

            if let Some(value) = value {
                if self.config.get(config_key).map_or(true, is_falsy) {
                    self.config.insert(config_key.clone(), value);
                }
            }
        }
    }

    fn run_config_callbacks(&mut self, own: Option<&ConfigCallback>) {
        let registered = self
            .registration
            .as_ref()
            .and_then(|registration| registration.config_callback.clone());

        for callback in registered.iter().chain(own) {
            let config = callback.call(self.config.clone(), self);
            self.set_config(config);
        }
    }

    fn is_visible(&self) -> bool {
        match self
            .registration
            .as_ref()
            .and_then(|registration| registration.visibility_callback.as_ref())
        {
            Some(callback) => callback.call(self),
            None => true,
        }
    }

    fn provided_frame(&self) -> ContextFrame {
        self.provides_context
            .iter()
            .map(|(context_key, config_key)| {
                let value = self.config.get(config_key).cloned().unwrap_or(Value::Null);
                (context_key.clone(), value)
            })
            .collect()
    }
}

fn hydrate_inputs(inputs: Vec<NodeInput>, registry: &Registry, store: &mut ContextStore) -> Vec<Child> {
    inputs
        .into_iter()
        .filter_map(|input| match input {
            NodeInput::Text(text) => Some(Child::Text(text)),
            NodeInput::Literal(literal) => Component::hydrate(literal, registry, store).map(Child::Node),
        })
        .collect()
}
