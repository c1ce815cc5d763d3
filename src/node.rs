//! Declarative node input.
//!
//! Node trees arrive as loosely-shaped JSON: objects with `name`/`config`/`children`,
//! positional arrays, bare strings, and the odd `null` left behind by a transformer.
//! This module normalizes all of that into [`NodeInput`], an explicit tagged union,
//! before anything else looks at it.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::registry::ConfigCallback;

/// A node's configuration map.
pub type Config = Map<String, Value>;

/// One entry of a node array: either a node literal or a terminal text leaf.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum NodeInput {
    Literal(NodeLiteral),
    Text(String),
}

/// The named-field form of a node before hydration.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLiteral {
    pub name: String,
    pub config: Config,
    pub children: Vec<NodeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub theme_options: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub provides_context: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub uses_context: IndexMap<String, String>,
    /// Per-instance config callback, run after the registered one.
    #[serde(skip)]
    pub callback: Option<ConfigCallback>,
}

/// Loose truthiness test shared by every filtering step.
///
/// `null`, `false`, `0`, `""`, `"0"`, empty arrays and empty objects are falsy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => is_falsy_text(s),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

pub(crate) fn is_falsy_text(text: &str) -> bool {
    text.is_empty() || text == "0"
}

impl NodeInput {
    /// Normalize an arbitrary JSON value into a node.
    ///
    /// Returns `None` for falsy values, which callers drop silently.
    ///
    /// # Example
    /// ```
    /// use canopy::NodeInput;
    /// use serde_json::json;
    ///
    /// let node = NodeInput::from_value(json!({"name": "core/paragraph"})).unwrap();
    /// assert_eq!(node.name(), Some("core/paragraph"));
    ///
    /// assert!(NodeInput::from_value(json!(null)).is_none());
    /// ```
    pub fn from_value(value: Value) -> Option<Self> {
        if is_falsy(&value) {
            return None;
        }

        match value {
            Value::String(text) => Some(NodeInput::Text(text)),
            Value::Number(n) => Some(NodeInput::Text(n.to_string())),
            Value::Object(map) => Some(NodeInput::Literal(NodeLiteral::from_map(map))),
            Value::Array(items) => Some(NodeInput::Literal(NodeLiteral::from_positional(items))),
            Value::Bool(_) | Value::Null => None,
        }
    }

    /// Normalize a JSON value expected to hold a node array.
    ///
    /// Non-arrays yield an empty list; falsy entries are dropped.
    pub fn list_from_value(value: Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.into_iter().filter_map(Self::from_value).collect(),
            _ => Vec::new(),
        }
    }

    /// Shorthand for a literal with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        NodeInput::Literal(NodeLiteral::new(name))
    }

    /// The node's type name, or `None` for text leaves.
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeInput::Literal(literal) => Some(&literal.name),
            NodeInput::Text(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&NodeLiteral> {
        match self {
            NodeInput::Literal(literal) => Some(literal),
            NodeInput::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeInput::Text(_))
    }

    /// Text leaves that would be dropped by children filtering.
    pub fn is_falsy(&self) -> bool {
        match self {
            NodeInput::Text(text) => is_falsy_text(text),
            NodeInput::Literal(_) => false,
        }
    }

    /// Convert back into the literal JSON form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<NodeLiteral> for NodeInput {
    fn from(literal: NodeLiteral) -> Self {
        NodeInput::Literal(literal)
    }
}

impl From<&str> for NodeInput {
    fn from(text: &str) -> Self {
        NodeInput::Text(text.to_string())
    }
}

impl NodeLiteral {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_config_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_children(mut self, children: Vec<NodeInput>) -> Self {
        self.children = reset_inputs(children);
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_theme_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.theme_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn provides(mut self, context_key: impl Into<String>, config_key: impl Into<String>) -> Self {
        self.provides_context.insert(context_key.into(), config_key.into());
        self
    }

    pub fn uses(mut self, context_key: impl Into<String>, config_key: impl Into<String>) -> Self {
        self.uses_context.insert(context_key.into(), config_key.into());
        self
    }

    pub fn with_callback(mut self, callback: ConfigCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    fn from_map(mut map: Map<String, Value>) -> Self {
        let name = map.remove("name").map(coerce_string).unwrap_or_default();

        let mut config = match map.remove("config") {
            Some(Value::Object(config)) => config,
            _ => Config::new(),
        };

        let children = map
            .remove("children")
            .map(NodeInput::list_from_value)
            .unwrap_or_default();

        let mut theme = match map.remove("theme") {
            Some(Value::String(theme)) if !theme.is_empty() => Some(theme),
            _ => None,
        };
        let mut theme_options = take_either(&mut map, "themeOptions", "theme_options")
            .map(string_list)
            .unwrap_or_default();

        // A previously serialized node carries its theme inside config.
        if theme.is_none() {
            if let Some(Value::String(name)) = config.get("themeName") {
                theme = Some(name.clone());
            }
        }
        if theme_options.is_empty() {
            if let Some(options) = config.get("themeOptions") {
                theme_options = string_list(options.clone());
            }
        }
        config.remove("themeName");
        config.remove("themeOptions");

        let provides_context = take_either(&mut map, "providesContext", "provides_context")
            .map(string_map)
            .unwrap_or_default();
        let uses_context = take_either(&mut map, "usesContext", "uses_context")
            .map(string_map)
            .unwrap_or_default();

        Self {
            name,
            config,
            children,
            theme,
            theme_options,
            provides_context,
            uses_context,
            callback: None,
        }
    }

    /// `[name, config, children, theme]`
    fn from_positional(items: Vec<Value>) -> Self {
        let mut map = Map::new();
        for (key, value) in ["name", "config", "children", "theme"].into_iter().zip(items) {
            map.insert(key.to_string(), value);
        }
        Self::from_map(map)
    }
}

/// Drop falsy entries from an input sequence, keeping order.
pub fn reset_inputs(inputs: Vec<NodeInput>) -> Vec<NodeInput> {
    inputs.into_iter().filter(|input| !input.is_falsy()).collect()
}

/// `deserialize_with` helper for fields holding a node array.
pub fn deserialize_nodes<'de, D>(deserializer: D) -> Result<Vec<NodeInput>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(NodeInput::list_from_value(value))
}

impl<'de> Deserialize<'de> for NodeInput {
    /// Falsy values are rejected here; use [`deserialize_nodes`] for arrays
    /// where they should be dropped instead.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        NodeInput::from_value(value)
            .ok_or_else(|| serde::de::Error::custom("empty value is not a node"))
    }
}

fn coerce_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}

fn take_either(map: &mut Map<String, Value>, primary: &str, secondary: &str) -> Option<Value> {
    let first = map.remove(primary);
    let second = map.remove(secondary);
    first.or(second)
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    }
}

fn string_map(value: Value) -> IndexMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) if !s.is_empty() => Some((key, s)),
                _ => None,
            })
            .collect(),
        _ => IndexMap::new(),
    }
}
