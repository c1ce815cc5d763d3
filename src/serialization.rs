//! Wire serialization for hydrated components.
//!
//! The remote renderer expects `{name, config, children}` objects with
//! camelCase config keys. Hidden schema fields stay present but are nulled.

use serde_json::{Map, Value};

use crate::component::{Child, Component};
use crate::hooks::{self, HookBus};

/// Convert a key to camelCase.
///
/// Splits on `-`, `_` and spaces, upper-cases the first character of each
/// fragment (the rest is kept as-is), joins, then lower-cases the first
/// character of the result.
///
/// # Example
/// ```
/// use canopy::serialization::camel_case;
///
/// assert_eq!(camel_case("some-config_key"), "someConfigKey");
/// assert_eq!(camel_case("someConfigKey"), "someConfigKey");
/// ```
pub fn camel_case(key: &str) -> String {
    let joined: String = key
        .split(['-', '_', ' '])
        .filter(|fragment| !fragment.is_empty())
        .map(upper_first)
        .collect();
    lower_first(&joined)
}

fn upper_first(fragment: &str) -> String {
    let mut chars = fragment.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// camelCase every object key in `value`, recursing through objects and arrays.
pub fn camel_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (camel_case(&key), camel_case_keys(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camel_case_keys).collect()),
        other => other,
    }
}

impl Component {
    /// Serialize to the wire shape.
    ///
    /// Hidden schema fields are nulled on this instance as a side effect, so
    /// once serialized they stay null. The [`hooks::SERIALIZE`] chain and then
    /// the name-scoped [`hooks::serialized`] chain filter the result.
    pub fn to_value(&mut self, hooks: &HookBus) -> Value {
        self.null_hidden_fields();

        let mut config = match camel_case_keys(Value::Object(self.config.clone())) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        // Other spellings of a hidden key fold onto the same wire key.
        for key in self.hidden_wire_keys() {
            config.insert(key, Value::Null);
        }
        config.insert("themeName".to_string(), Value::String(camel_case(&self.theme)));
        config.insert(
            "themeOptions".to_string(),
            Value::Array(
                self.theme_options
                    .iter()
                    .map(|option| Value::String(camel_case(option)))
                    .collect(),
            ),
        );

        let children: Vec<Value> = self
            .children
            .iter_mut()
            .map(|child| match child {
                Child::Node(node) => node.to_value(hooks),
                Child::Text(text) => Value::String(text.clone()),
            })
            .collect();

        let mut node = Map::new();
        node.insert("name".to_string(), Value::String(self.name.clone()));
        node.insert("config".to_string(), Value::Object(config));
        node.insert("children".to_string(), Value::Array(children));
        if let Some(alias) = self.registration.as_ref().and_then(|r| r.alias.as_ref()) {
            node.insert("_alias".to_string(), Value::String(alias.clone()));
        }

        let value = hooks.publish(&hooks::SERIALIZE, Value::Object(node));
        hooks.publish(&hooks::serialized(&self.name), value)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&mut self, hooks: &HookBus) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_value(hooks))
    }

    /// Null every config key whose wire form matches a hidden schema key.
    fn null_hidden_fields(&mut self) {
        let hidden = self.hidden_wire_keys();
        if hidden.is_empty() {
            return;
        }

        if let Some(registration) = &self.registration {
            for key in registration.hidden_keys() {
                self.config.insert(key.to_string(), Value::Null);
            }
        }
        for (key, value) in self.config.iter_mut() {
            if hidden.contains(&camel_case(key)) {
                *value = Value::Null;
            }
        }
    }

    fn hidden_wire_keys(&self) -> Vec<String> {
        self.registration
            .as_ref()
            .map(|registration| registration.hidden_keys().map(camel_case).collect())
            .unwrap_or_default()
    }
}

/// Serialize a list of top-level components.
pub fn serialize_all(nodes: &mut [Component], hooks: &HookBus) -> Vec<Value> {
    nodes.iter_mut().map(|node| node.to_value(hooks)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::node::{NodeInput, NodeLiteral};
    use crate::registry::{Registry, RegistrationInput};
    use serde_json::json;

    fn hydrate(registry: &Registry, value: Value) -> Component {
        let literal = match NodeInput::from_value(value) {
            Some(NodeInput::Literal(literal)) => literal,
            other => panic!("expected a literal, got {:?}", other),
        };
        Component::hydrate(literal, registry, &mut ContextStore::new()).unwrap()
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("some-config_key"), "someConfigKey");
        assert_eq!(camel_case("font size"), "fontSize");
        assert_eq!(camel_case("Title"), "title");
        assert_eq!(camel_case("__private"), "private");
        assert_eq!(camel_case("a--b"), "aB");
        assert_eq!(camel_case("url_HTTPS"), "urlHTTPS");
        assert_eq!(camel_case(""), "");
    }

    #[test]
    fn test_camel_case_is_idempotent() {
        for key in ["some-config_key", "alreadyCamel", "x", "dark-mode", "A_B_C", "trailing_"] {
            let once = camel_case(key);
            assert_eq!(camel_case(&once), once, "not idempotent for {}", key);
        }
    }

    #[test]
    fn test_camel_case_keys_recurses() {
        let value = camel_case_keys(json!({
            "outer_key": {"inner-key": 1},
            "list_items": [{"item_name": "a"}, "plain_string"]
        }));
        assert_eq!(
            value,
            json!({
                "outerKey": {"innerKey": 1},
                "listItems": [{"itemName": "a"}, "plain_string"]
            })
        );
    }

    #[test]
    fn test_wire_shape() {
        let registry = Registry::new();
        let mut node = hydrate(
            &registry,
            json!({"name": "core/group", "config": {"layout_type": "flex"}, "children": ["hi", {"name": "core/spacer"}]}),
        );

        let value = node.to_value(&HookBus::new());
        assert_eq!(
            value,
            json!({
                "name": "core/group",
                "config": {"layoutType": "flex", "themeName": "default", "themeOptions": ["default"]},
                "children": [
                    "hi",
                    {"name": "core/spacer", "config": {"themeName": "default", "themeOptions": ["default"]}, "children": []}
                ]
            })
        );
    }

    #[test]
    fn test_hidden_fields_are_nulled_but_present() {
        let mut registry = Registry::new();
        registry.register(
            "test/secret",
            RegistrationInput::new()
                .field("secret", json!({"hidden": true}))
                .field("api_token", json!({"hidden": true, "default": "t"})),
        );
        let mut node = hydrate(&registry, json!({"name": "test/secret", "config": {"secret": "value"}}));

        let value = node.to_value(&HookBus::new());
        let config = value["config"].as_object().unwrap();
        assert!(config.contains_key("secret"));
        assert_eq!(config["secret"], Value::Null);
        assert!(config.contains_key("apiToken"));
        assert_eq!(config["apiToken"], Value::Null);

        // One-way: the instance keeps the nulled value.
        assert_eq!(node.get_config("secret"), Some(&Value::Null));
        assert_eq!(node.to_value(&HookBus::new()), value);
    }

    #[test]
    fn test_hidden_field_nulls_every_spelling() {
        let mut registry = Registry::new();
        registry.register("test/secret", RegistrationInput::new().field("api_token", json!({"hidden": true})));
        let mut node = hydrate(
            &registry,
            json!({"name": "test/secret", "config": {"api_token": "a", "apiToken": "b", "api-token": "c"}}),
        );

        let value = node.to_value(&HookBus::new());
        assert_eq!(value["config"]["apiToken"], Value::Null);
        for key in ["api_token", "apiToken", "api-token"] {
            assert_eq!(node.get_config(key), Some(&Value::Null), "{} kept its value", key);
        }
    }

    #[test]
    fn test_theme_is_injected_in_camel_case() {
        let mut registry = Registry::new();
        registry.register(
            "test/themed",
            RegistrationInput::new().theme_options(["default", "dark-mode"]),
        );
        let mut node = hydrate(&registry, json!({"name": "test/themed", "theme": "dark-mode"}));

        let value = node.to_value(&HookBus::new());
        assert_eq!(value["config"]["themeName"], json!("darkMode"));
        assert_eq!(value["config"]["themeOptions"], json!(["default", "darkMode"]));
    }

    #[test]
    fn test_alias_is_emitted() {
        let mut registry = Registry::new();
        registry.register("core/heading", RegistrationInput::new().alias("heading"));
        let mut node = hydrate(&registry, json!({"name": "core/heading"}));

        let value = node.to_value(&HookBus::new());
        assert_eq!(value["name"], json!("core/heading"));
        assert_eq!(value["_alias"], json!("heading"));
    }

    #[test]
    fn test_serialize_hooks_fire_global_then_named() {
        let mut hooks = HookBus::new();
        hooks.subscribe(&hooks::SERIALIZE, |mut value: Value| {
            value["config"]["trail"] = json!("global");
            value
        });
        hooks.subscribe(&hooks::serialized("core/quote"), |mut value: Value| {
            let trail = value["config"]["trail"].as_str().unwrap_or_default().to_string();
            value["config"]["trail"] = json!(format!("{}>named", trail));
            value
        });

        let registry = Registry::new();
        let mut quote = Component::hydrate(NodeLiteral::new("core/quote"), &registry, &mut ContextStore::new()).unwrap();
        let mut other = Component::hydrate(NodeLiteral::new("core/other"), &registry, &mut ContextStore::new()).unwrap();

        assert_eq!(quote.to_value(&hooks)["config"]["trail"], json!("global>named"));
        assert_eq!(other.to_value(&hooks)["config"]["trail"], json!("global"));
    }

    #[test]
    fn test_round_trip_is_stable() {
        let mut registry = Registry::new();
        registry.register(
            "test/card",
            RegistrationInput::new()
                .field("title", json!({"default": "Untitled"}))
                .field("secret", json!({"hidden": true}))
                .theme_options(["default", "dark-mode"]),
        );
        let hooks = HookBus::new();

        let mut first = hydrate(
            &registry,
            json!({
                "name": "test/card",
                "theme": "dark-mode",
                "config": {"sub_title": "x", "secret": "s"},
                "children": ["text", {"name": "unregistered/leaf", "config": {"a_b": 1}}]
            }),
        );
        let once = first.to_value(&hooks);

        let mut second = hydrate(&registry, once.clone());
        let twice = second.to_value(&hooks);

        assert_eq!(once, twice);
    }
}
