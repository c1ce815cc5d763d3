//! Node type registry.
//!
//! Maps a type name to its [`Registration`]: config schema, theme options,
//! provided/used context keys, optional callbacks, and an optional wire alias.
//! Registration happens once at startup; during requests the registry is only
//! read, so it can be shared behind an `Arc` without locking.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::component::{Child, Component};
use crate::node::Config;
use crate::serialization::camel_case;

/// Theme every node falls back to.
pub const DEFAULT_THEME: &str = "default";

/// Error type for registration file loading
#[derive(Debug, Clone)]
pub enum RegistryError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    MissingName { path: PathBuf },
    InvalidRegistration { path: PathBuf, message: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Io { path, message } => {
                write!(f, "Failed to read registration file {}: {}", path.display(), message)
            }
            RegistryError::Parse { path, message } => {
                write!(f, "Failed to parse registration file {}: {}", path.display(), message)
            }
            RegistryError::MissingName { path } => {
                write!(f, "Registration file {} has no 'name' field", path.display())
            }
            RegistryError::InvalidRegistration { path, message } => {
                write!(f, "Invalid registration in {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Shared, cloneable wrapper around a callback closure.
pub struct Callback<F: ?Sized>(Arc<F>);

impl<F: ?Sized> Clone for Callback<F> {
    fn clone(&self) -> Self {
        Callback(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// `(config, node) -> config`
pub type ConfigCallback = Callback<dyn Fn(Config, &Component) -> Config + Send + Sync>;
/// `(children, node) -> children`
pub type ChildrenCallback = Callback<dyn Fn(Vec<Child>, &Component) -> Vec<Child> + Send + Sync>;
/// `node -> visible?`
pub type VisibilityCallback = Callback<dyn Fn(&Component) -> bool + Send + Sync>;

impl Callback<dyn Fn(Config, &Component) -> Config + Send + Sync> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Config, &Component) -> Config + Send + Sync + 'static,
    {
        Callback(Arc::new(f))
    }

    pub fn call(&self, config: Config, node: &Component) -> Config {
        (self.0)(config, node)
    }
}

impl Callback<dyn Fn(Vec<Child>, &Component) -> Vec<Child> + Send + Sync> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Child>, &Component) -> Vec<Child> + Send + Sync + 'static,
    {
        Callback(Arc::new(f))
    }

    pub fn call(&self, children: Vec<Child>, node: &Component) -> Vec<Child> {
        (self.0)(children, node)
    }
}

impl Callback<dyn Fn(&Component) -> bool + Send + Sync> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Component) -> bool + Send + Sync + 'static,
    {
        Callback(Arc::new(f))
    }

    pub fn call(&self, node: &Component) -> bool {
        (self.0)(node)
    }
}

/// Declared type of a schema field. Informational; values are not coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Untyped,
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Unknown names map to [`FieldType::Untyped`].
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "integer" => FieldType::Integer,
            "boolean" | "bool" => FieldType::Boolean,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            _ => FieldType::Untyped,
        }
    }
}

/// A normalized config schema entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SchemaField {
    pub default: Value,
    pub hidden: bool,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl SchemaField {
    /// Normalize a raw schema entry.
    ///
    /// Objects carrying `default`, `hidden` or `type` are field specs; any
    /// other value is the default itself.
    pub fn from_value(raw: Value) -> Self {
        match raw {
            Value::Object(mut spec)
                if ["default", "hidden", "type"].iter().any(|key| spec.contains_key(*key)) =>
            {
                let default = spec.remove("default").unwrap_or(Value::Null);
                let hidden = spec
                    .remove("hidden")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let field_type = spec
                    .remove("type")
                    .and_then(|v| v.as_str().map(FieldType::parse))
                    .unwrap_or_default();
                Self {
                    default,
                    hidden,
                    field_type,
                }
            }
            other => Self {
                default: other,
                ..Self::default()
            },
        }
    }

    pub fn hidden(default: Value) -> Self {
        Self {
            default,
            hidden: true,
            field_type: FieldType::Untyped,
        }
    }
}

/// Registration as supplied by callers or definition files, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistrationInput {
    #[serde(alias = "config_schema", alias = "config")]
    pub config_schema: IndexMap<String, Value>,
    #[serde(alias = "theme_options")]
    pub theme_options: Vec<String>,
    #[serde(alias = "default_theme")]
    pub default_theme: Option<String>,
    #[serde(alias = "provides_context")]
    pub provides_context: IndexMap<String, String>,
    #[serde(alias = "uses_context")]
    pub uses_context: IndexMap<String, String>,
    pub alias: Option<String>,
    #[serde(skip)]
    pub config_callback: Option<ConfigCallback>,
    #[serde(skip)]
    pub children_callback: Option<ChildrenCallback>,
    #[serde(skip)]
    pub visibility_callback: Option<VisibilityCallback>,
}

impl RegistrationInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema entry in raw form (see [`SchemaField::from_value`]).
    pub fn field(mut self, key: impl Into<String>, raw: Value) -> Self {
        self.config_schema.insert(key.into(), raw);
        self
    }

    pub fn theme_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.theme_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_theme(mut self, theme: impl Into<String>) -> Self {
        self.default_theme = Some(theme.into());
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

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn on_config<F>(mut self, f: F) -> Self
    where
        F: Fn(Config, &Component) -> Config + Send + Sync + 'static,
    {
        self.config_callback = Some(ConfigCallback::new(f));
        self
    }

    pub fn on_children<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Child>, &Component) -> Vec<Child> + Send + Sync + 'static,
    {
        self.children_callback = Some(ChildrenCallback::new(f));
        self
    }

    pub fn visible_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&Component) -> bool + Send + Sync + 'static,
    {
        self.visibility_callback = Some(VisibilityCallback::new(f));
        self
    }
}

/// A stored, normalized registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub config_schema: IndexMap<String, SchemaField>,
    pub theme_options: IndexSet<String>,
    pub default_theme: String,
    pub provides_context: IndexMap<String, String>,
    pub uses_context: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip)]
    pub config_callback: Option<ConfigCallback>,
    #[serde(skip)]
    pub children_callback: Option<ChildrenCallback>,
    #[serde(skip)]
    pub visibility_callback: Option<VisibilityCallback>,
}

impl Registration {
    fn normalize(name: String, input: RegistrationInput) -> Self {
        let config_schema = input
            .config_schema
            .into_iter()
            .map(|(key, raw)| (key, SchemaField::from_value(raw)))
            .collect();

        let default_theme = input
            .default_theme
            .filter(|theme| !theme.is_empty())
            .unwrap_or_else(|| DEFAULT_THEME.to_string());

        let mut theme_options: IndexSet<String> = input
            .theme_options
            .into_iter()
            .filter(|option| !option.is_empty())
            .collect();
        if !theme_options.contains(&default_theme) {
            theme_options.shift_insert(0, default_theme.clone());
        }

        Self {
            name,
            config_schema,
            theme_options,
            default_theme,
            provides_context: input.provides_context,
            uses_context: input.uses_context,
            alias: input.alias.filter(|alias| !alias.is_empty()),
            config_callback: input.config_callback,
            children_callback: input.children_callback,
            visibility_callback: input.visibility_callback,
        }
    }

    /// Schema keys flagged `hidden`.
    pub fn hidden_keys(&self) -> impl Iterator<Item = &str> {
        self.config_schema
            .iter()
            .filter(|(_, field)| field.hidden)
            .map(|(key, _)| key.as_str())
    }

    pub fn has_callbacks(&self) -> bool {
        self.config_callback.is_some()
            || self.children_callback.is_some()
            || self.visibility_callback.is_some()
    }
}

/// Lookup table from type name to [`Registration`].
#[derive(Debug, Default)]
pub struct Registry {
    registrations: IndexMap<String, Arc<Registration>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite a registration.
    ///
    /// # Example
    ///
    /// ```
    /// use canopy::{Registry, RegistrationInput};
    /// use serde_json::json;
    ///
    /// let mut registry = Registry::new();
    /// registry.register(
    ///     "core/heading",
    ///     RegistrationInput::new().field("level", json!({"default": 2, "type": "integer"})),
    /// );
    ///
    /// let registration = registry.resolve("core/heading").unwrap();
    /// assert_eq!(registration.config_schema["level"].default, json!(2));
    /// ```
    pub fn register(&mut self, name: impl Into<String>, input: RegistrationInput) -> Arc<Registration> {
        let name = name.into();
        let registration = Arc::new(Registration::normalize(name.clone(), input));
        if self.registrations.insert(name.clone(), Arc::clone(&registration)).is_some() {
            tracing::debug!("Replaced registration for '{}'", name);
        } else {
            tracing::debug!("Registered node type '{}'", name);
        }
        registration
    }

    /// Remove a registration. Meant for test isolation.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<Registration>> {
        self.registrations.shift_remove(name)
    }

    /// Look up a registration; a miss is not an error.
    pub fn resolve(&self, name: &str) -> Option<Arc<Registration>> {
        self.registrations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.registrations.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Load one definition file, merge `overrides` over it, and register it.
    ///
    /// JSON is assumed unless the extension is `.yaml`/`.yml`.
    pub fn load_config_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        overrides: &Value,
    ) -> Result<Arc<Registration>, RegistryError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let definition: Value = if is_yaml(path) {
            serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&contents).map_err(|e| RegistryError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        let mut definition = canonical_keys(definition);
        deep_merge(&mut definition, &canonical_keys(overrides.clone()));

        let name = definition
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .ok_or_else(|| RegistryError::MissingName {
                path: path.to_path_buf(),
            })?;

        let input: RegistrationInput =
            serde_json::from_value(definition).map_err(|e| RegistryError::InvalidRegistration {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(self.register(name, input))
    }

    /// Like [`Registry::load_config_file`], reporting only success.
    pub fn register_from_config_file<P: AsRef<Path>>(&mut self, path: P, overrides: &Value) -> bool {
        match self.load_config_file(path, overrides) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Register every definition file found in `paths`.
    ///
    /// Entries are visited in sorted order; each `.json`, `.yaml` or `.yml`
    /// file is registered once or skipped. Returns the number registered.
    pub fn load_from_directory<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        let mut count = 0;

        for dir in paths {
            let dir = dir.as_ref();
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Failed to read registry directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.is_file() && is_definition_file(path))
                .collect();
            files.sort();

            for path in files {
                if self.register_from_config_file(&path, &Value::Null) {
                    count += 1;
                }
            }
        }

        tracing::info!("Loaded {} node registrations", count);
        count
    }
}

/// Recursively merge `overrides` into `base`; objects merge key by key,
/// anything else replaces. A `null` override leaves `base` untouched.
pub fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let nested = value.is_object() && base.get(key).is_some_and(Value::is_object);
                if nested {
                    if let Some(existing) = base.get_mut(key) {
                        deep_merge(existing, value);
                    }
                } else {
                    base.insert(key.clone(), value.clone());
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Rewrite the top-level keys of a definition to their camelCase field
/// names so that definitions and overrides merge whatever spelling each
/// uses. Colliding spellings are merged into one entry.
fn canonical_keys(value: Value) -> Value {
    let map = match value {
        Value::Object(map) => map,
        other => return other,
    };

    let mut canonical = Map::new();
    for (key, value) in map {
        let key = match key.as_str() {
            "config" | "config_schema" => "configSchema".to_string(),
            other => camel_case(other),
        };
        match canonical.get_mut(&key) {
            Some(existing) => deep_merge(existing, &value),
            None => {
                canonical.insert(key, value);
            }
        }
    }
    Value::Object(canonical)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json") | Some("yaml") | Some("yml")
    )
}
