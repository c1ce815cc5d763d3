//! Integration tests for loading node registrations from definition files

use canopy::{CanopyConfig, ContextStore, Component, NodeLiteral, Registry};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, file: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(file);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_register_json_definition() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "card.json",
        r#"{
            "name": "site/card",
            "configSchema": {
                "title": {"default": "Untitled"},
                "apiKey": {"default": "", "hidden": true}
            },
            "themeOptions": ["compact"],
            "providesContext": {"card/title": "title"}
        }"#,
    );

    let mut registry = Registry::new();
    assert!(registry.register_from_config_file(&path, &Value::Null));

    let registration = registry.resolve("site/card").unwrap();
    assert_eq!(registration.config_schema.len(), 2);
    assert_eq!(registration.hidden_keys().collect::<Vec<_>>(), vec!["apiKey"]);
    assert!(registration.theme_options.contains("default"));
    assert!(registration.theme_options.contains("compact"));
    assert_eq!(registration.provides_context.get("card/title").map(String::as_str), Some("title"));
}

#[test]
fn test_register_yaml_definition() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "quote.yaml",
        "name: site/quote\nconfig_schema:\n  cite: anonymous\nuses_context:\n  post/author: cite\nalias: quote\n",
    );

    let mut registry = Registry::new();
    assert!(registry.register_from_config_file(&path, &Value::Null));

    let registration = registry.resolve("site/quote").unwrap();
    assert_eq!(registration.config_schema["cite"].default, json!("anonymous"));
    assert_eq!(registration.alias.as_deref(), Some("quote"));

    let node = Component::hydrate(NodeLiteral::new("site/quote"), &registry, &mut ContextStore::new()).unwrap();
    assert_eq!(node.get_config("cite"), Some(&json!("anonymous")));
}

#[test]
fn test_overrides_are_deep_merged() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "banner.json",
        r#"{"name": "site/banner", "configSchema": {"text": {"default": "Hi"}, "tone": {"default": "info"}}}"#,
    );

    let mut registry = Registry::new();
    let overrides = json!({"configSchema": {"tone": {"default": "warning"}}, "alias": "banner"});
    let registration = registry.load_config_file(&path, &overrides).unwrap();

    assert_eq!(registration.config_schema["text"].default, json!("Hi"));
    assert_eq!(registration.config_schema["tone"].default, json!("warning"));
    assert_eq!(registration.alias.as_deref(), Some("banner"));
}

#[test]
fn test_overrides_merge_across_key_spellings() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "embed.yaml",
        "name: core/embed\nconfig_schema:\n  url: \"\"\n  api_token:\n    default: \"\"\n    hidden: true\ntheme_options:\n  - full-width\n",
    );

    let mut registry = Registry::new();
    let overrides = json!({
        "configSchema": {"url": {"default": "https://example.com"}},
        "themeOptions": ["wide"],
        "default_theme": "wide"
    });
    let registration = registry.load_config_file(&path, &overrides).unwrap();

    assert_eq!(registration.config_schema["url"].default, json!("https://example.com"));
    assert!(registration.config_schema["api_token"].hidden);
    assert_eq!(registration.default_theme, "wide");
    assert!(registration.theme_options.contains("wide"));
    assert!(!registration.theme_options.contains("full-width"));
}

#[test]
fn test_override_can_supply_the_name() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "anonymous.json", r#"{"configSchema": {"a": 1}}"#);

    let mut registry = Registry::new();
    assert!(!registry.register_from_config_file(&path, &Value::Null));
    assert!(registry.register_from_config_file(&path, &json!({"name": "site/named"})));
    assert!(registry.contains("site/named"));
}

#[test]
fn test_unusable_definitions_are_rejected() {
    let dir = TempDir::new().unwrap();
    let broken = write(&dir, "broken.json", "{ not json");
    let nameless = write(&dir, "nameless.yaml", "configSchema:\n  a: 1\n");

    let mut registry = Registry::new();
    assert!(!registry.register_from_config_file(dir.path().join("missing.json"), &Value::Null));
    assert!(!registry.register_from_config_file(&broken, &Value::Null));
    assert!(!registry.register_from_config_file(&nameless, &Value::Null));
    assert!(registry.is_empty());
}

#[test]
fn test_load_from_directory() {
    let dir = TempDir::new().unwrap();
    write(&dir, "b.json", r#"{"name": "site/b"}"#);
    write(&dir, "a.yml", "name: site/a\n");
    write(&dir, "c.yaml", "name: site/c\n");
    write(&dir, "notes.txt", "name: site/ignored\n");
    write(&dir, "bad.json", "[");
    fs::create_dir(dir.path().join("nested.json")).unwrap();

    let mut registry = Registry::new();
    let count = registry.load_from_directory(&[dir.path()]);

    assert_eq!(count, 3);
    assert_eq!(registry.names(), vec!["site/a", "site/b", "site/c"]);
}

#[test]
fn test_missing_directory_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(&dir, "one.json", r#"{"name": "site/one"}"#);

    let mut registry = Registry::new();
    let count = registry.load_from_directory(&[dir.path().join("absent"), dir.path().to_path_buf()]);

    assert_eq!(count, 1);
    assert!(registry.contains("site/one"));
}

#[test]
fn test_config_builds_registry() {
    let nodes = TempDir::new().unwrap();
    write(&nodes, "hero.json", r#"{"name": "site/hero", "configSchema": {"heading": "Welcome"}}"#);

    let root = TempDir::new().unwrap();
    let config_path = write(
        &root,
        "canopy.yaml",
        &format!("port: 9100\nregistry_dirs:\n  - {}\n", nodes.path().display()),
    );

    let config = CanopyConfig::from_file(&config_path).unwrap();
    assert_eq!(config.port, 9100);

    let registry = config.build_registry();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.resolve("site/hero").unwrap().config_schema["heading"].default, json!("Welcome"));
}
