//! Typed transformer hooks.
//!
//! Transformers are plain closures `T -> T` subscribed to a [`HookId<T>`].
//! Publishing folds the payload through every transformer of that hook in
//! registration order, each receiving the previous one's output.
//!
//! Hooks are registered once at startup; the bus is read-only while
//! requests are served and can be shared behind an `Arc`.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::node::NodeInput;
use crate::runtime::pipeline::Redirect;

/// Name of a hook together with the payload type its transformers take.
pub struct HookId<T> {
    name: Cow<'static, str>,
    _payload: PhantomData<fn(T) -> T>,
}

impl<T> HookId<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _payload: PhantomData,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for HookId<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for HookId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookId").field(&self.name).finish()
    }
}

/// Fires for every node literal during traversal, before the named hook.
pub const ANY_NODE: HookId<NodeInput> = HookId::new("canopy/node");

/// Fires for node literals whose type name is exactly `name`.
pub fn node(name: &str) -> HookId<NodeInput> {
    HookId::named(format!("canopy/node/{}", name))
}

/// Fires for every serialized node, before the named hook.
pub const SERIALIZE: HookId<Value> = HookId::new("canopy/serialize");

/// Fires for serialized nodes whose type name is exactly `name`.
pub fn serialized(name: &str) -> HookId<Value> {
    HookId::named(format!("canopy/serialize/{}", name))
}

/// Filters the HTTP status of a rendered response.
pub const STATUS: HookId<u16> = HookId::new("canopy/status");

/// Filters the pending redirect of a rendered response.
pub const REDIRECT: HookId<Option<Redirect>> = HookId::new("canopy/redirect");

type Transformer<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Registry of transformer chains keyed by payload type and hook name.
#[derive(Default)]
pub struct HookBus {
    chains: HashMap<TypeId, HashMap<String, Vec<Box<dyn Any + Send + Sync>>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformer to a hook's chain.
    ///
    /// # Example
    ///
    /// ```
    /// use canopy::hooks::{HookBus, STATUS};
    ///
    /// let mut hooks = HookBus::new();
    /// hooks.subscribe(&STATUS, |status| if status == 404 { 410 } else { status });
    ///
    /// assert_eq!(hooks.publish(&STATUS, 404), 410);
    /// assert_eq!(hooks.publish(&STATUS, 200), 200);
    /// ```
    pub fn subscribe<T, F>(&mut self, hook: &HookId<T>, transformer: F)
    where
        T: 'static,
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let transformer: Transformer<T> = Box::new(transformer);
        self.chains
            .entry(TypeId::of::<T>())
            .or_default()
            .entry(hook.name().to_string())
            .or_default()
            .push(Box::new(transformer));
    }

    /// Run `payload` through the hook's chain and return the result.
    ///
    /// A hook with no subscribers returns the payload unchanged.
    pub fn publish<T: 'static>(&self, hook: &HookId<T>, payload: T) -> T {
        let Some(chain) = self
            .chains
            .get(&TypeId::of::<T>())
            .and_then(|by_name| by_name.get(hook.name()))
        else {
            return payload;
        };

        chain
            .iter()
            .filter_map(|entry| entry.downcast_ref::<Transformer<T>>())
            .fold(payload, |acc, transformer| transformer(acc))
    }

    pub fn has_subscribers<T: 'static>(&self, hook: &HookId<T>) -> bool {
        self.subscriber_count(hook) > 0
    }

    pub fn subscriber_count<T: 'static>(&self, hook: &HookId<T>) -> usize {
        self.chains
            .get(&TypeId::of::<T>())
            .and_then(|by_name| by_name.get(hook.name()))
            .map_or(0, Vec::len)
    }

    /// Total number of subscribed transformers across all hooks.
    pub fn len(&self) -> usize {
        self.chains
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.chains.values().flat_map(HashMap::keys).collect();
        names.sort();
        f.debug_struct("HookBus").field("hooks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chain_runs_in_registration_order() {
        let mut hooks = HookBus::new();
        let id: HookId<String> = HookId::new("test/order");

        hooks.subscribe(&id, |s: String| s + "a");
        hooks.subscribe(&id, |s: String| s + "b");
        hooks.subscribe(&id, |s: String| s + "c");

        assert_eq!(hooks.publish(&id, String::new()), "abc");
        assert_eq!(hooks.subscriber_count(&id), 3);
    }

    #[test]
    fn test_unsubscribed_hook_passes_through() {
        let hooks = HookBus::new();
        assert_eq!(hooks.publish(&SERIALIZE, json!({"a": 1})), json!({"a": 1}));
        assert!(!hooks.has_subscribers(&SERIALIZE));
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_same_name_different_payload_types_are_separate() {
        let mut hooks = HookBus::new();
        let as_number: HookId<u16> = HookId::new("test/shared");
        let as_text: HookId<String> = HookId::new("test/shared");

        hooks.subscribe(&as_number, |n| n + 1);

        assert_eq!(hooks.publish(&as_number, 1), 2);
        assert_eq!(hooks.publish(&as_text, "x".to_string()), "x");
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_named_hooks_are_scoped() {
        let mut hooks = HookBus::new();
        hooks.subscribe(&node("core/quote"), |_| NodeInput::Text("replaced".to_string()));

        let other = hooks.publish(&node("core/paragraph"), NodeInput::named("core/paragraph"));
        assert_eq!(other.name(), Some("core/paragraph"));

        let quote = hooks.publish(&node("core/quote"), NodeInput::named("core/quote"));
        assert!(quote.is_text());
    }
}
