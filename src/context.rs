//! Request-scoped context stack.
//!
//! Ancestors "provide" key/value pairs that descendants consume without the
//! values being threaded through every node. Each frame is a full, flattened
//! snapshot: pushing merges the new keys over a copy of the current top frame,
//! so lookups never walk more than one frame.
//!
//! A store must not be shared between requests; create one per traversal.

use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};

/// One merged snapshot of provided values: context key -> value.
pub type ContextFrame = Map<String, Value>;

/// LIFO stack of [`ContextFrame`]s.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    frames: Vec<ContextFrame>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key in the top frame.
    ///
    /// Returns `None` when the stack is empty, the key is absent, or the
    /// stored value is `null`.
    ///
    /// # Example
    /// ```
    /// use canopy::ContextStore;
    /// use serde_json::{json, Map};
    ///
    /// let mut store = ContextStore::new();
    /// let mut frame = Map::new();
    /// frame.insert("ns/foo".to_string(), json!("bar"));
    /// store.set(frame);
    ///
    /// assert_eq!(store.get("ns/foo"), Some(&json!("bar")));
    /// store.reset();
    /// assert_eq!(store.get("ns/foo"), None);
    /// ```
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(key))
            .filter(|value| !value.is_null())
    }

    /// Push `delta` merged over a copy of the current top frame.
    pub fn set(&mut self, delta: ContextFrame) {
        let mut merged = self.frames.last().cloned().unwrap_or_default();
        for (key, value) in delta {
            merged.insert(key, value);
        }
        self.frames.push(merged);
    }

    /// Pop the top frame. Popping an empty stack is a no-op.
    pub fn reset(&mut self) {
        self.frames.pop();
    }

    /// Number of frames currently pushed.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The current top frame, if any.
    pub fn current(&self) -> Option<&ContextFrame> {
        self.frames.last()
    }

    /// Push `delta` and return a guard that pops it when dropped.
    ///
    /// The guard dereferences to the store, so a subtree can be visited
    /// through it and the frame is released on every exit path.
    pub fn scope(&mut self, delta: ContextFrame) -> ContextScope<'_> {
        self.set(delta);
        ContextScope { store: self }
    }
}

/// Guard returned by [`ContextStore::scope`].
#[derive(Debug)]
pub struct ContextScope<'a> {
    store: &'a mut ContextStore,
}

impl Deref for ContextScope<'_> {
    type Target = ContextStore;

    fn deref(&self) -> &ContextStore {
        self.store
    }
}

impl DerefMut for ContextScope<'_> {
    fn deref_mut(&mut self) -> &mut ContextStore {
        self.store
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.store.reset();
    }
}
