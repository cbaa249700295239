//! Plugin lifecycle events
//!
//! Events are transient: they are delivered synchronously to every registered
//! observer at the moment a descriptor changes state and are never stored.

use std::fmt;

use serde::Serialize;

/// What happened to a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEventKind {
    /// The plugin became active
    Activated,
    /// The plugin became inactive
    Deactivated,
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activated => write!(f, "plugin-activated"),
            Self::Deactivated => write!(f, "plugin-deactivated"),
        }
    }
}

/// A plugin lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    /// Plugin location
    pub location: String,
    /// State change
    pub kind: LifecycleEventKind,
}

impl LifecycleEvent {
    /// An `Activated` event for `location`
    #[must_use]
    pub fn activated(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            kind: LifecycleEventKind::Activated,
        }
    }

    /// A `Deactivated` event for `location`
    #[must_use]
    pub fn deactivated(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            kind: LifecycleEventKind::Deactivated,
        }
    }
}

type Observer = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Ordered list of lifecycle observers
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Observer>,
}

impl EventBus {
    /// Create a bus without observers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; observers are called in registration order
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Deliver `event` to every observer
    pub fn emit(&self, event: &LifecycleEvent) {
        tracing::debug!(location = %event.location, "emitting {}", event.kind);
        for observer in &self.observers {
            observer(event);
        }
    }

    /// Number of registered observers
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}
