//! Policy factory registry.
//!
//! Scheduling policies are looked up by name when a mapping selects one for
//! a scheduler. The registry is an explicit value handed to the system for
//! one run, so different runs can offer different policy sets.
//!
//! # Example
//!
//! ```
//! use kpnsim::registry::PolicyRegistry;
//! use kpnsim::policies::Fifo;
//!
//! let mut registry = PolicyRegistry::new();
//! registry.register("MyFifo", || Box::new(Fifo::new()));
//!
//! let policy = registry.create("MyFifo").unwrap();
//! assert_eq!(policy.name(), "FIFO");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::policies::SchedulingPolicy;

/// Type alias for policy factory functions.
pub type PolicyFactory = Arc<dyn Fn() -> Box<dyn SchedulingPolicy> + Send + Sync>;

/// A registry of scheduling policy factories.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    factories: HashMap<String, PolicyFactory>,
}

impl PolicyRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a policy factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn SchedulingPolicy> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Creates a fresh policy instance.
    ///
    /// # Returns
    /// `Some(policy)` if `name` is registered, `None` otherwise
    pub fn create(&self, name: &str) -> Option<Box<dyn SchedulingPolicy>> {
        self.factories.get(name).map(|f| f())
    }

    /// Returns true if a policy is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered policy names in sorted order.
    pub fn policy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Unregisters a policy.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.policy_names())
            .finish()
    }
}

/// Creates a registry with the built-in policies.
///
/// Includes:
/// - `Dummy` - [`Dummy`](crate::policies::Dummy)
/// - `FIFO` - [`Fifo`](crate::policies::Fifo)
/// - `RoundRobin` - [`RoundRobin`](crate::policies::RoundRobin)
pub fn create_default_registry() -> PolicyRegistry {
    use crate::policies::{Dummy, Fifo, RoundRobin};

    let mut registry = PolicyRegistry::new();
    registry.register("Dummy", || Box::new(Dummy::new()));
    registry.register("FIFO", || Box::new(Fifo::new()));
    registry.register("RoundRobin", || Box::new(RoundRobin::new()));
    registry
}
