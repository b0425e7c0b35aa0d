//! Process-wide registry of named circuit breakers.
//!
//! Spec.md §9 calls for explicit registration rather than an ambient
//! singleton: callers hold an `Arc<CircuitBreakerRegistry>` and look up or
//! create breakers by name, so breaker lifetime is tied to whoever owns
//! the registry rather than to hidden global state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker named `config.name`, creating it with `config`
    /// on first use. Subsequent calls with the same name ignore `config`
    /// and return the already-registered breaker.
    pub fn get_or_create(&self, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(&config.name) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write();
        breakers
            .entry(config.name.clone())
            .or_insert_with(|| CircuitBreaker::shared(config))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_same_instance_for_a_name() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.get_or_create(CircuitBreakerConfig::default_preset("svc"));
        let b = registry.get_or_create(CircuitBreakerConfig::sensitive("svc"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "svc");
    }

    #[test]
    fn distinct_names_get_distinct_breakers() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.get_or_create(CircuitBreakerConfig::default_preset("a"));
        let b = registry.get_or_create(CircuitBreakerConfig::default_preset("b"));
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
