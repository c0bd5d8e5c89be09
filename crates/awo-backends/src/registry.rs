use std::collections::BTreeMap;

use crate::local::LocalBackend;
use crate::types::Backend;

/// Backends available to one run, looked up by name. Built once per run and
/// handed to the engine; there is no process-wide registry.
#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `echo`, `upper` and `reverse`.
    pub fn with_local_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(LocalBackend::echo()));
        reg.register(Box::new(LocalBackend::upper()));
        reg.register(Box::new(LocalBackend::reverse()));
        reg
    }

    /// Replaces any backend already registered under the same name.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Backend> {
        self.backends.get(name).map(|b| b.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalTransform;

    #[test]
    fn defaults_are_registered() {
        let reg = BackendRegistry::with_local_defaults();
        for name in ["echo", "upper", "reverse"] {
            assert_eq!(reg.get(name).unwrap().name(), name);
        }
        assert!(reg.get("gpt").is_none());
    }

    #[test]
    fn register_overrides_by_name() {
        let mut reg = BackendRegistry::with_local_defaults();
        reg.register(Box::new(LocalBackend::new("echo", LocalTransform::Upper)));
        let out = reg.get("echo").unwrap().generate("abc", &Default::default());
        assert_eq!(out.text, "ABC");
    }
}
