//! Bootstrap-only executor registry: written once during startup, read-only
//! thereafter. Also satisfies `castellan_graph::loader::ExecutorLookup` so
//! the graph loader can reject a definition that references an unregistered
//! executor at load time.

use std::collections::HashMap;
use std::sync::Arc;

use castellan_graph::loader::ExecutorLookup;

use crate::executor::Executor;

#[derive(Default)]
pub struct ExecutorRegistry {
    by_name: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.by_name.insert(executor.name().to_string(), executor);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.by_name.get(name).cloned()
    }
}

impl ExecutorLookup for ExecutorRegistry {
    fn is_registered(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorResponse;
    use async_trait::async_trait;
    use castellan_core::error::AuthError;

    struct Noop;
    #[async_trait]
    impl Executor for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        async fn execute(&self, _ctx: &crate::context::NodeContext) -> Result<ExecutorResponse, AuthError> {
            Ok(ExecutorResponse::complete())
        }
    }

    #[test]
    fn registers_and_resolves_by_name() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(Noop));
        assert!(registry.is_registered("noop"));
        assert!(!registry.is_registered("missing"));
        assert!(registry.lookup("noop").is_some());
    }
}
