use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::evaluator::Potential;
use crate::engine::lj::LennardJones;
use crate::error::SimError;

/// Maps model identifiers to shared, read-only evaluators.
///
/// The built-in "lj" entry is always present. Machine-learned potentials are
/// loaded by the host collaborator (model download and inference setup live
/// outside this crate) and registered here before any run references them;
/// resolution failures surface before the step loop starts.
pub struct PotentialRegistry {
    entries: RwLock<HashMap<String, Arc<dyn Potential>>>,
}

impl PotentialRegistry {
    pub fn with_builtins() -> Self {
        let registry = Self {
            entries: RwLock::new(HashMap::new()),
        };
        registry.register("lj", Arc::new(LennardJones::default()));
        registry
    }

    pub fn register(&self, id: &str, potential: Arc<dyn Potential>) {
        self.entries.write().insert(id.to_string(), potential);
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Potential>, SimError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SimError::PotentialUnavailable(id.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl Default for PotentialRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
