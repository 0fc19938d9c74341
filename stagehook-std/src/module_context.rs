//! Per-request store of module contexts.
//!
//! Each module owns at most one context value per request. A value written
//! by a group becomes visible to the next group and to every later stage.
//!
//! Bidder stages run concurrently for different bidders, so each bidder gets
//! a [`fork`](ModuleContexts::fork) of the store. The fork remembers which
//! modules it wrote, and [`join`](ModuleContexts::join) carries only those
//! writes back.

use stagehook_core::ModuleContext;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Module code to context value.
#[derive(Clone, Default)]
pub struct ModuleContexts {
    values: HashMap<String, ModuleContext>,
    written: HashSet<String>,
}

impl ModuleContexts {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The context of `module_code`, if one was written.
    pub fn get(&self, module_code: &str) -> Option<&ModuleContext> {
        self.values.get(module_code)
    }

    /// The context of `module_code` downcast to `T`.
    pub fn get_as<T: Any>(&self, module_code: &str) -> Option<&T> {
        self.get(module_code)
            .and_then(|context| context.downcast_ref::<T>())
    }

    /// Replaces the context of `module_code`.
    pub fn merge(&mut self, module_code: impl Into<String>, context: ModuleContext) {
        let module_code = module_code.into();
        self.written.insert(module_code.clone());
        self.values.insert(module_code, context);
    }

    /// A branch seeded with the current values and no recorded writes.
    pub fn fork(&self) -> Self {
        Self {
            values: self.values.clone(),
            written: HashSet::new(),
        }
    }

    /// Applies the writes made on `branch`, last write wins.
    pub fn join(&mut self, mut branch: ModuleContexts) {
        for module_code in branch.written {
            if let Some(context) = branch.values.remove(&module_code) {
                self.merge(module_code, context);
            }
        }
    }

    /// Number of modules with a context.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no module wrote a context.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ModuleContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<_> = self.values.keys().collect();
        modules.sort();
        f.debug_struct("ModuleContexts")
            .field("modules", &modules)
            .finish()
    }
}
