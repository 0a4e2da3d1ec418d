use crate::function::Function;
use crate::traits::FunctionProvider;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Immutable table of the built-in functions, built on first use.
static BUILTINS: Lazy<FunctionRegistry> = Lazy::new(|| {
    let mut reg = FunctionRegistry::empty();
    crate::builtins::load_builtins(&mut reg);
    reg
});

/// Name → function table owned by one engine.
///
/// Lookups are case-insensitive; names are stored upper-case.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in functions.
    pub fn with_builtins() -> Self {
        BUILTINS.clone()
    }

    /// Add or replace a function.
    pub fn register(&mut self, f: Arc<dyn Function>) {
        self.functions.insert(f.name().to_ascii_uppercase(), f);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(&name.to_ascii_uppercase()).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionProvider for FunctionRegistry {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.get(name)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_case_insensitive() {
        let reg = FunctionRegistry::with_builtins();
        for name in ["SUM", "average", "Count", "MIN", "MAX", "IF", "TRANSPOSE", "sequence"] {
            assert!(reg.get(name).is_some(), "{name} missing");
        }
        assert!(reg.get("VLOOKUP").is_none());
    }

    #[test]
    fn registries_are_independent() {
        let mut a = FunctionRegistry::with_builtins();
        let b = FunctionRegistry::with_builtins();
        a.register(Arc::new(crate::builtins::math::SumFn));
        assert_eq!(a.len(), b.len());
        assert!(FunctionRegistry::empty().is_empty());
    }
}
