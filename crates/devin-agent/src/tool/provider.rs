//! Tool providers.
//!
//! A provider turns a [`ToolDependencies`] bundle into tools. Several
//! providers can contribute to one registry; priority decides who wins a name.

use std::sync::Arc;

use super::{Tool, ToolDependencies};

/// Source of tools.
pub trait ToolProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Higher priorities register first and win name collisions.
    fn priority(&self) -> i32 {
        0
    }

    /// Build this provider's tools over `deps`.
    fn provide(&self, deps: &ToolDependencies) -> Vec<Arc<dyn Tool>>;
}

/// Providers ordered by priority, highest first.
///
/// Equal priorities keep the order they were added in.
#[derive(Default, Clone)]
pub struct ProviderSet {
    providers: Vec<Arc<dyn ToolProvider>>,
}

impl ProviderSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider.
    pub fn add(&mut self, provider: impl ToolProvider + 'static) {
        self.add_arc(Arc::new(provider));
    }

    /// Add a shared provider.
    pub fn add_arc(&mut self, provider: Arc<dyn ToolProvider>) {
        self.providers.push(provider);
        // Vec::sort_by_key is stable.
        self.providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, provider: impl ToolProvider + 'static) -> Self {
        self.add(provider);
        self
    }

    /// Providers in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| (p.name(), p.priority())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::deps::{MemoryFileSystem, ScriptedShell};
    use crate::tool::{MockTool, ToolCategory, ToolRegistry};

    struct Fixed {
        name: &'static str,
        priority: i32,
        tools: Vec<(&'static str, ToolCategory)>,
    }

    impl ToolProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn provide(&self, _deps: &ToolDependencies) -> Vec<Arc<dyn Tool>> {
            self.tools
                .iter()
                .map(|(n, c)| Arc::new(MockTool::new(*n).with_category(*c)) as Arc<dyn Tool>)
                .collect()
        }
    }

    fn deps() -> ToolDependencies {
        ToolDependencies::new(
            Arc::new(MemoryFileSystem::new()),
            Arc::new(ScriptedShell::default()),
        )
    }

    #[test]
    fn test_priority_order_is_stable() {
        let set = ProviderSet::new()
            .with(Fixed { name: "low", priority: -1, tools: vec![] })
            .with(Fixed { name: "first", priority: 5, tools: vec![] })
            .with(Fixed { name: "second", priority: 5, tools: vec![] })
            .with(Fixed { name: "top", priority: 10, tools: vec![] });

        let order: Vec<&str> = set.iter().map(|p| p.name()).collect();
        assert_eq!(order, vec!["top", "first", "second", "low"]);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_higher_priority_wins_collision() {
        let set = ProviderSet::new()
            .with(Fixed {
                name: "builtin",
                priority: 0,
                tools: vec![("shell", ToolCategory::Execution), ("glob", ToolCategory::Search)],
            })
            .with(Fixed {
                name: "sandbox",
                priority: 10,
                tools: vec![("shell", ToolCategory::Other)],
            });

        let registry = ToolRegistry::from_providers(&set, &deps());
        assert_eq!(registry.names(), vec!["glob", "shell"]);
        assert_eq!(registry.get("shell").unwrap().category(), ToolCategory::Other);
    }

    #[test]
    fn test_equal_priority_first_added_wins() {
        let set = ProviderSet::new()
            .with(Fixed {
                name: "a",
                priority: 1,
                tools: vec![("x", ToolCategory::Network)],
            })
            .with(Fixed {
                name: "b",
                priority: 1,
                tools: vec![("x", ToolCategory::Search)],
            });

        let registry = ToolRegistry::from_providers(&set, &deps());
        assert_eq!(registry.get("x").unwrap().category(), ToolCategory::Network);
    }
}
