//! Tool registry: tool name to a factory bound to a user identity.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::tool::{Tool, UserId};
use super::types::ToolDefinition;

/// Builds a tool instance scoped to one user.
pub type ToolFactory = Arc<dyn Fn(&UserId) -> Arc<dyn Tool> + Send + Sync>;

/// Registry constructed at startup and shared by reference.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    factories: BTreeMap<String, ToolFactory>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-user factory under `name`. A later registration with
    /// the same name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&UserId) -> Arc<dyn Tool> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            tracing::warn!(tool = %name, "tool registration replaced");
        }
        self
    }

    /// Register a tool that does not depend on the calling user.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        self.register(name, move |_user: &UserId| tool.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate `name` for `user`.
    pub fn get(&self, name: &str, user: &UserId) -> Option<Arc<dyn Tool>> {
        self.factories.get(name).map(|factory| factory(user))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Definitions for the requested names, in request order. Unknown names
    /// are skipped.
    pub fn definitions(&self, names: &[String], user: &UserId) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| {
                let tool = self.get(name, user);
                if tool.is_none() {
                    tracing::warn!(tool = %name, "requested tool is not registered");
                }
                tool
            })
            .map(|tool| tool.definition())
            .collect()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
