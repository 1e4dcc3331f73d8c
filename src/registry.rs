//! Tool registry: the ordered, named set of capabilities the agent may call

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::types::OrchestratorError;

/// Executor behind a tool. The token is cancelled when the caller stops waiting.
pub type ToolExecutor =
    Arc<dyn Fn(&str, &CancellationToken) -> Result<String, String> + Send + Sync>;

/// A named, described capability mapping text input to text output
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    executor: ToolExecutor,
}

impl Tool {
    /// Create a tool from a plain executor function
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, executor: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            executor: Arc::new(move |input: &str, _: &CancellationToken| executor(input)),
        }
    }

    /// Create a tool whose executor observes cancellation
    pub fn cancellable<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        executor: F,
    ) -> Self
    where
        F: Fn(&str, &CancellationToken) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            executor: Arc::new(executor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the executor on the current thread
    pub fn execute(&self, input: &str) -> Result<String, String> {
        (self.executor)(input, &CancellationToken::new())
    }

    pub(crate) fn execute_with(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        (self.executor)(input, cancel)
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of tools with lookup by name.
///
/// Registration order is the order tools are shown to the model.
/// Once built, the registry is shared read-only behind an `Arc`.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; names must be unique
    pub fn register(&mut self, tool: Tool) -> Result<(), OrchestratorError> {
        if self.index.contains_key(tool.name()) {
            return Err(OrchestratorError::DuplicateTool(tool.name().to_string()));
        }
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    /// Register a tool executor function
    pub fn register_executor<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        executor: F,
    ) -> Result<(), OrchestratorError>
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.register(Tool::new(name, description, executor))
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_tool(mut self, tool: Tool) -> Result<Self, OrchestratorError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the catalog shown to the model, one `- name: description` line per tool
    pub fn render_catalog(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_executor("wikipedia_search", "Search Wikipedia.", |q| {
                Ok(format!("wiki:{}", q))
            })
            .unwrap();
        registry
            .register_executor("rag_search", "Search the local dataset.", |q| {
                Ok(format!("rag:{}", q))
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.render_catalog(), "");
    }

    #[test]
    fn test_lookup_resolves_every_name() {
        let registry = sample_registry();
        for name in registry.names() {
            let tool = registry.get(name).unwrap();
            assert_eq!(tool.name(), name);
        }
        assert!(registry.get("calculator").is_none());
        assert!(!registry.contains("calculator"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = sample_registry();
        let result = registry.register_executor("rag_search", "again", |_| Ok(String::new()));
        assert!(matches!(result, Err(OrchestratorError::DuplicateTool(name)) if name == "rag_search"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_catalog_keeps_registration_order() {
        let registry = sample_registry();
        assert_eq!(
            registry.render_catalog(),
            "- wikipedia_search: Search Wikipedia.\n- rag_search: Search the local dataset."
        );
    }

    #[test]
    fn test_tool_execute() {
        let registry = sample_registry();
        let tool = registry.get("rag_search").unwrap();
        assert_eq!(tool.execute("mars").unwrap(), "rag:mars");
    }

    #[test]
    fn test_cancellable_tool_sees_token() {
        let tool = Tool::cancellable("probe", "Reports cancellation.", |_, token| {
            Ok(token.is_cancelled().to_string())
        });
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(tool.execute_with("", &token).unwrap(), "true");
        assert_eq!(tool.execute("").unwrap(), "false");
    }
}
