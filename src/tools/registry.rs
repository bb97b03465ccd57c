//! Process-wide tool registry, built once at startup.

use crate::error::CoreError;
use crate::tools::builtin;
use crate::tools::traits::{Tool, ToolDefinition};
use std::collections::BTreeMap;
use std::fmt;

/// A registered tool: its display metadata plus the handler.
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub handler: Box<dyn Tool>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Name → tool mapping. Read-only once constructed.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn builtin() -> Result<Self, CoreError> {
        let mut registry = Self::new();
        for tool in builtin::all() {
            registry.register_boxed(tool)?;
        }
        Ok(registry)
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), CoreError> {
        self.register_boxed(Box::new(tool))
    }

    pub fn register_boxed(&mut self, tool: Box<dyn Tool>) -> Result<(), CoreError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(CoreError::DuplicateTool(name));
        }
        let descriptor = ToolDescriptor {
            name: name.clone(),
            description: tool.description().to_string(),
            usage: tool.usage().to_string(),
            handler: tool,
        };
        self.tools.insert(name, descriptor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Case-insensitive lookup, used when matching typed input.
    pub fn lookup_ignore_case(&self, name: &str) -> Option<&ToolDescriptor> {
        self.lookup(name).or_else(|| {
            self.tools
                .values()
                .find(|d| d.name.eq_ignore_ascii_case(name))
        })
    }

    /// All descriptors ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function declarations for the model, ordered by name.
    pub fn declarations(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|d| ToolDefinition {
                name: d.name.clone(),
                description: d.description.clone(),
                parameters: d.handler.parameters_schema(),
            })
            .collect()
    }
}
