//! Toolsets: named groups of tools registered into the MCP handler.
//!
//! - `descriptions` - operator overrides for tool descriptions
//! - `server_info` - the built-in `server-information` toolset
//!
//! A [`Toolset`] exposes its tool descriptors and executes calls by tool name.
//! [`ToolsetFactory`] builds toolsets by name so the enabled set can come from
//! configuration.

pub mod descriptions;
pub mod server_info;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mcp::handler::{success_result, McpHandler, ToolHandler};
use crate::mcp::protocol::{Tool, ToolResult};

pub use descriptions::DescriptionOverrides;

/// Toolset name that expands to every registered toolset.
pub const ALL_TOOLSETS: &str = "all";

/// A named collection of related tools.
#[async_trait]
pub trait Toolset: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Descriptors for every tool in this toolset.
    fn tools(&self) -> Vec<Tool>;

    /// Execute one of this toolset's tools, returning its textual result.
    async fn execute_tool(&self, name: &str, arguments: HashMap<String, Value>) -> Result<String>;
}

/// Binds one descriptor to the toolset that serves it.
pub struct ToolsetTool {
    toolset: Arc<dyn Toolset>,
    descriptor: Tool,
}

impl ToolsetTool {
    pub fn new(toolset: Arc<dyn Toolset>, descriptor: Tool) -> Self {
        Self {
            toolset,
            descriptor,
        }
    }
}

#[async_trait]
impl ToolHandler for ToolsetTool {
    fn definition(&self) -> Tool {
        self.descriptor.clone()
    }

    async fn execute(&self, arguments: HashMap<String, Value>) -> Result<ToolResult> {
        debug!(
            "Executing tool {} from toolset {}",
            self.descriptor.name,
            self.toolset.name()
        );
        let text = self
            .toolset
            .execute_tool(&self.descriptor.name, arguments)
            .await?;
        Ok(success_result(text))
    }
}

/// Register every tool of `toolset`, applying description overrides.
///
/// Returns the number of tools registered.
pub fn register_toolset(
    handler: &mut McpHandler,
    toolset: Arc<dyn Toolset>,
    overrides: &DescriptionOverrides,
) -> usize {
    let tools = toolset.tools();
    let count = tools.len();

    for mut tool in tools {
        if overrides.apply(&mut tool) {
            debug!("Applied description override for {}", tool.name);
        }
        debug!("Registered tool {} ({})", tool.name, toolset.name());
        let adapter = ToolsetTool::new(toolset.clone(), tool.clone());
        handler.register_tool(tool, Arc::new(adapter));
    }

    count
}

type Constructor = Box<dyn Fn() -> Result<Arc<dyn Toolset>> + Send + Sync>;

/// Builds toolsets by name.
#[derive(Default)]
pub struct ToolsetFactory {
    constructors: BTreeMap<String, Constructor>,
}

impl ToolsetFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn Toolset>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Known toolset names, sorted.
    pub fn available(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Toolset>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::UnknownToolset(name.to_string()))?;
        constructor()
    }

    /// Expand `all` and drop duplicates, keeping first-seen order.
    pub fn resolve_enabled<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        if names.iter().any(|n| n.as_ref() == ALL_TOOLSETS) {
            return self.available();
        }

        let mut resolved: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !resolved.iter().any(|r| r == name) {
                resolved.push(name.to_string());
            }
        }
        resolved
    }

    /// Check every name is `all` or a known toolset.
    pub fn validate<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref().trim();
            if name != ALL_TOOLSETS && !self.constructors.contains_key(name) {
                return Err(Error::UnknownToolset(name.to_string()));
            }
        }
        Ok(())
    }

    /// Create and register each enabled toolset.
    ///
    /// Toolsets that fail to build are logged and skipped. Returns the names of
    /// the toolsets that were registered.
    pub fn register_enabled<S: AsRef<str>>(
        &self,
        handler: &mut McpHandler,
        names: &[S],
        overrides: &DescriptionOverrides,
    ) -> Vec<String> {
        let mut registered = Vec::new();

        for name in self.resolve_enabled(names) {
            match self.create(&name) {
                Ok(toolset) => {
                    let count = register_toolset(handler, toolset, overrides);
                    debug!("Toolset {} registered {} tools", name, count);
                    registered.push(name);
                }
                Err(e) => warn!("Failed to create toolset {}: {}", name, e),
            }
        }

        info!(
            "Toolset initialization complete: {} toolsets, {} tools",
            registered.len(),
            handler.tool_count()
        );
        registered
    }
}
