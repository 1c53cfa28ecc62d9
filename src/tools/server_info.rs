//! The `server-information` toolset.
//!
//! Needs no backend: it reports what this server is running and how much
//! traffic it has handled.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::mcp::handler::get_optional_string_arg;
use crate::mcp::protocol::{Tool, MCP_VERSION};
use crate::metrics::Metrics;
use crate::tools::Toolset;

pub const TOOLSET_NAME: &str = "server-information";

/// What got registered at startup, recorded once registration is finished.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub toolsets: Vec<String>,
    pub tool_count: usize,
    pub resource_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoReport<'a> {
    name: &'a str,
    version: &'a str,
    protocol_version: &'a str,
    instance_url: Option<&'a str>,
    uptime_seconds: u64,
    #[serde(flatten)]
    inventory: Inventory,
}

/// Reports server identity, registered tools and request counters.
pub struct ServerInfoToolset {
    name: String,
    version: String,
    instance_url: Option<String>,
    metrics: Arc<Metrics>,
    started: Instant,
    inventory: OnceLock<Inventory>,
}

impl ServerInfoToolset {
    pub fn new(name: impl Into<String>, version: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instance_url: None,
            metrics,
            started: Instant::now(),
            inventory: OnceLock::new(),
        }
    }

    /// Include the configured backend URL in reports.
    pub fn with_instance_url(mut self, url: Option<String>) -> Self {
        self.instance_url = url;
        self
    }

    /// Record the startup inventory. Only the first call has any effect.
    pub fn record_inventory(&self, inventory: Inventory) {
        if self.inventory.set(inventory).is_err() {
            tracing::debug!("Server inventory already recorded");
        }
    }

    fn server_info(&self) -> Result<String> {
        let report = ServerInfoReport {
            name: &self.name,
            version: &self.version,
            protocol_version: MCP_VERSION,
            instance_url: self.instance_url.as_deref(),
            uptime_seconds: self.started.elapsed().as_secs(),
            inventory: self.inventory.get().cloned().unwrap_or_default(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    fn server_metrics(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        match get_optional_string_arg(arguments, "format").as_deref() {
            None | Some("json") => Ok(serde_json::to_string_pretty(&self.metrics.snapshot())?),
            Some("prometheus") => Ok(self.metrics.to_prometheus()),
            Some(other) => Err(Error::InvalidParams(format!(
                "format must be \"json\" or \"prometheus\", got \"{}\"",
                other
            ))),
        }
    }
}

#[async_trait]
impl Toolset for ServerInfoToolset {
    fn name(&self) -> &str {
        TOOLSET_NAME
    }

    fn description(&self) -> &str {
        "Information about this MCP server and its activity"
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "get_server_info".to_string(),
                description: "Retrieve the server name, version, protocol version, enabled toolsets and registered tool count".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "get_server_metrics".to_string(),
                description: "Retrieve request, tool and resource counters for this server".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "format": {
                            "type": "string",
                            "enum": ["json", "prometheus"],
                            "description": "Output format (default: json)"
                        }
                    },
                    "required": []
                }),
            },
        ]
    }

    async fn execute_tool(&self, name: &str, arguments: HashMap<String, Value>) -> Result<String> {
        match name {
            "get_server_info" => self.server_info(),
            "get_server_metrics" => self.server_metrics(&arguments),
            other => Err(Error::ToolNotFound(other.to_string())),
        }
    }
}
