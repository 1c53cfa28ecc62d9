//! Tool description overrides.
//!
//! Operators can replace the description a tool advertises without rebuilding:
//! a JSON file of `TOOL_<NAME>_DESCRIPTION` keys, overridden in turn by
//! environment variables with the `JAMF_MCP_` prefix.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::mcp::protocol::Tool;

/// File consulted when no other path is configured.
pub const DEFAULT_DESCRIPTIONS_FILE: &str = "jamfpro-mcp-server-config.json";

/// Prefix for environment overrides, e.g. `JAMF_MCP_TOOL_GET_SERVER_INFO_DESCRIPTION`.
pub const ENV_PREFIX: &str = "JAMF_MCP_";

/// Override key for a tool name.
pub fn key_for(tool_name: &str) -> String {
    format!(
        "TOOL_{}_DESCRIPTION",
        tool_name.to_ascii_uppercase().replace('-', "_")
    )
}

/// Resolved description overrides, keyed by override key.
#[derive(Debug, Clone, Default)]
pub struct DescriptionOverrides {
    overrides: HashMap<String, String>,
}

impl DescriptionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `path` and the process environment.
    pub fn load(path: &Path) -> Self {
        Self::from_sources(read_file(path), std::env::vars())
    }

    /// Merge file values with environment variables; the environment wins.
    ///
    /// Only environment variables carrying [`ENV_PREFIX`] are considered.
    pub fn from_sources<I>(file: HashMap<String, String>, env: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides = file;
        for (name, value) in env {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                if key.starts_with("TOOL_") && key.ends_with("_DESCRIPTION") {
                    overrides.insert(key.to_string(), value);
                }
            }
        }
        Self { overrides }
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Override for a tool, if any.
    pub fn get(&self, tool_name: &str) -> Option<&str> {
        self.overrides.get(&key_for(tool_name)).map(String::as_str)
    }

    /// Replace the tool's description when an override exists.
    pub fn apply(&self, tool: &mut Tool) -> bool {
        match self.get(&tool.name) {
            Some(description) if !description.is_empty() => {
                tool.description = description.to_string();
                true
            }
            _ => false,
        }
    }
}

/// Read an overrides file. A missing file yields no overrides; a malformed one
/// is logged and ignored.
pub fn read_file(path: &Path) -> HashMap<String, String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No description overrides at {}", path.display());
            return HashMap::new();
        }
        Err(e) => {
            warn!("Failed to read description overrides {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(map) => map,
        Err(e) => {
            warn!("Ignoring malformed description overrides {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

/// Write the descriptions for `tools` to `path` as pretty JSON.
///
/// Values already present in the file are kept, so an edited file survives a
/// re-export. Returns the number of keys written.
pub fn export(path: &Path, tools: &[Tool]) -> Result<usize> {
    let mut merged: BTreeMap<String, String> = tools
        .iter()
        .map(|tool| (key_for(&tool.name), tool.description.clone()))
        .collect();
    merged.extend(read_file(path));

    let json = serde_json::to_string_pretty(&merged)?;
    std::fs::write(path, json)?;
    Ok(merged.len())
}
