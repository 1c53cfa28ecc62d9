//! Jamf Pro MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server that exposes Jamf Pro device
//! management to AI tools over newline-delimited JSON-RPC on stdio.
//!
//! # Architecture
//!
//! 1. **MCP Layer** (`mcp`) - Protocol types, codec, lifecycle, transport
//! 2. **Tools Layer** (`tools`) - Toolsets registered into the handler
//! 3. **Ambient** (`config`, `error`, `metrics`) - Configuration, the error
//!    taxonomy and request counters

pub mod config;
pub mod error;
pub mod mcp;
pub mod metrics;
pub mod tools;

pub use error::{Error, Result};

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Instructions returned to clients in the `initialize` result.
pub const INSTRUCTIONS: &str = "This server provides access to Jamf Pro APIs for managing Apple devices, \
mobile devices, policies, scripts, configuration profiles, and more. Use the available tools to \
interact with your Jamf Pro environment. Authentication is handled automatically based on the \
server configuration.";
