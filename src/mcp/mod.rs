//! Model Context Protocol (MCP) implementation.
//!
//! JSON-RPC 2.0 message handling over newline-delimited streams, with tool
//! and resource registries.
//!
//! # Architecture
//!
//! - `protocol` - Core MCP types and message definitions
//! - `codec` - Line decoding and envelope encoding
//! - `server` - Lifecycle and method dispatch
//! - `transport` - Stream transport (stdio, in-memory pipes)
//! - `handler` - Tool registry and argument helpers
//! - `resources` - File-backed resource provider
//! - `mime` - Content type detection for resources

pub mod codec;
pub mod handler;
pub mod mime;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod transport;

pub use handler::{McpHandler, ToolHandler};
pub use protocol::*;
pub use resources::{FileResourceProvider, ResourceProvider};
pub use server::McpServer;
pub use transport::{StdioTransport, StreamTransport, Transport};
