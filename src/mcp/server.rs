//! MCP server implementation.
//!
//! The engine owns the tool registry and an optional resource provider. It is
//! driven one line at a time, either directly through [`McpServer::handle_line`]
//! or by [`McpServer::run`] over a [`Transport`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mcp::codec;
use crate::mcp::handler::{error_result, McpHandler};
use crate::mcp::protocol::*;
use crate::mcp::resources::{ListResourcesResult, ReadResourceResult, ResourceProvider};
use crate::mcp::transport::Transport;
use crate::metrics::{Metrics, Timer};
use crate::VERSION;

/// Methods the engine answers. Everything else is `MethodNotFound`.
const METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
];

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Uninitialized,
    Initialized,
}

/// What the client told us about itself during `initialize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSession {
    pub client_info: Option<ClientInfo>,
    pub protocol_version: Option<String>,
}

/// MCP server.
pub struct McpServer {
    handler: Arc<McpHandler>,
    resources: Option<Arc<dyn ResourceProvider>>,
    metrics: Arc<Metrics>,
    name: String,
    version: String,
    instructions: Option<String>,
    state: RwLock<ServerState>,
    session: RwLock<ClientSession>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(handler: McpHandler, name: impl Into<String>) -> Self {
        Self {
            handler: Arc::new(handler),
            resources: None,
            metrics: Metrics::new(),
            name: name.into(),
            version: VERSION.to_string(),
            instructions: None,
            state: RwLock::new(ServerState::Uninitialized),
            session: RwLock::new(ClientSession::default()),
        }
    }

    /// Serve resources from the given provider.
    pub fn with_resources(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(provider);
        self
    }

    /// Share a metrics collector with other components.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Free-text usage hints returned from `initialize`.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Client details captured from the last `initialize`.
    pub async fn session(&self) -> ClientSession {
        self.session.read().await.clone()
    }

    /// Run the server with the given transport until input ends or `shutdown` fires.
    ///
    /// Lines are handled strictly in order; a line's reply is queued before the
    /// next line is taken. A request already being handled when `shutdown`
    /// fires runs to completion.
    pub async fn run<T: Transport>(
        &self,
        mut transport: T,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.name, self.version);

        let (mut incoming, outgoing) = transport.start().await?;
        let outcome = self.serve(&mut incoming, &outgoing, &shutdown).await;

        drop(outgoing);
        drop(incoming);
        let stopped = transport.stop().await;

        match &outcome {
            Ok(()) => info!("MCP server stopped"),
            Err(e) => error!("MCP server stopped with error: {}", e),
        }
        outcome.and(stopped)
    }

    async fn serve(
        &self,
        incoming: &mut mpsc::Receiver<std::io::Result<String>>,
        outgoing: &mpsc::Sender<String>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                _ = outgoing.closed() => {
                    return Err(Error::Transport("output closed".to_string()));
                }
                next = incoming.recv() => next,
            };

            let line = match next {
                None => {
                    debug!("Input closed");
                    return Ok(());
                }
                Some(Err(e)) => return Err(Error::Io(e)),
                Some(Ok(line)) => line,
            };

            if let Some(reply) = self.handle_line(&line).await {
                outgoing
                    .send(reply)
                    .await
                    .map_err(|_| Error::Transport("output closed".to_string()))?;
            }
        }
    }

    /// Decode and dispatch one line, returning the encoded reply if one is owed.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let message = match codec::decode(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Rejected input line: {}", e.error.message);
                self.metrics.inc_parse_errors();
                return Some(encode_reply(e.into_response()));
            }
        };

        match message {
            Message::Request(req) => self.handle_request(req).await.map(encode_reply),
            Message::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            Message::Response(resp) => {
                warn!("Ignoring unexpected response from client (id: {:?})", resp.id);
                None
            }
        }
    }

    /// Handle a JSON-RPC request.
    ///
    /// Returns `None` for notification method names, which never get a reply
    /// even when the client attached an id.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if NOTIFICATION_METHODS.contains(&req.method.as_str()) {
            self.handle_notification(JsonRpcNotification {
                jsonrpc: req.jsonrpc,
                method: req.method,
                params: req.params,
            })
            .await;
            return None;
        }

        debug!("Handling request: {} (id: {})", req.method, req.id);
        self.metrics.inc_requests();

        match self.dispatch(&req.method, req.params).await {
            Ok(value) => Some(JsonRpcResponse::success(Some(req.id), value)),
            Err(e) => {
                debug!("Request {} failed: {}", req.id, e);
                self.metrics.inc_failed();
                Some(JsonRpcResponse::failure(Some(req.id), e.to_rpc_error()))
            }
        }
    }

    /// Handle a notification.
    async fn handle_notification(&self, notif: JsonRpcNotification) {
        self.metrics.inc_notifications();
        match notif.method.as_str() {
            "initialized" | "notifications/initialized" => {
                info!("Client initialized");
            }
            other => {
                debug!("Ignoring notification: {}", other);
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if method == "initialize" {
            return self.handle_initialize(params).await;
        }
        if !METHODS.contains(&method) {
            return Err(Error::MethodNotFound(method.to_string()));
        }
        if self.state().await != ServerState::Initialized {
            return Err(Error::NotInitialized {
                method: method.to_string(),
            });
        }

        match method {
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(params).await,
            "resources/list" => self.handle_list_resources().await,
            "resources/read" => self.handle_read_resource(params).await,
            _ => Err(Error::MethodNotFound(method.to_string())),
        }
    }

    /// Handle initialize request.
    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(value) => decode_params(value)?,
            None => InitializeParams::default(),
        };

        if let Some(requested) = params.protocol_version.as_deref() {
            if requested != MCP_VERSION {
                info!(
                    "Client requested protocol {}, answering with {}",
                    requested, MCP_VERSION
                );
            }
        }
        if let Some(client) = &params.client_info {
            info!("Client connected: {} {}", client.name, client.version);
        }

        *self.session.write().await = ClientSession {
            client_info: params.client_info,
            protocol_version: params.protocol_version,
        };
        *self.state.write().await = ServerState::Initialized;

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: true }),
                resources: Some(ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                }),
                logging: Some(LoggingCapability {}),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
            instructions: self.instructions.clone(),
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request.
    fn handle_list_tools(&self) -> Result<Value> {
        let mut tools = self.handler.list_tools();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }

    /// Handle call tool request.
    ///
    /// Handler failures, including panics, come back as `isError` results so the
    /// client can see and react to them.
    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = decode_params(require_params(params)?)?;
        let name = params.name;

        let handler = self
            .handler
            .get_tool(&name)
            .ok_or_else(|| Error::ToolNotFound(name.clone()))?;

        let timer = Timer::start();
        let arguments = params.arguments;
        let outcome = tokio::spawn(async move { handler.execute(arguments).await }).await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Tool {} failed: {}", name, e);
                error_result(format!("Error executing tool {}: {}", name, e))
            }
            Err(join_err) => {
                error!("Tool {} aborted: {}", name, join_err);
                let reason = if join_err.is_panic() {
                    "handler panicked"
                } else {
                    "handler was cancelled"
                };
                error_result(format!("Error executing tool {}: {}", name, reason))
            }
        };

        self.metrics.record_tool_call(result.is_error);
        debug!("Tool {} finished in {}ms", name, timer.elapsed_ms());

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list resources request.
    async fn handle_list_resources(&self) -> Result<Value> {
        let resources = match &self.resources {
            Some(provider) => provider.list_resources().await?,
            None => Vec::new(),
        };

        Ok(serde_json::to_value(ListResourcesResult {
            resources,
            next_cursor: None,
        })?)
    }

    /// Handle read resource request.
    async fn handle_read_resource(&self, params: Option<Value>) -> Result<Value> {
        let params: ReadResourceParams = decode_params(require_params(params)?)?;

        let provider = self
            .resources
            .as_ref()
            .ok_or_else(|| Error::ResourceNotFound(params.uri.clone()))?;

        let contents = provider.read_resource(&params.uri).await?;
        self.metrics.inc_resource_reads();

        Ok(serde_json::to_value(ReadResourceResult {
            contents: vec![contents],
        })?)
    }
}

fn require_params(params: Option<Value>) -> Result<Value> {
    params.ok_or_else(|| Error::InvalidParams("missing params".to_string()))
}

fn decode_params<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::InvalidParams(e.to_string()))
}

/// Encode a reply, degrading to an internal error if the payload cannot be encoded.
fn encode_reply(response: JsonRpcResponse) -> String {
    match codec::encode_response(&response) {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to encode response: {}", e);
            let fallback = JsonRpcResponse::failure(
                response.id,
                JsonRpcError::new(ErrorCode::InternalError, "failed to encode response"),
            );
            codec::encode_response(&fallback).unwrap_or_else(|_| {
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"failed to encode response"}}"#
                    .to_string()
            })
        }
    }
}
