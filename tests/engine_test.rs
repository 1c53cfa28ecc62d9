//! End-to-end engine tests over in-memory pipes.

use async_trait::async_trait;
use jamfpro_mcp::mcp::handler::{get_string_arg, success_result, McpHandler, ToolHandler};
use jamfpro_mcp::mcp::protocol::{Tool, ToolResult};
use jamfpro_mcp::mcp::server::McpServer;
use jamfpro_mcp::mcp::transport::StreamTransport;
use jamfpro_mcp::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "echo".to_string(),
            description: "Echo the message back".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }),
        }
    }

    async fn execute(&self, args: HashMap<String, Value>) -> Result<ToolResult> {
        Ok(success_result(get_string_arg(&args, "message")?))
    }
}

/// Signals when it starts, then takes a while to answer.
struct SlowTool {
    started: Arc<Notify>,
}

#[async_trait]
impl ToolHandler for SlowTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "slow".to_string(),
            description: "Answer after a delay".to_string(),
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn execute(&self, _args: HashMap<String, Value>) -> Result<ToolResult> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(success_result("done"))
    }
}

struct Session {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    server: JoinHandle<Result<()>>,
    shutdown: CancellationToken,
    slow_started: Arc<Notify>,
}

impl Session {
    fn start() -> Self {
        let (input, server_in) = duplex(4096);
        let (server_out, output) = duplex(4096);

        let slow_started = Arc::new(Notify::new());
        let mut handler = McpHandler::new();
        handler.register(EchoTool);
        handler.register(SlowTool {
            started: slow_started.clone(),
        });
        let server = McpServer::new(handler, "engine-test");

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server = tokio::spawn(async move {
            server
                .run(StreamTransport::new(server_in, server_out), token)
                .await
        });

        Self {
            input,
            output: BufReader::new(output).lines(),
            server,
            shutdown,
            slow_started,
        }
    }

    async fn send(&mut self, line: &str) {
        self.input.write_all(line.as_bytes()).await.unwrap();
        self.input.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.output.next_line().await.unwrap().expect("reply");
        serde_json::from_str(&line).unwrap()
    }

    async fn roundtrip(&mut self, line: &str) -> Value {
        self.send(line).await;
        self.recv().await
    }

    async fn initialize(&mut self) {
        let reply = self
            .roundtrip(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#)
            .await;
        assert!(reply.get("result").is_some());
    }

    async fn finish(mut self) -> Result<()> {
        self.input.shutdown().await.unwrap();
        drop(self.input);
        let outcome = self.server.await.unwrap();
        assert!(self.output.next_line().await.unwrap().is_none());
        outcome
    }
}

#[tokio::test]
async fn test_echo_call() {
    let mut session = Session::start();
    session.initialize().await;

    let reply = session
        .roundtrip(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}}}"#,
        )
        .await;

    assert_eq!(
        reply,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "content": [{ "type": "text", "text": "hi" }],
                "isError": false
            }
        })
    );

    session.finish().await.unwrap();
}

#[tokio::test]
async fn test_missing_tool_then_ping() {
    let mut session = Session::start();
    session.initialize().await;

    let reply = session
        .roundtrip(r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"missing"}}"#)
        .await;
    assert_eq!(reply["id"], "a");
    assert_eq!(reply["error"]["code"], -32004);
    assert!(reply.get("result").is_none());

    let reply = session
        .roundtrip(r#"{"jsonrpc":"2.0","id":"b","method":"ping"}"#)
        .await;
    assert_eq!(reply["result"], json!({}));

    session.finish().await.unwrap();
}

#[tokio::test]
async fn test_invalid_arguments_become_tool_error() {
    let mut session = Session::start();
    session.initialize().await;

    let reply = session
        .roundtrip(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"message":7}}}"#,
        )
        .await;
    assert_eq!(reply["result"]["isError"], true);
    let text = reply["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error executing tool echo"));

    session.finish().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_enforced() {
    let mut session = Session::start();

    let reply = session
        .roundtrip(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .await;
    assert_eq!(reply["error"]["code"], -32603);

    let reply = session
        .roundtrip(r#"{"jsonrpc":"2.0","id":2,"method":"no/such/method"}"#)
        .await;
    assert_eq!(reply["error"]["code"], -32601);

    session.initialize().await;
    let reply = session
        .roundtrip(r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#)
        .await;
    assert_eq!(reply["result"]["tools"][0]["name"], "echo");

    session.finish().await.unwrap();
}

#[tokio::test]
async fn test_replies_in_request_order() {
    let mut session = Session::start();
    session.initialize().await;

    for id in 1..=5 {
        session
            .send(&format!(
                r#"{{"jsonrpc":"2.0","id":{},"method":"tools/call","params":{{"name":"echo","arguments":{{"message":"m{}"}}}}}}"#,
                id, id
            ))
            .await;
    }
    session
        .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;

    for id in 1..=5 {
        let reply = session.recv().await;
        assert_eq!(reply["id"], id);
        assert_eq!(reply["result"]["content"][0]["text"], format!("m{}", id));
    }

    session.finish().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_stops_server() {
    let session = Session::start();
    session.shutdown.cancel();

    let outcome = session.server.await.unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_cancellation_lets_running_call_finish() {
    let mut session = Session::start();
    session.initialize().await;

    session
        .send(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"slow"}}"#)
        .await;
    session
        .send(r#"{"jsonrpc":"2.0","id":8,"method":"ping"}"#)
        .await;

    session.slow_started.notified().await;
    session.shutdown.cancel();

    let reply = session.recv().await;
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"]["content"][0]["text"], "done");

    assert!(session.server.await.unwrap().is_ok());
    // The queued ping was never taken.
    assert!(session.output.next_line().await.unwrap().is_none());
}
