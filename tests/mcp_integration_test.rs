//! MCP Server Integration Tests
//!
//! These tests spawn the server binary and talk JSON-RPC to it over real
//! stdin/stdout pipes.

#![allow(deprecated)] // Allow deprecated cargo_bin for now

use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use tempfile::TempDir;

const BIN: &str = "jamfpro-mcp-server";

/// Environment that would otherwise leak into the spawned server.
const SCRUBBED_ENV: &[&str] = &[
    "RUST_LOG",
    "JAMFPRO_URL",
    "JAMFPRO_AUTH_METHOD",
    "JAMF_MCP_CONFIG",
    "JAMF_MCP_TOOLSETS",
    "JAMF_MCP_RESOURCE_DIRS",
];

/// MCP Test Client that communicates with the server via stdio
struct McpTestClient {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    request_id: i64,
}

impl McpTestClient {
    /// Spawn the server with `workspace` as its working directory and resource root.
    fn spawn(workspace: &TempDir) -> Result<Self, Box<dyn std::error::Error>> {
        let config = workspace.path().join("config.yaml");
        std::fs::write(&config, "{}\n")?;

        let mut command = Command::cargo_bin(BIN)?;
        for var in SCRUBBED_ENV {
            command.env_remove(var);
        }
        let mut child = command
            .current_dir(workspace.path())
            .arg("--config")
            .arg(&config)
            .arg("--resource-root")
            .arg(workspace.path())
            .arg("--descriptions-file")
            .arg(workspace.path().join("descriptions.json"))
            .arg("--log-level")
            .arg("debug")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take().ok_or("server stdin not captured")?;
        let stdout = BufReader::new(child.stdout.take().ok_or("server stdout not captured")?);

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
            request_id: 0,
        })
    }

    fn send_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        let stdin = self.stdin.as_mut().ok_or("stdin already closed")?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Value, Box<dyn std::error::Error>> {
        let mut response_line = String::new();
        if self.stdout.read_line(&mut response_line)? == 0 {
            return Err("server closed stdout".into());
        }
        Ok(serde_json::from_str(&response_line)?)
    }

    /// Send a JSON-RPC request and get the response
    fn request(&mut self, method: &str, params: Value) -> Result<Value, Box<dyn std::error::Error>> {
        self.request_id += 1;
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id,
            "method": method,
            "params": params
        });

        self.send_line(&serde_json::to_string(&request)?)?;
        self.read_response()
    }

    fn initialize(&mut self) -> Result<Value, Box<dyn std::error::Error>> {
        self.request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0.0" }
            }),
        )
    }

    fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, Box<dyn std::error::Error>> {
        self.request("tools/call", json!({ "name": name, "arguments": arguments }))
    }

    /// Close stdin and wait for the server to exit.
    fn close(&mut self) -> std::io::Result<ExitStatus> {
        drop(self.stdin.take());
        self.child.wait()
    }
}

impl Drop for McpTestClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn create_test_workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("scripts")).expect("Failed to create scripts dir");
    std::fs::write(
        dir.path().join("scripts").join("inventory.sh"),
        "#!/bin/sh\n/usr/local/bin/jamf recon\n",
    )
    .expect("Failed to write inventory.sh");
    dir
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_binary_help() {
    AssertCommand::cargo_bin(BIN)
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MCP server"))
        .stdout(predicate::str::contains("--toolsets"));
}

#[test]
fn test_binary_version() {
    AssertCommand::cargo_bin(BIN)
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(BIN));
}

#[test]
fn test_unknown_toolset_rejected() {
    let workspace = create_test_workspace();
    AssertCommand::cargo_bin(BIN)
        .unwrap()
        .current_dir(workspace.path())
        .env_remove("JAMF_MCP_CONFIG")
        .args(["--toolsets", "computers"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("computers"));
}

#[test]
fn test_export_descriptions() {
    let workspace = create_test_workspace();
    let path = workspace.path().join("descriptions.json");

    AssertCommand::cargo_bin(BIN)
        .unwrap()
        .current_dir(workspace.path())
        .env_remove("JAMF_MCP_CONFIG")
        .arg("--export-descriptions")
        .arg("--descriptions-file")
        .arg(&path)
        .assert()
        .success();

    let exported: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(exported.get("TOOL_GET_SERVER_INFO_DESCRIPTION").is_some());
    assert!(exported.get("TOOL_GET_SERVER_METRICS_DESCRIPTION").is_some());
}

#[test]
fn test_mcp_initialize() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");

    let response = client.initialize().expect("Failed to initialize");
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);

    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], BIN);
    assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
    assert!(result["instructions"].as_str().unwrap().contains("Jamf Pro"));
}

#[test]
fn test_mcp_requires_initialize() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");

    let response = client.request("tools/list", json!({})).expect("Failed to send");
    assert_eq!(response["error"]["code"], -32603);

    client.initialize().expect("Failed to initialize");
    let response = client.request("tools/list", json!({})).expect("Failed to send");
    assert!(response.get("result").is_some());
}

#[test]
fn test_mcp_ping_and_list_tools() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    let response = client.request("ping", json!({})).expect("Failed to ping");
    assert_eq!(response["result"], json!({}));

    let response = client.request("tools/list", json!({})).expect("Failed to list tools");
    let tools = response["result"]["tools"]
        .as_array()
        .expect("tools should be array");
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, vec!["get_server_info", "get_server_metrics"]);
    assert_eq!(tools[0]["inputSchema"]["type"], "object");
}

#[test]
fn test_mcp_call_get_server_info() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    let response = client
        .call_tool("get_server_info", json!({}))
        .expect("Failed to call get_server_info");
    let result = &response["result"];
    assert_eq!(result["isError"], false);

    let text = result["content"][0]["text"].as_str().expect("Expected text");
    let info: Value = serde_json::from_str(text).expect("Expected JSON report");
    assert_eq!(info["name"], BIN);
    assert_eq!(info["toolCount"], 2);
    assert_eq!(info["resourceCount"], 1);
}

#[test]
fn test_mcp_invalid_tool_keeps_serving() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    let response = client
        .call_tool("nonexistent_tool", json!({}))
        .expect("Failed to call tool");
    assert_eq!(response["error"]["code"], -32004);

    let response = client.request("ping", json!({})).expect("Failed to ping");
    assert_eq!(response["result"], json!({}));
}

#[test]
fn test_mcp_resources() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    let response = client
        .request("resources/list", json!({}))
        .expect("Failed to list resources");
    let resources = response["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["uri"], "file://scripts/inventory.sh");
    assert_eq!(resources[0]["mimeType"], "application/x-sh");

    let response = client
        .request("resources/read", json!({ "uri": "file://scripts/inventory.sh" }))
        .expect("Failed to read resource");
    let contents = &response["result"]["contents"][0];
    assert!(contents["text"].as_str().unwrap().contains("jamf recon"));

    let response = client
        .request("resources/read", json!({ "uri": "file://scripts/missing.sh" }))
        .expect("Failed to read resource");
    assert_eq!(response["error"]["code"], -32001);
}

#[test]
fn test_mcp_notifications_and_garbage() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    client
        .send_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .unwrap();
    client.send_line("this is not json").unwrap();

    // The notification produced nothing, so the next line answers the garbage.
    let response = client.read_response().unwrap();
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);

    let response = client.request("ping", json!({})).expect("Failed to ping");
    assert_eq!(response["result"], json!({}));
}

#[test]
fn test_mcp_exits_cleanly_on_eof() {
    let workspace = create_test_workspace();
    let mut client = McpTestClient::spawn(&workspace).expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    let status = client.close().expect("Failed to wait for server");
    assert!(status.success());
}
