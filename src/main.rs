//! Jamf Pro MCP Server - Rust Implementation
//!
//! Serves MCP over stdin/stdout. All logging goes to stderr.

use anyhow::{anyhow, Context};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jamfpro_mcp::config::{Args, Config, LogFormat};
use jamfpro_mcp::mcp::handler::McpHandler;
use jamfpro_mcp::mcp::resources::FileResourceProvider;
use jamfpro_mcp::mcp::server::McpServer;
use jamfpro_mcp::mcp::transport::StdioTransport;
use jamfpro_mcp::metrics::Metrics;
use jamfpro_mcp::tools::descriptions::{self, DescriptionOverrides};
use jamfpro_mcp::tools::server_info::{self, Inventory, ServerInfoToolset};
use jamfpro_mcp::tools::{Toolset, ToolsetFactory, ALL_TOOLSETS};
use jamfpro_mcp::{INSTRUCTIONS, VERSION};

/// Time allowed for blocking stdin reads to unwind after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level: {}", config.log_level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.log_format {
        LogFormat::Text => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

fn shutdown_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("Shutdown signal received");
        token.cancel();
    });
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let metrics = Metrics::new();
    let info_toolset = Arc::new(
        ServerInfoToolset::new(&config.server_name, VERSION, metrics.clone())
            .with_instance_url(config.instance_url.clone()),
    );

    let mut factory = ToolsetFactory::new();
    {
        let toolset = info_toolset.clone();
        factory.register(server_info::TOOLSET_NAME, move || {
            Ok(toolset.clone() as Arc<dyn Toolset>)
        });
    }

    config
        .validate(&factory.available())
        .context("invalid configuration")?;

    if config.export_descriptions {
        let mut handler = McpHandler::new();
        factory.register_enabled(&mut handler, &[ALL_TOOLSETS], &DescriptionOverrides::new());
        let written = descriptions::export(&config.descriptions_file, &handler.list_tools())
            .with_context(|| {
                format!(
                    "failed to export tool descriptions to {}",
                    config.descriptions_file.display()
                )
            })?;
        info!(
            "Exported {} tool descriptions to {}",
            written,
            config.descriptions_file.display()
        );
        return Ok(());
    }

    let overrides = DescriptionOverrides::load(&config.descriptions_file);
    if !overrides.is_empty() {
        info!("Loaded {} tool description overrides", overrides.len());
    }

    let mut handler = McpHandler::new();
    let enabled = factory.register_enabled(&mut handler, &config.toolsets, &overrides);

    let mut resources = FileResourceProvider::new(&config.resource_root);
    let resource_count = resources.register_common_directories(&config.resource_dirs);
    info!(
        "Registered {} resources under {}",
        resource_count,
        config.resource_root.display()
    );

    info_toolset.record_inventory(Inventory {
        toolsets: enabled,
        tool_count: handler.tool_count(),
        resource_count,
    });

    match &config.instance_url {
        Some(url) => info!("Jamf Pro instance: {} ({:?})", url, config.auth_method),
        None => info!("No Jamf Pro instance configured"),
    }

    let server = McpServer::new(handler, &config.server_name)
        .with_resources(Arc::new(resources))
        .with_metrics(metrics)
        .with_instructions(INSTRUCTIONS);

    let shutdown = CancellationToken::new();
    shutdown_on_signal(shutdown.clone());

    server
        .run(StdioTransport::stdio(), shutdown)
        .await
        .context("MCP server failed")
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {}", e);
        }
    }

    let args = Args::parse();
    let config = Config::load(args).context("failed to load configuration")?;

    init_tracing(&config)?;
    info!("Jamf Pro MCP Server v{}", VERSION);
    tracing::debug!("Configuration: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create Tokio runtime")?;

    let result = runtime.block_on(serve(config));

    // A stdin read may still be parked on a blocking thread after a signal.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}
