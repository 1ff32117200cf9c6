//! Thin CLI wrapper serving an MCP endpoint over stdio or SSE.
//!
//! Exit codes: 0 on normal exit, 1 on fatal startup errors, 2 on invalid
//! arguments (clap's own convention).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use conduit_mcp::config::{McpConfig, TransportKind};
use conduit_mcp::protocol::constants::exit_codes;
use conduit_mcp::server::McpServerBuilder;
use conduit_mcp::transport::sse::StaticApiKeyValidator;

/// MCP server endpoint over stdio or HTTP+SSE
#[derive(Debug, Parser)]
#[command(name = "conduit-mcp", version, about)]
struct Args {
    /// Transport to serve on (stdio or sse)
    #[arg(long, default_value = "stdio")]
    transport: String,

    /// Listen host for the SSE transport
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port for the SSE transport
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Require this API key on the SSE endpoints
    #[arg(long)]
    api_key: Option<String>,

    /// Liveness endpoint path (SSE only)
    #[arg(long)]
    health_path: Option<String>,

    /// Server name reported at initialization
    #[arg(long)]
    server_name: Option<String>,

    /// Instructions reported at initialization
    #[arg(long)]
    instructions: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let transport = match args.transport.parse::<TransportKind>() {
        Ok(kind) => kind,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(exit_codes::INVALID_ARGUMENTS as u8);
        }
    };

    let mut config = McpConfig {
        transport,
        host: args.host,
        port: args.port,
        api_key: args.api_key,
        health_path: args.health_path,
        instructions: args.instructions,
        ..Default::default()
    };
    if let Some(name) = args.server_name {
        config.server_name = name;
    }

    match run(config).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            error!("startup failed: {e}");
            ExitCode::from(exit_codes::STARTUP_FAILURE as u8)
        }
    }
}

async fn run(config: McpConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server_config = config.server_config()?;
    let server = McpServerBuilder::new().config(server_config).build();

    match config.transport {
        TransportKind::Stdio => {
            let mut transport = server.serve_stdio().await?;
            transport.wait_for_completion().await?;
        }
        TransportKind::Sse => {
            let validator = config
                .api_key
                .as_ref()
                .map(|key| {
                    Arc::new(StaticApiKeyValidator::new([key.clone()]))
                        as Arc<dyn conduit_mcp::transport::sse::ApiKeyValidator>
                });

            let mut sse = server
                .serve_sse_with_validator(config.sse_server_config(), validator)
                .await?;

            tokio::signal::ctrl_c().await?;
            sse.shutdown().await?;
        }
    }

    Ok(())
}
