//! Thin driver binary: parses CLI args, builds a transport, attaches a
//! demo echo handler, and serves.

use std::sync::Arc;

use mcp_broker::cli::{Cli, TransportKind};
use mcp_broker::config::Config;
use mcp_broker::message::{error_code, ErrorObject, Message};
use mcp_broker::observability::init_tracing;
use mcp_broker::transport::stdio::StdioTransport;
use mcp_broker::transport::{HandlerError, RequestHandler};
use mcp_broker::http::HttpTransport;

use clap::Parser;

/// Echoes `params` back as `result`; replies method-not-found to anything
/// else. Real business logic is supplied by the embedder — this only keeps
/// the driver runnable on its own.
struct EchoHandler;

#[async_trait::async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, message: Message) -> Result<Option<Message>, HandlerError> {
        if !message.is_request() {
            return Ok(None);
        }
        let id = message.id.clone();

        let response = match message.method.as_deref() {
            Some("ping") => Message::response(id.unwrap_or(serde_json::Value::Null), serde_json::json!("pong")),
            Some(_) => Message::error_response(id, ErrorObject::new(error_code::METHOD_NOT_FOUND, "method not found")),
            None => return Err(HandlerError::new("request missing method")),
        };

        Ok(Some(response))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let handler: Arc<dyn RequestHandler> = Arc::new(EchoHandler);

    match cli.transport {
        TransportKind::Stdio => {
            tracing::info!("serving on stdio");
            let transport = StdioTransport::new(tokio::io::stdin(), tokio::io::stdout());
            transport.serve(handler.as_ref()).await?;
        }
        TransportKind::Http => {
            let mut config = Config::default();
            if let Some(address) = cli.address {
                config.address = address;
            }
            if let Some(api_key) = cli.api_key {
                config.api_key = Some(api_key);
            }
            if let Some(rate_limit) = cli.rate_limit {
                config.rate_limit = rate_limit;
            }
            config.validate()?;

            tracing::info!(address = %config.address, "serving on http");
            let transport = HttpTransport::new(config, Some(handler));
            transport.serve().await?;
        }
    }

    Ok(())
}
