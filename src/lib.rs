//! A JSON-RPC 2.0 message broker with two transports — line-delimited
//! stdio and HTTP with Server-Sent Events — sharing a single externally
//! supplied request handler contract.

pub mod cli;
pub mod config;
pub mod http;
pub mod message;
pub mod metrics;
pub mod observability;
pub mod rate_limit;
pub mod sse;
pub mod transport;

pub use config::Config;
pub use message::Message;
pub use transport::{HandlerError, RequestHandler};

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type aggregating every component's error enum.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("message error: {0}")]
    Message(#[from] message::MessageError),

    #[error("stdio transport error: {0}")]
    Stdio(#[from] transport::stdio::StdioError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] http::HttpError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
