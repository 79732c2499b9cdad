//! Transport contract shared by the stdio and HTTP transports.

pub mod stdio;

use async_trait::async_trait;

use crate::message::Message;

/// The externally-supplied request handler. Both transports invoke this for
/// every decoded [`Message`] and write back whatever it returns, if anything.
///
/// Business logic (method dispatch, parameter validation, the upstream
/// automation backend) lives entirely behind this trait and is out of scope
/// here: the transport only knows "request message in, optional response
/// message out."
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Result<Option<Message>, HandlerError>;
}

/// An error returned by a [`RequestHandler`]. The transport never propagates
/// this to its caller; it is always converted into a JSON-RPC error response
/// with code `-32603` (internal error).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Convenience impl so a plain async closure can be used as a handler in
/// tests and examples.
#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Option<Message>, HandlerError>> + Send,
{
    async fn handle(&self, message: Message) -> Result<Option<Message>, HandlerError> {
        (self)(message).await
    }
}
