use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::writer::StreamWriter;

/// Error type handlers may return. Its `Display` text is what the client sees.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handles one-shot requests arriving on the command endpoint.
///
/// The returned string is sent back verbatim. Replies starting with
/// `"Fail: "` or `"UnknownCommand: "` are classified accordingly by the
/// client; an `Err` becomes an `"Error: <message>"` reply.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &str, args: &[String]) -> Result<String, HandlerError>;
}

/// Handles requests arriving on the stream endpoint.
///
/// The handler sends any number of messages through `writer` and should end
/// the stream with exactly one message marked finished. It should return
/// once `cancel` fires (server shutdown or client disconnect). An `Err`
/// becomes a terminal error message if the stream is not finished yet.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn handle(
        &self,
        command: String,
        args: Vec<String>,
        writer: StreamWriter,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError>;
}

/// [`CommandHandler`] backed by a synchronous closure. See [`command_fn`].
pub struct FnCommandHandler<F> {
    f: F,
}

/// Wrap a synchronous closure as a [`CommandHandler`].
pub fn command_fn<F>(f: F) -> FnCommandHandler<F>
where
    F: Fn(&str, &[String]) -> Result<String, HandlerError> + Send + Sync,
{
    FnCommandHandler { f }
}

#[async_trait]
impl<F> CommandHandler for FnCommandHandler<F>
where
    F: Fn(&str, &[String]) -> Result<String, HandlerError> + Send + Sync,
{
    async fn handle(&self, command: &str, args: &[String]) -> Result<String, HandlerError> {
        (self.f)(command, args)
    }
}
