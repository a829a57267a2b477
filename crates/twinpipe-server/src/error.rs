use twinpipe_frame::FrameError;
use twinpipe_transport::TransportError;

/// Errors that can occur while running a [`PipeServer`](crate::PipeServer).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding, accepting or liveness flag handling failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading a request or writing a response failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A read or write phase exceeded the read/write budget.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl ServerError {
    /// The peer went away; nothing worth more than a debug line.
    pub fn is_benign(&self) -> bool {
        matches!(self, ServerError::Frame(err) if err.is_benign())
    }

    /// The peer sent bytes that are not a valid request frame.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ServerError::Frame(err) if err.is_protocol())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
