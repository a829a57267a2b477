use twinpipe_frame::FrameError;
use twinpipe_transport::TransportError;

use crate::result::{CallResult, ResultKind};

/// Why a client call did not produce a reply.
///
/// Public calls convert this into a [`CallResult`]; the variants map onto
/// [`ResultKind`]s in [`From<ClientError> for CallResult`](CallResult).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Nothing is listening on the endpoint.
    #[error("service not running: {0}")]
    NotRunning(TransportError),

    /// Connecting failed for another reason.
    #[error(transparent)]
    Connect(TransportError),

    /// A phase of the call ran past its budget.
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Reading or writing a frame failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The server closed the connection before the call completed.
    #[error("connection closed before {0}")]
    Closed(&'static str),

    /// The caller cancelled a streaming call.
    #[error("stream cancelled")]
    Cancelled,
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        if err.is_not_listening() {
            ClientError::NotRunning(err)
        } else {
            ClientError::Connect(err)
        }
    }
}

impl ClientError {
    pub fn kind(&self) -> ResultKind {
        match self {
            ClientError::NotRunning(_) => ResultKind::ServiceNotRunning,
            ClientError::Connect(_) => ResultKind::ConnectionError,
            ClientError::Timeout(_) => ResultKind::Timeout,
            ClientError::Frame(err) if err.is_protocol() || err.is_benign() => ResultKind::Failure,
            ClientError::Frame(_) => ResultKind::ConnectionError,
            ClientError::Closed(_) | ClientError::Cancelled => ResultKind::Failure,
        }
    }
}

impl From<ClientError> for CallResult {
    fn from(err: ClientError) -> Self {
        CallResult::new(err.kind(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
