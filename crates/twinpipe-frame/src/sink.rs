use crate::message::StreamMessage;

/// Why a [`MessageWriter`] could not take a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// The destination is gone (stream finished or connection closed).
    #[error("writer closed")]
    Closed,

    /// The writer failed while delivering the message.
    #[error("write failed: {0}")]
    Failed(String),
}

/// Capability to deliver [`StreamMessage`]s somewhere.
///
/// Implemented by the server's per-session stream writer and accepted by the
/// log fan-out dispatcher, so a streaming session can subscribe itself to
/// log records. Closures of the right shape implement it too.
///
/// `Ok(())` means the writer accepted the message; a queueing writer may
/// still lose it if its connection fails later. Implementations must not
/// block for long, since the dispatcher calls them inline.
pub trait MessageWriter: Send + Sync {
    fn write(&self, message: &StreamMessage) -> Result<(), WriteError>;
}

impl<F> MessageWriter for F
where
    F: Fn(&StreamMessage) -> Result<(), WriteError> + Send + Sync,
{
    fn write(&self, message: &StreamMessage) -> Result<(), WriteError> {
        self(message)
    }
}
