use std::io::ErrorKind;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared length is outside `(0, MAX_FRAME_LEN]`.
    #[error("invalid frame length {0}")]
    InvalidLength(i64),

    /// The payload is not valid JSON for the expected message type.
    #[error("malformed frame payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Protocol violations: the peer sent something that is not a valid frame.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidLength(_) | FrameError::MalformedPayload(_)
        )
    }

    /// Connection faults that carry no application meaning (peer went away).
    pub fn is_benign(&self) -> bool {
        match self {
            FrameError::ConnectionClosed => true,
            FrameError::Io(err) => matches!(
                err.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_connection_faults_as_benign() {
        assert!(FrameError::ConnectionClosed.is_benign());
        assert!(FrameError::Io(std::io::Error::from(ErrorKind::BrokenPipe)).is_benign());
        assert!(FrameError::Io(std::io::Error::from(ErrorKind::ConnectionReset)).is_benign());
        assert!(!FrameError::Io(std::io::Error::from(ErrorKind::PermissionDenied)).is_benign());
        assert!(!FrameError::InvalidLength(-1).is_benign());
    }

    #[test]
    fn classifies_protocol_errors() {
        assert!(FrameError::InvalidLength(0).is_protocol());
        let json_err = serde_json::from_str::<String>("{").unwrap_err();
        assert!(FrameError::MalformedPayload(json_err).is_protocol());
        assert!(!FrameError::ConnectionClosed.is_protocol());
    }
}
