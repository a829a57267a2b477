use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use twinpipe_frame::{MessageWriter, StreamMessage, WriteError};

/// Per-session capability to send [`StreamMessage`]s to a streaming client.
///
/// Cheap to clone; all clones feed the same connection. Sends never block:
/// messages are queued and written by the session in order, each write
/// bounded by the read/write timeout. `send` returning `true` means the
/// message was accepted into that queue, not that it reached the client.
/// A failed or timed-out write ends the session, after which `send` returns
/// `false`, as it does once the stream is finished or the handler returned.
#[derive(Clone)]
pub struct StreamWriter {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<StreamMessage>>>>,
}

impl StreamWriter {
    /// A writer and the receiving end of its queue.
    ///
    /// The server builds one per session; handlers can use this directly to
    /// drive a writer in tests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Queue `message` for the client. Returns whether it was accepted.
    ///
    /// A finished message closes the writer.
    pub fn send(&self, message: StreamMessage) -> bool {
        let mut slot = self.tx.lock();
        let Some(tx) = slot.as_ref() else {
            return false;
        };
        let finished = message.finished;
        if tx.send(message).is_err() {
            *slot = None;
            return false;
        }
        if finished {
            *slot = None;
        }
        true
    }

    /// Whether further sends will be refused.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().is_none_or(|tx| tx.is_closed())
    }

    /// Refuse further sends. Messages already queued are still delivered.
    pub fn close(&self) {
        self.tx.lock().take();
    }
}

impl MessageWriter for StreamWriter {
    fn write(&self, message: &StreamMessage) -> Result<(), WriteError> {
        if self.send(message.clone()) {
            Ok(())
        } else {
            Err(WriteError::Closed)
        }
    }
}

impl std::fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_message_closes_writer() {
        let (writer, mut rx) = StreamWriter::channel();
        assert!(writer.send(StreamMessage::info("one")));
        assert!(writer.send(StreamMessage::success("done").finished()));
        assert!(!writer.send(StreamMessage::info("late")));
        assert!(!writer.send(StreamMessage::success("again").finished()));
        assert!(writer.is_closed());

        assert_eq!(rx.try_recv().expect("first message"), StreamMessage::info("one"));
        assert!(rx.try_recv().expect("finished message").finished);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_is_shared_by_clones() {
        let (writer, _rx) = StreamWriter::channel();
        let registered = writer.clone();
        writer.close();

        assert!(!registered.send(StreamMessage::info("x")));
        assert_eq!(
            registered.write(&StreamMessage::info("x")),
            Err(WriteError::Closed)
        );
    }

    #[test]
    fn send_accepts_before_delivery_then_refuses_after_writer_loss() {
        let (writer, mut rx) = StreamWriter::channel();
        // Nothing drains the queue yet; acceptance does not wait for delivery.
        for i in 0..100 {
            assert!(writer.send(StreamMessage::info(format!("m{i}"))));
        }
        assert_eq!(rx.try_recv().expect("queued message"), StreamMessage::info("m0"));

        // The session drops the receiver when a frame write fails.
        drop(rx);
        assert!(!writer.send(StreamMessage::info("after failure")));
        assert_eq!(writer.write(&StreamMessage::info("x")), Err(WriteError::Closed));
    }

    #[test]
    fn dropped_receiver_refuses_sends() {
        let (writer, rx) = StreamWriter::channel();
        drop(rx);
        assert!(writer.is_closed());
        assert!(!writer.send(StreamMessage::info("nobody listening")));
    }
}
