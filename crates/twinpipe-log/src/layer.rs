use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::dispatcher::LogFanoutDispatcher;
use crate::entry::LogEntry;
use crate::level::LogLevel;

/// Targets whose events are never forwarded: the dispatcher's own
/// diagnostics would otherwise feed back into the writers they describe.
const SELF_TARGET: &str = "twinpipe_log";

/// A `tracing_subscriber` layer that forwards events into a
/// [`LogFanoutDispatcher`].
///
/// The event target becomes the category, the `message` field plus any other
/// fields (`key=value`) become the message, and an `error` field becomes the
/// exception.
#[derive(Debug, Clone)]
pub struct FanoutLayer {
    dispatcher: Arc<LogFanoutDispatcher>,
}

impl FanoutLayer {
    pub fn new(dispatcher: Arc<LogFanoutDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl<S: Subscriber> Layer<S> for FanoutLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(SELF_TARGET) || self.dispatcher.is_empty() {
            return;
        }
        let level = LogLevel::from(*metadata.level());
        if !self.dispatcher.is_enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let exception = visitor.error.take();
        let mut entry = LogEntry::new(level, metadata.target(), visitor.message());
        entry.exception = exception;
        self.dispatcher.log(&entry);
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: String,
    error: Option<String>,
}

impl EventVisitor {
    fn message(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "error" => self.error = Some(value.to_string()),
            _ => self.push_field(field, format_args!("{value}")),
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            self.error = Some(value.to_string());
        } else {
            self.push_field(field, format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "error" => self.error = Some(format!("{value:?}")),
            _ => self.push_field(field, format_args!("{value:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use twinpipe_frame::{MessageType, MessageWriter, StreamMessage, WriteError};

    use super::*;

    fn capture(min_level: LogLevel, f: impl FnOnce()) -> Vec<StreamMessage> {
        let dispatcher = Arc::new(LogFanoutDispatcher::with_min_level(min_level));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let writer = move |message: &StreamMessage| -> Result<(), WriteError> {
            sink.lock().push(message.clone());
            Ok(())
        };
        let writer: Arc<dyn MessageWriter> = Arc::new(writer);
        dispatcher.register("capture", writer);

        let subscriber = tracing_subscriber::registry().with(FanoutLayer::new(dispatcher));
        tracing::subscriber::with_default(subscriber, f);

        let out = seen.lock().clone();
        out
    }

    #[test]
    fn events_become_stream_messages() {
        let seen = capture(LogLevel::Trace, || {
            tracing::info!(target: "app::jobs", job = 7, "job started");
            tracing::warn!(target: "app::jobs", "queue is filling up");
        });

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, MessageType::Info);
        assert!(seen[0].content.ends_with("[info] app::jobs: job started job=7"));
        assert_eq!(seen[1].kind, MessageType::Warning);
        assert!(!seen[1].finished);
    }

    #[test]
    fn error_field_becomes_exception() {
        let seen = capture(LogLevel::Trace, || {
            let err = std::io::Error::other("disk full");
            tracing::error!(target: "store", error = %err, "flush failed");
        });

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, MessageType::Error);
        assert!(seen[0].content.ends_with("store: flush failed\ndisk full"));
    }

    #[test]
    fn respects_min_level_and_skips_own_target() {
        let seen = capture(LogLevel::Warning, || {
            tracing::info!(target: "app", "below threshold");
            tracing::error!(target: "twinpipe_log::dispatcher", "internal");
            tracing::error!(target: "app", "kept");
        });

        assert_eq!(seen.len(), 1);
        assert!(seen[0].content.ends_with("app: kept"));
    }
}
