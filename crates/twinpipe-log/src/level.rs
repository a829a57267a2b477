use std::fmt;

use twinpipe_frame::MessageType;

/// Severity of a log record, ordered from least to most severe.
///
/// `None` sorts above everything and is never accepted by the dispatcher;
/// it only exists as a "log nothing" threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    /// The stream message type a record of this level is sent as.
    pub fn message_type(self) -> Option<MessageType> {
        match self {
            LogLevel::Trace => Some(MessageType::Trace),
            LogLevel::Debug => Some(MessageType::Debug),
            LogLevel::Information => Some(MessageType::Info),
            LogLevel::Warning => Some(MessageType::Warning),
            LogLevel::Error | LogLevel::Critical => Some(MessageType::Error),
            LogLevel::None => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Information => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "crit",
            LogLevel::None => "none",
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
