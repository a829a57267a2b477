use chrono::{DateTime, Utc};

use crate::level::LogLevel;

/// One log record as produced by a [`Logger`](crate::Logger) or the tracing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub exception: Option<String>,
}

impl LogEntry {
    /// A record stamped with the current time.
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            category: category.into(),
            message: message.into(),
            exception: None,
        }
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Text sent as the stream message content:
    /// `HH:MM:SS.mmm [level] category: message`, exception on the next line.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} [{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.category,
            self.message
        );
        if let Some(exception) = &self.exception {
            out.push('\n');
            out.push_str(exception);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed(level: LogLevel) -> LogEntry {
        LogEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap()
                + chrono::Duration::milliseconds(67),
            ..LogEntry::new(level, "worker", "job done")
        }
    }

    #[test]
    fn render_plain() {
        assert_eq!(
            fixed(LogLevel::Information).render(),
            "13:04:05.067 [info] worker: job done"
        );
    }

    #[test]
    fn render_with_exception() {
        let entry = fixed(LogLevel::Error).with_exception("io error: disk full");
        assert_eq!(
            entry.render(),
            "13:04:05.067 [error] worker: job done\nio error: disk full"
        );
    }
}
