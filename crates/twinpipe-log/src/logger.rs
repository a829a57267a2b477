use std::sync::Arc;

use crate::dispatcher::LogFanoutDispatcher;
use crate::entry::LogEntry;
use crate::level::LogLevel;

/// A handle that logs into a [`LogFanoutDispatcher`] under a fixed category.
///
/// Each logger carries its own category, so loggers for different
/// components can be used concurrently without stepping on each other.
#[derive(Debug, Clone)]
pub struct Logger {
    dispatcher: Arc<LogFanoutDispatcher>,
    category: String,
}

impl Logger {
    pub fn new(dispatcher: Arc<LogFanoutDispatcher>, category: impl Into<String>) -> Self {
        Self {
            dispatcher,
            category: category.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.dispatcher.is_enabled(level)
    }

    /// Log `message` at `level`. Returns the number of writers reached.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> usize {
        if !self.is_enabled(level) {
            return 0;
        }
        self.dispatcher
            .log(&LogEntry::new(level, self.category.clone(), message))
    }

    /// Log `message` with an attached error description.
    pub fn log_error(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        exception: &dyn std::error::Error,
    ) -> usize {
        if !self.is_enabled(level) {
            return 0;
        }
        let entry = LogEntry::new(level, self.category.clone(), message)
            .with_exception(exception.to_string());
        self.dispatcher.log(&entry)
    }

    pub fn trace(&self, message: impl Into<String>) -> usize {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: impl Into<String>) -> usize {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> usize {
        self.log(LogLevel::Information, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> usize {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> usize {
        self.log(LogLevel::Error, message)
    }

    pub fn critical(&self, message: impl Into<String>) -> usize {
        self.log(LogLevel::Critical, message)
    }
}
