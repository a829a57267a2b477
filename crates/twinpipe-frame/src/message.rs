use std::fmt;

use serde::{Deserialize, Serialize};

/// Command reply prefix for an application-level failure.
pub const FAIL_PREFIX: &str = "Fail: ";
/// Command reply prefix for a handler error.
pub const ERROR_PREFIX: &str = "Error: ";
/// Command reply prefix for a command the service does not know.
pub const UNKNOWN_COMMAND_PREFIX: &str = "UnknownCommand: ";

/// A request sent by a client on either endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub streaming: bool,
}

impl CommandMessage {
    /// A one-shot request for the command endpoint.
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            streaming: false,
        }
    }

    /// A request for the stream endpoint.
    pub fn streaming<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            streaming: true,
            ..Self::new(command, args)
        }
    }
}

/// Severity/kind tag of a [`StreamMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Success,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Trace => "trace",
            MessageType::Debug => "debug",
            MessageType::Info => "info",
            MessageType::Warning => "warning",
            MessageType::Error => "error",
            MessageType::Success => "success",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a streaming response.
///
/// A stream ends with exactly one message whose `finished` flag is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub content: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(rename = "type")]
    pub kind: MessageType,
}

impl StreamMessage {
    pub fn new(kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finished: false,
            kind,
        }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self::new(MessageType::Info, content)
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::new(MessageType::Warning, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageType::Error, content)
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self::new(MessageType::Success, content)
    }

    /// Mark this message as the last one of its stream.
    pub fn finished(mut self) -> Self {
        self.finished = true;
        self
    }
}
