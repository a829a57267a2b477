use std::fmt;

use serde::Serialize;
use twinpipe_frame::{ERROR_PREFIX, FAIL_PREFIX, UNKNOWN_COMMAND_PREFIX};

/// Outcome class of a client call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Success,
    Failure,
    ServiceNotRunning,
    ConnectionError,
    CommandError,
    UnknownCommand,
    Timeout,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Success => "success",
            ResultKind::Failure => "failure",
            ResultKind::ServiceNotRunning => "service_not_running",
            ResultKind::ConnectionError => "connection_error",
            ResultKind::CommandError => "command_error",
            ResultKind::UnknownCommand => "unknown_command",
            ResultKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a client call returns: the outcome class plus a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallResult {
    pub kind: ResultKind,
    pub message: String,
}

impl CallResult {
    pub fn new(kind: ResultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ResultKind::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ResultKind::Failure, message)
    }

    pub fn is_success(&self) -> bool {
        self.kind == ResultKind::Success
    }

    /// Classify a command reply by its prefix. The prefix is stripped.
    pub fn from_reply(reply: String) -> Self {
        if reply.is_empty() {
            return Self::failure("empty response");
        }
        for (prefix, kind) in [
            (FAIL_PREFIX, ResultKind::Failure),
            (ERROR_PREFIX, ResultKind::CommandError),
            (UNKNOWN_COMMAND_PREFIX, ResultKind::UnknownCommand),
        ] {
            if let Some(rest) = reply.strip_prefix(prefix) {
                return Self::new(kind, rest);
            }
        }
        Self::success(reply)
    }
}

impl fmt::Display for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reply_prefixes() {
        let cases = [
            ("echo: a b", ResultKind::Success, "echo: a b"),
            ("Fail: disk full", ResultKind::Failure, "disk full"),
            ("Error: failure X", ResultKind::CommandError, "failure X"),
            ("UnknownCommand: frob", ResultKind::UnknownCommand, "frob"),
            ("", ResultKind::Failure, "empty response"),
            // Prefixes are case sensitive and must lead the reply.
            ("error: lower", ResultKind::Success, "error: lower"),
            ("Note Fail: x", ResultKind::Success, "Note Fail: x"),
        ];
        for (reply, kind, message) in cases {
            assert_eq!(
                CallResult::from_reply(reply.to_string()),
                CallResult::new(kind, message),
                "reply {reply:?}"
            );
        }
    }

    #[test]
    fn serializes_kind_as_snake_case() {
        let json = serde_json::to_value(CallResult::new(ResultKind::ServiceNotRunning, "down"))
            .expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"kind": "service_not_running", "message": "down"})
        );
    }
}
