use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::{resolve_endpoint, runtime_dir};
use crate::error::{Result, TransportError};

/// `max_clients` value meaning "no limit beyond what the platform allows".
pub const UNLIMITED_CLIENTS: i32 = -1;
/// Default budget for establishing a connection.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
/// Default budget for each read or write phase of a call.
pub const DEFAULT_READ_WRITE_TIMEOUT_MS: u64 = 10_000;

const FALLBACK_SERVICE_NAME: &str = "twinpipe";

/// Options shared by a server instance and the clients talking to it.
///
/// Constructed once and read-only afterwards. Deserializes with defaults for
/// any missing field, so a host can embed it in its own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeOptions {
    /// Name of the command (request/response) endpoint.
    pub command_pipe_name: String,
    /// Name of the stream endpoint.
    pub stream_pipe_name: String,
    /// Maximum concurrent stream sessions, `-1` for unbounded.
    pub max_clients: i32,
    /// File written while the server is up.
    pub liveness_flag_path: PathBuf,
    /// Budget for a client to establish a connection.
    pub connection_timeout_ms: u64,
    /// Budget for each individual read or write phase.
    pub read_write_timeout_ms: u64,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self::for_service(&process_name())
    }
}

impl PipeOptions {
    /// Options whose endpoint names and flag path derive from `service`.
    pub fn for_service(service: &str) -> Self {
        Self {
            command_pipe_name: format!("{service}.command"),
            stream_pipe_name: format!("{service}.stream"),
            max_clients: UNLIMITED_CLIENTS,
            liveness_flag_path: runtime_dir().join(format!("{service}.running")),
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            read_write_timeout_ms: DEFAULT_READ_WRITE_TIMEOUT_MS,
        }
    }

    pub fn with_command_pipe_name(mut self, name: impl Into<String>) -> Self {
        self.command_pipe_name = name.into();
        self
    }

    pub fn with_stream_pipe_name(mut self, name: impl Into<String>) -> Self {
        self.stream_pipe_name = name.into();
        self
    }

    pub fn with_max_clients(mut self, max_clients: i32) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn with_liveness_flag_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.liveness_flag_path = path.into();
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn with_read_write_timeout(mut self, timeout: Duration) -> Self {
        self.read_write_timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn read_write_timeout(&self) -> Duration {
        Duration::from_millis(self.read_write_timeout_ms)
    }

    /// Socket path of the command endpoint.
    pub fn command_endpoint(&self) -> PathBuf {
        resolve_endpoint(&self.command_pipe_name)
    }

    /// Socket path of the stream endpoint.
    pub fn stream_endpoint(&self) -> PathBuf {
        resolve_endpoint(&self.stream_pipe_name)
    }

    /// Concurrent stream session limit, `None` when unbounded.
    pub fn session_limit(&self) -> Option<usize> {
        usize::try_from(self.max_clients).ok()
    }

    /// Check the record before a server binds with it.
    pub fn validate(&self) -> Result<()> {
        if self.command_pipe_name.trim().is_empty() || self.stream_pipe_name.trim().is_empty() {
            return Err(TransportError::InvalidOptions(
                "pipe names must not be empty".to_string(),
            ));
        }
        if self.command_endpoint() == self.stream_endpoint() {
            return Err(TransportError::InvalidOptions(format!(
                "command and stream pipes resolve to the same endpoint: {}",
                self.command_endpoint().display()
            )));
        }
        if self.max_clients == 0 || self.max_clients < UNLIMITED_CLIENTS {
            return Err(TransportError::InvalidOptions(format!(
                "max_clients must be positive or {UNLIMITED_CLIENTS}, got {}",
                self.max_clients
            )));
        }
        if self.connection_timeout_ms == 0 || self.read_write_timeout_ms == 0 {
            return Err(TransportError::InvalidOptions(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// File stem of the running executable, used for default endpoint names.
fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_SERVICE_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_defaults_derive_from_name() {
        let options = PipeOptions::for_service("svc");
        assert_eq!(options.command_pipe_name, "svc.command");
        assert_eq!(options.stream_pipe_name, "svc.stream");
        assert_eq!(options.max_clients, UNLIMITED_CLIENTS);
        assert!(options.liveness_flag_path.ends_with("svc.running"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn default_uses_process_name() {
        let options = PipeOptions::default();
        assert!(options.command_pipe_name.ends_with(".command"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn session_limit_maps_unbounded() {
        assert_eq!(PipeOptions::for_service("a").session_limit(), None);
        assert_eq!(
            PipeOptions::for_service("a").with_max_clients(4).session_limit(),
            Some(4)
        );
    }

    #[test]
    fn validate_rejects_shared_endpoint() {
        let options = PipeOptions::for_service("a").with_stream_pipe_name("a.command");
        assert!(matches!(
            options.validate(),
            Err(TransportError::InvalidOptions(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_clients_and_timeouts() {
        let zero_clients = PipeOptions::for_service("a").with_max_clients(0);
        assert!(zero_clients.validate().is_err());

        let zero_timeout = PipeOptions::for_service("a").with_read_write_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn deserializes_partial_record_with_defaults() {
        let options: PipeOptions =
            serde_json::from_str(r#"{"command_pipe_name":"x.cmd","max_clients":2}"#).unwrap();
        assert_eq!(options.command_pipe_name, "x.cmd");
        assert_eq!(options.max_clients, 2);
        assert_eq!(options.connection_timeout_ms, DEFAULT_CONNECTION_TIMEOUT_MS);
    }

    #[test]
    fn builder_sets_timeouts() {
        let options = PipeOptions::for_service("a")
            .with_connection_timeout(Duration::from_millis(250))
            .with_read_write_timeout(Duration::from_secs(2));
        assert_eq!(options.connection_timeout(), Duration::from_millis(250));
        assert_eq!(options.read_write_timeout(), Duration::from_secs(2));
    }
}
