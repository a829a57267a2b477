//! Local endpoint transport for twinpipe.
//!
//! Provides the pieces both sides of a twinpipe connection share:
//! - endpoint naming (a plain pipe name resolves to a Unix socket path)
//! - bind/accept/connect over Unix domain sockets (Linux/macOS)
//! - [`PipeOptions`], the read-only options record of a server instance
//! - the best-effort liveness flag file
//!
//! This is the lowest layer of twinpipe. Everything else builds on top of
//! the [`IpcStream`] type provided here.

#[cfg(not(unix))]
compile_error!("twinpipe endpoints are Unix domain sockets; this target is not supported yet");

pub mod endpoint;
pub mod error;
pub mod liveness;
pub mod options;

pub use endpoint::{connect, resolve_endpoint, runtime_dir, EndpointListener, IpcStream};
pub use error::{Result, TransportError};
pub use liveness::{is_raised, read_flag, LivenessFlag};
pub use options::{
    PipeOptions, DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_READ_WRITE_TIMEOUT_MS, UNLIMITED_CLIENTS,
};
