//! Dual-channel local IPC.
//!
//! A twinpipe service listens on two local endpoints: a **command** endpoint
//! for one-shot request/response calls and a **stream** endpoint for
//! long-lived responses made of many messages. Every message is one
//! length-prefixed JSON frame, and every connection carries one request.
//!
//! # Crate Structure
//!
//! - [`transport`]: Endpoint naming, Unix socket bind/connect, options, liveness flag
//! - [`frame`]: Frame codec, message types and the message writer capability
//! - [`server`]: The dual-endpoint server and its handler traits
//! - [`client`]: One-shot command and streaming client with its result taxonomy
//! - [`log`]: Log fan-out dispatcher that streams log records to clients

/// Re-export transport types.
pub mod transport {
    pub use twinpipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use twinpipe_frame::*;
}

/// Re-export server types.
pub mod server {
    pub use twinpipe_server::*;
}

/// Re-export client types.
pub mod client {
    pub use twinpipe_client::*;
}

/// Re-export log fan-out types.
pub mod log {
    pub use twinpipe_log::*;
}

pub use twinpipe_client::{CallResult, PipeClient, ResultKind};
pub use twinpipe_frame::{CommandMessage, MessageType, MessageWriter, StreamMessage};
pub use twinpipe_log::{LogFanoutDispatcher, Logger};
pub use twinpipe_server::{PipeServer, ServerHandle, StreamWriter};
pub use twinpipe_transport::PipeOptions;
