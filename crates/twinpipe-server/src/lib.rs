//! Dual-endpoint IPC server for twinpipe.
//!
//! A [`PipeServer`] listens on two endpoints at once:
//! - the **command** endpoint answers one request per connection with a
//!   single string reply produced by a [`CommandHandler`]
//! - the **stream** endpoint hands each request to a [`StreamHandler`] that
//!   sends any number of messages through a [`StreamWriter`], ending with one
//!   message marked finished
//!
//! ```no_run
//! use twinpipe_server::{command_fn, PipeServer};
//! use twinpipe_transport::PipeOptions;
//!
//! # async fn demo() -> Result<(), twinpipe_server::ServerError> {
//! let server = PipeServer::new(
//!     PipeOptions::for_service("demo"),
//!     command_fn(|command: &str, _args: &[String]| Ok(format!("got {command}"))),
//! );
//! server.run(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod server;
pub mod writer;

pub use error::{Result, ServerError};
pub use handler::{command_fn, CommandHandler, FnCommandHandler, HandlerError, StreamHandler};
pub use server::{PipeServer, ServerHandle, ACCEPT_ERROR_COOLDOWN};
pub use writer::StreamWriter;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
