//! Client side of twinpipe.
//!
//! [`PipeClient`] performs exactly one command round-trip or one streaming
//! round-trip per call, each step under its own timeout, and reports the
//! outcome as a [`CallResult`]. It never retries on its own.

pub mod client;
pub mod error;
pub mod result;

pub use client::PipeClient;
pub use error::{ClientError, Result};
pub use result::{CallResult, ResultKind};
