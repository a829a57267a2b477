//! Log fan-out for twinpipe.
//!
//! [`LogFanoutDispatcher`] is a logging sink that turns each accepted
//! [`LogEntry`] into a [`StreamMessage`](twinpipe_frame::StreamMessage) and
//! delivers it to every registered [`MessageWriter`](twinpipe_frame::MessageWriter).
//! A streaming session registers its own writer to receive live logs; a
//! writer that fails once is dropped from the registry.
//!
//! Records enter through a per-category [`Logger`] or through
//! [`FanoutLayer`], a `tracing_subscriber` layer that forwards `tracing`
//! events.

pub mod dispatcher;
pub mod entry;
pub mod layer;
pub mod level;
pub mod logger;

pub use dispatcher::LogFanoutDispatcher;
pub use entry::LogEntry;
pub use layer::FanoutLayer;
pub use level::LogLevel;
pub use logger::Logger;
