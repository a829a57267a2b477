use std::any::Any;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::{AbortOnDropHandle, TaskTracker};
use tracing::{debug, error, info, warn};
use twinpipe_frame::{CommandMessage, FrameReader, FrameWriter, StreamMessage, ERROR_PREFIX};
use twinpipe_transport::{EndpointListener, IpcStream, LivenessFlag, PipeOptions};

use crate::error::{Result, ServerError};
use crate::handler::{CommandHandler, StreamHandler};
use crate::writer::StreamWriter;

/// Pause after a failed accept before listening again.
pub const ACCEPT_ERROR_COOLDOWN: Duration = Duration::from_millis(500);

const NO_STREAM_HANDLER: &str = "streaming is not supported by this service";

/// A service exposing a command endpoint and a stream endpoint.
///
/// Every connection carries exactly one request. The command endpoint serves
/// its connections one after another; each stream connection gets its own
/// session task, up to `max_clients` at a time.
pub struct PipeServer {
    options: PipeOptions,
    command_handler: Arc<dyn CommandHandler>,
    stream_handler: Option<Arc<dyn StreamHandler>>,
}

impl PipeServer {
    pub fn new(options: PipeOptions, command_handler: impl CommandHandler + 'static) -> Self {
        Self {
            options,
            command_handler: Arc::new(command_handler),
            stream_handler: None,
        }
    }

    /// Attach the handler for the stream endpoint.
    ///
    /// Without one the stream endpoint still accepts connections and answers
    /// each request with a terminal error message.
    pub fn with_stream_handler(mut self, handler: impl StreamHandler + 'static) -> Self {
        self.stream_handler = Some(Arc::new(handler));
        self
    }

    pub fn options(&self) -> &PipeOptions {
        &self.options
    }

    /// Bind both endpoints, raise the liveness flag and start accepting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<ServerHandle> {
        self.options.validate()?;

        let command_listener = EndpointListener::bind_path(self.options.command_endpoint())?;
        let stream_listener = EndpointListener::bind_path(self.options.stream_endpoint())?;
        let command_path = command_listener.path().to_path_buf();
        let stream_path = stream_listener.path().to_path_buf();
        let liveness = LivenessFlag::raise(&self.options.liveness_flag_path)?;

        let cancel = CancellationToken::new();
        let sessions = TaskTracker::new();
        let io_timeout = self.options.read_write_timeout();

        let command_loop = tokio::spawn(command_loop(
            command_listener,
            self.command_handler,
            io_timeout,
            cancel.clone(),
        ));
        let stream_loop = tokio::spawn(stream_loop(
            stream_listener,
            StreamContext {
                handler: self.stream_handler,
                io_timeout,
            },
            self.options
                .session_limit()
                .map(|limit| Arc::new(Semaphore::new(limit))),
            sessions.clone(),
            cancel.clone(),
        ));

        info!(
            command = %command_path.display(),
            stream = %stream_path.display(),
            "pipe server listening"
        );

        Ok(ServerHandle {
            cancel,
            command_loop,
            stream_loop,
            sessions,
            liveness: Some(liveness),
            command_path,
            stream_path,
        })
    }

    /// Start the server, run until `shutdown` resolves, then stop it.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let handle = self.start()?;
        shutdown.await;
        handle.stop().await
    }
}

/// A running [`PipeServer`].
///
/// Dropping the handle cancels the server without waiting for it; call
/// [`stop`](Self::stop) for an orderly shutdown.
pub struct ServerHandle {
    cancel: CancellationToken,
    command_loop: JoinHandle<()>,
    stream_loop: JoinHandle<()>,
    sessions: TaskTracker,
    liveness: Option<LivenessFlag>,
    command_path: PathBuf,
    stream_path: PathBuf,
}

impl ServerHandle {
    pub fn command_endpoint(&self) -> &Path {
        &self.command_path
    }

    pub fn stream_endpoint(&self) -> &Path {
        &self.stream_path
    }

    /// The token that stops the server. Cancelling it has the same effect as
    /// [`stop`](Self::stop) except that nobody waits for the loops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of stream sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Stop both accept loops, wait for them and every stream session, then
    /// clear the liveness flag.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();

        for (endpoint, task) in [
            ("command", &mut self.command_loop),
            ("stream", &mut self.stream_loop),
        ] {
            if let Err(err) = task.await {
                error!(endpoint, error = %err, "accept loop ended abnormally");
            }
        }

        self.sessions.close();
        self.sessions.wait().await;

        if let Some(flag) = self.liveness.take() {
            flag.clear()?;
        }
        info!("pipe server stopped");
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(flag) = self.liveness.take() {
            if let Err(err) = flag.clear() {
                warn!(error = %err, "failed to clear liveness flag");
            }
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("command", &self.command_path)
            .field("stream", &self.stream_path)
            .field("stopping", &self.cancel.is_cancelled())
            .finish()
    }
}

struct StreamContext {
    handler: Option<Arc<dyn StreamHandler>>,
    io_timeout: Duration,
}

async fn command_loop(
    listener: EndpointListener,
    handler: Arc<dyn CommandHandler>,
    io_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok(stream) => stream,
                Err(err) => {
                    error!(endpoint = "command", error = %err, "accept failed");
                    if cooldown(&cancel).await {
                        break;
                    }
                    continue;
                }
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = serve_command(stream, &handler, io_timeout) => {
                if let Err(err) = result {
                    log_connection_error("command", &err);
                }
            }
        }
    }
    debug!(path = %listener.path().display(), "command loop stopped");
}

async fn stream_loop(
    listener: EndpointListener,
    context: StreamContext,
    limit: Option<Arc<Semaphore>>,
    sessions: TaskTracker,
    cancel: CancellationToken,
) {
    let context = Arc::new(context);
    loop {
        let permit = match &limit {
            Some(semaphore) => tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(semaphore).acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
            },
            None => None,
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok(stream) => {
                    let context = Arc::clone(&context);
                    let session = cancel.child_token();
                    sessions.spawn(async move {
                        if let Err(err) = serve_stream(stream, &context, session).await {
                            log_connection_error("stream", &err);
                        }
                        drop(permit);
                    });
                }
                Err(err) => {
                    error!(endpoint = "stream", error = %err, "accept failed");
                    if cooldown(&cancel).await {
                        break;
                    }
                }
            },
        }
    }
    debug!(path = %listener.path().display(), "stream loop stopped");
}

/// Sleep out the accept error cooldown. Returns `true` if cancelled meanwhile.
async fn cooldown(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(ACCEPT_ERROR_COOLDOWN) => false,
    }
}

async fn serve_command(
    stream: IpcStream,
    handler: &Arc<dyn CommandHandler>,
    io_timeout: Duration,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let Some(request) = read_request(&mut reader, io_timeout).await? else {
        debug!(endpoint = "command", "connection closed without a request");
        return Ok(());
    };
    debug!(command = %request.command, args = request.args.len(), "command received");

    let CommandMessage { command, args, .. } = request;
    let handler = Arc::clone(handler);
    // Aborted if the server stops while the handler is still running.
    let task = AbortOnDropHandle::new(tokio::spawn(async move {
        let reply = handler.handle(&command, &args).await;
        (command, reply)
    }));
    let reply = match task.await {
        Ok((_, Ok(reply))) => reply,
        Ok((command, Err(err))) => {
            warn!(command = %command, error = %err, "command handler failed");
            format!("{ERROR_PREFIX}{err}")
        }
        Err(err) => {
            let reason = join_failure(err);
            error!(reason = %reason, "command handler panicked");
            format!("{ERROR_PREFIX}{reason}")
        }
    };

    let mut writer = FrameWriter::new(write_half);
    match timeout(io_timeout, writer.send_message(&reply)).await {
        Ok(result) => result?,
        Err(_) => return Err(ServerError::Timeout("command reply")),
    }
    writer.shutdown().await?;
    Ok(())
}

async fn serve_stream(
    stream: IpcStream,
    context: &StreamContext,
    session: CancellationToken,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let Some(request) = read_request(&mut reader, context.io_timeout).await? else {
        debug!(endpoint = "stream", "connection closed without a request");
        return Ok(());
    };
    if !request.streaming {
        debug!(command = %request.command, "stream request without streaming flag");
    }

    let (writer, rx) = StreamWriter::channel();
    let pump = tokio::spawn(pump_messages(
        rx,
        FrameWriter::new(write_half),
        context.io_timeout,
        session.clone(),
    ));

    match &context.handler {
        None => {
            writer.send(StreamMessage::error(NO_STREAM_HANDLER).finished());
        }
        Some(handler) => {
            debug!(command = %request.command, "stream session started");
            run_stream_handler(Arc::clone(handler), request, &writer, &session, &mut reader).await;
            debug!("stream session ended");
        }
    }

    writer.close();
    if let Err(err) = pump.await {
        error!(error = %err, "stream writer task failed");
    }
    Ok(())
}

async fn run_stream_handler<R: AsyncRead + Unpin>(
    handler: Arc<dyn StreamHandler>,
    request: CommandMessage,
    writer: &StreamWriter,
    session: &CancellationToken,
    reader: &mut FrameReader<R>,
) {
    let CommandMessage { command, args, .. } = request;
    let mut task = tokio::spawn({
        let writer = writer.clone();
        let session = session.clone();
        async move { handler.handle(command, args, writer, session).await }
    });

    let outcome = tokio::select! {
        outcome = &mut task => outcome,
        _ = detect_client_disconnect(reader.get_mut()) => {
            debug!("stream client disconnected, cancelling handler");
            session.cancel();
            task.await
        }
    };

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => {
            warn!(error = %err, "stream handler failed");
            err.to_string()
        }
        Err(err) => {
            let reason = join_failure(err);
            error!(reason = %reason, "stream handler panicked");
            reason
        }
    };
    writer.send(StreamMessage::error(failure).finished());
}

/// Write queued messages to the client until the stream finishes, the queue
/// closes, or the client goes away.
async fn pump_messages<W: AsyncWrite + Unpin>(
    mut rx: mpsc::UnboundedReceiver<StreamMessage>,
    mut frames: FrameWriter<W>,
    io_timeout: Duration,
    session: CancellationToken,
) {
    while let Some(message) = rx.recv().await {
        let finished = message.finished;
        let result = match timeout(io_timeout, frames.send_message(&message)).await {
            Ok(result) => result.map_err(ServerError::from),
            Err(_) => Err(ServerError::Timeout("stream write")),
        };
        if let Err(err) = result {
            log_connection_error("stream", &err);
            session.cancel();
            return;
        }
        if finished {
            break;
        }
    }
    if let Err(err) = frames.shutdown().await {
        debug!(error = %err, "stream shutdown failed");
    }
}

async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    io_timeout: Duration,
) -> Result<Option<CommandMessage>> {
    match timeout(io_timeout, reader.read_message()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ServerError::Timeout("request")),
    }
}

/// Resolves once the client closed its end (or the socket failed).
///
/// After the request the client only reads, so any EOF on our read half
/// means it is gone.
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "handler was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

fn log_connection_error(endpoint: &'static str, err: &ServerError) {
    if err.is_benign() {
        debug!(endpoint, error = %err, "client went away");
    } else if err.is_protocol() {
        warn!(endpoint, error = %err, "protocol error, dropping connection");
    } else if let ServerError::Timeout(phase) = err {
        warn!(endpoint, phase, "connection timed out");
    } else {
        error!(endpoint, error = %err, "connection error");
    }
}
