use std::future::Future;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use twinpipe_frame::{decode_message, CommandMessage, FrameReader, FrameWriter, StreamMessage};
use twinpipe_transport::{connect, is_raised, IpcStream, PipeOptions};

use crate::error::{ClientError, Result};
use crate::result::CallResult;

/// Upper bound on the connect budget of a connection probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Talks to a twinpipe service: one connection per call, no retries.
///
/// Every public call returns a [`CallResult`]; transport and protocol
/// failures are folded into its [`ResultKind`](crate::ResultKind).
#[derive(Debug, Clone)]
pub struct PipeClient {
    options: PipeOptions,
}

impl PipeClient {
    pub fn new(options: PipeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipeOptions {
        &self.options
    }

    /// Send one command and classify the reply.
    pub async fn send_command<I, S>(&self, command: &str, args: I) -> CallResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = CommandMessage::new(command, args);
        match self.call_command(&request).await {
            Ok(reply) => CallResult::from_reply(reply),
            Err(err) => {
                debug!(command, error = %err, "command call failed");
                err.into()
            }
        }
    }

    /// Send one streaming request, calling `on_message` for every message
    /// received, the finished one included.
    ///
    /// Ends with `Success` and the finished message's content, or `Failure`
    /// if the stream breaks off or carries something undecodable.
    pub async fn send_streaming_command<I, S, F>(
        &self,
        command: &str,
        args: I,
        mut on_message: F,
    ) -> CallResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&StreamMessage),
    {
        let request = CommandMessage::streaming(command, args);
        match self.call_streaming(&request, &mut on_message).await {
            Ok(content) => CallResult::success(content),
            Err(err) => {
                debug!(command, error = %err, "streaming call failed");
                err.into()
            }
        }
    }

    /// Like [`send_streaming_command`](Self::send_streaming_command), but
    /// gives up with `Failure("stream cancelled")` once `cancel` fires.
    pub async fn send_streaming_command_with_cancel<I, S, F>(
        &self,
        command: &str,
        args: I,
        mut on_message: F,
        cancel: &CancellationToken,
    ) -> CallResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&StreamMessage),
    {
        let request = CommandMessage::streaming(command, args);
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.call_streaming(&request, &mut on_message) => result,
        };
        match result {
            Ok(content) => CallResult::success(content),
            Err(err) => {
                debug!(command, error = %err, "streaming call ended");
                err.into()
            }
        }
    }

    /// Connect to both endpoints and disconnect without sending anything.
    ///
    /// This is the authoritative liveness check.
    pub async fn test_connection(&self) -> bool {
        let budget = self.options.connection_timeout().min(PROBE_TIMEOUT);
        for name in [&self.options.command_pipe_name, &self.options.stream_pipe_name] {
            if let Err(err) = connect_within(name, budget).await {
                trace!(endpoint = %name, error = %err, "probe failed");
                return false;
            }
        }
        true
    }

    /// Whether the service's liveness flag is present. Cheap but may be stale.
    pub fn is_service_running(&self) -> bool {
        is_raised(&self.options.liveness_flag_path)
    }

    /// Probe every `interval` until the service answers or `timeout` elapses.
    pub async fn wait_for_service(&self, timeout: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.test_connection().await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }

    async fn call_command(&self, request: &CommandMessage) -> Result<String> {
        let io_timeout = self.options.read_write_timeout();
        let stream =
            connect_within(&self.options.command_pipe_name, self.options.connection_timeout())
                .await?;
        let (read_half, write_half) = stream.into_split();

        let mut writer = FrameWriter::new(write_half);
        within(io_timeout, "request write", writer.send_message(request)).await?;

        let mut reader = FrameReader::new(read_half);
        let len = within(io_timeout, "reply header", reader.read_header())
            .await?
            .ok_or(ClientError::Closed("reply"))?;
        let payload = within(io_timeout, "reply payload", reader.read_payload(len)).await?;
        Ok(decode_message::<String>(&payload)?)
    }

    async fn call_streaming<F>(&self, request: &CommandMessage, on_message: &mut F) -> Result<String>
    where
        F: FnMut(&StreamMessage),
    {
        let io_timeout = self.options.read_write_timeout();
        let stream =
            connect_within(&self.options.stream_pipe_name, self.options.connection_timeout())
                .await?;
        // The write half stays open for the whole call: the server treats
        // EOF on the request side as the client going away.
        let (read_half, write_half) = stream.into_split();

        let mut writer = FrameWriter::new(write_half);
        within(io_timeout, "request write", writer.send_message(request)).await?;

        read_stream(FrameReader::new(read_half), io_timeout, on_message).await
    }
}

async fn read_stream<R, F>(mut reader: FrameReader<R>, io_timeout: Duration, on_message: &mut F) -> Result<String>
where
    R: AsyncRead + Unpin,
    F: FnMut(&StreamMessage),
{
    loop {
        // Streams are long-lived: only the payload read is bounded.
        let Some(len) = reader.read_header().await? else {
            return Err(ClientError::Closed("finished message"));
        };
        let payload = within(io_timeout, "stream payload", reader.read_payload(len)).await?;
        let message: StreamMessage = decode_message(&payload)?;
        on_message(&message);
        if message.finished {
            return Ok(message.content);
        }
    }
}

async fn connect_within(name: &str, budget: Duration) -> Result<IpcStream> {
    match timeout(budget, connect(name)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::Timeout("connect")),
    }
}

async fn within<T, E>(
    budget: Duration,
    phase: &'static str,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    ClientError: From<E>,
{
    match timeout(budget, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::Timeout(phase)),
    }
}
