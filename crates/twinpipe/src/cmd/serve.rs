use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use twinpipe_frame::{StreamMessage, FAIL_PREFIX, UNKNOWN_COMMAND_PREFIX};
use twinpipe_log::LogFanoutDispatcher;
use twinpipe_server::{
    async_trait, command_fn, CancellationToken, CommandHandler, HandlerError, PipeServer,
    StreamHandler, StreamWriter,
};

use crate::cmd::{Context, ServeArgs};
use crate::exit::{server_error, CliResult, SUCCESS};

pub async fn run(_args: ServeArgs, ctx: &Context) -> CliResult<i32> {
    let options = ctx.options();
    let server = PipeServer::new(options, demo_commands()).with_stream_handler(DemoStreams {
        dispatcher: Arc::clone(&ctx.dispatcher),
        next_session: AtomicU64::new(1),
    });

    server
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c, stopping");
            }
            info!("interrupt received, shutting down");
        })
        .await
        .map_err(|err| server_error("serve failed", err))?;

    ctx.dispatcher.dispose();
    Ok(SUCCESS)
}

fn demo_commands() -> impl CommandHandler {
    command_fn(|command: &str, args: &[String]| {
        info!(command, args = args.len(), "command");
        let reply = match command {
            "ping" => "pong".to_string(),
            "echo" => format!("echo: {}", args.join(" ")),
            "fail" => format!("{FAIL_PREFIX}{}", args.join(" ")),
            "error" => return Err(args.join(" ").into()),
            other => format!("{UNKNOWN_COMMAND_PREFIX}{other}"),
        };
        Ok(reply)
    })
}

/// Streams offered by `serve`: `count <n> [delay_ms]` and `logs`.
struct DemoStreams {
    dispatcher: Arc<LogFanoutDispatcher>,
    next_session: AtomicU64,
}

#[async_trait]
impl StreamHandler for DemoStreams {
    async fn handle(
        &self,
        command: String,
        args: Vec<String>,
        writer: StreamWriter,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        match command.as_str() {
            "count" => count(&args, &writer, &cancel).await,
            "logs" => {
                let id = format!(
                    "logs-{}",
                    self.next_session.fetch_add(1, Ordering::Relaxed)
                );
                relay_logs(&self.dispatcher, &id, &writer, &cancel).await;
                Ok(())
            }
            other => {
                writer.send(
                    StreamMessage::error(format!("{UNKNOWN_COMMAND_PREFIX}{other}")).finished(),
                );
                Ok(())
            }
        }
    }
}

async fn count(
    args: &[String],
    writer: &StreamWriter,
    cancel: &CancellationToken,
) -> Result<(), HandlerError> {
    let total: u64 = match args.first() {
        Some(n) => n.parse()?,
        None => 3,
    };
    let delay = match args.get(1) {
        Some(ms) => Duration::from_millis(ms.parse()?),
        None => Duration::ZERO,
    };

    for i in 1..=total {
        if !writer.send(StreamMessage::info(format!("{i}/{total}"))) {
            return Ok(());
        }
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    writer.send(StreamMessage::warning(format!("stopped at {i}/{total}")).finished());
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
    writer.send(StreamMessage::success(format!("counted to {total}")).finished());
    Ok(())
}

async fn relay_logs(
    dispatcher: &LogFanoutDispatcher,
    id: &str,
    writer: &StreamWriter,
    cancel: &CancellationToken,
) {
    writer.send(StreamMessage::info(format!("relaying logs as {id}")));
    if !dispatcher.register(id, Arc::new(writer.clone())) {
        writer.send(StreamMessage::error(format!("log relay {id} already attached")).finished());
        return;
    }
    info!(relay = id, "log relay attached");

    cancel.cancelled().await;

    dispatcher.unregister(id);
    writer.send(StreamMessage::success("log relay closed").finished());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_commands_reply_by_convention() {
        let handler = demo_commands();
        let args = vec!["a".to_string(), "b".to_string()];
        assert_eq!(handler.handle("ping", &[]).await.unwrap(), "pong");
        assert_eq!(handler.handle("echo", &args).await.unwrap(), "echo: a b");
        assert_eq!(handler.handle("fail", &args).await.unwrap(), "Fail: a b");
        assert_eq!(
            handler.handle("frob", &[]).await.unwrap(),
            "UnknownCommand: frob"
        );
        assert_eq!(
            handler.handle("error", &args).await.unwrap_err().to_string(),
            "a b"
        );
    }

    #[tokio::test]
    async fn count_sends_n_messages_then_finishes() {
        let (writer, mut rx) = StreamWriter::channel();
        let cancel = CancellationToken::new();
        count(&["2".to_string()], &writer, &cancel).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), StreamMessage::info("1/2"));
        assert_eq!(rx.recv().await.unwrap(), StreamMessage::info("2/2"));
        let last = rx.recv().await.unwrap();
        assert!(last.finished);
        assert_eq!(last.content, "counted to 2");
    }

    #[tokio::test]
    async fn count_rejects_bad_arguments() {
        let (writer, _rx) = StreamWriter::channel();
        let cancel = CancellationToken::new();
        assert!(count(&["many".to_string()], &writer, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn relay_registers_until_cancelled() {
        let dispatcher = Arc::new(LogFanoutDispatcher::new());
        let (writer, mut rx) = StreamWriter::channel();
        let cancel = CancellationToken::new();

        let relay = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            let writer = writer.clone();
            let cancel = cancel.clone();
            async move { relay_logs(&dispatcher, "logs-1", &writer, &cancel).await }
        });

        assert!(rx.recv().await.unwrap().content.contains("logs-1"));
        while !dispatcher.contains("logs-1") {
            tokio::task::yield_now().await;
        }
        dispatcher.logger("test").info("hello relay");
        assert!(rx.recv().await.unwrap().content.ends_with("test: hello relay"));

        cancel.cancel();
        relay.await.unwrap();
        assert!(!dispatcher.contains("logs-1"));
        assert!(rx.recv().await.unwrap().finished);
    }
}
