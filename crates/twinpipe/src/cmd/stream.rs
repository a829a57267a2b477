use tracing::debug;
use twinpipe_client::PipeClient;
use twinpipe_frame::MessageType;
use twinpipe_server::CancellationToken;

use crate::cmd::{Context, StreamArgs};
use crate::exit::{result_code, CliResult, FAILURE};
use crate::output::{print_call_result, print_stream_message, OutputFormat};

pub async fn run(args: StreamArgs, ctx: &Context) -> CliResult<i32> {
    let client = PipeClient::new(ctx.options());
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling stream");
                cancel.cancel();
            }
        }
    });

    let format = ctx.format;
    let mut last_kind = None;
    let result = client
        .send_streaming_command_with_cancel(
            &args.command,
            args.args.iter().cloned(),
            |message| {
                last_kind = Some(message.kind);
                print_stream_message(message, format);
            },
            &cancel,
        )
        .await;
    interrupt.abort();

    if !result.is_success() {
        match format {
            OutputFormat::Raw => eprintln!("{result}"),
            _ => print_call_result(&result, format),
        }
        return Ok(result_code(result.kind));
    }
    // A stream that ends on an error message failed, even though it ended cleanly.
    if last_kind == Some(MessageType::Error) {
        return Ok(FAILURE);
    }
    Ok(result_code(result.kind))
}
