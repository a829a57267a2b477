use tracing::warn;
use twinpipe_client::{PipeClient, ResultKind};

use crate::cmd::{CallArgs, Context};
use crate::exit::{result_code, CliResult};
use crate::output::print_call_result;

pub async fn run(args: CallArgs, ctx: &Context) -> CliResult<i32> {
    let client = PipeClient::new(ctx.options());

    let mut attempt = 0;
    let result = loop {
        let result = client.send_command(&args.command, args.args.iter().cloned()).await;
        if attempt >= args.retries || !is_retryable(result.kind) {
            break result;
        }
        attempt += 1;
        warn!(attempt, kind = %result.kind, message = %result.message, "call failed, retrying");
        tokio::time::sleep(args.retry_delay).await;
    };

    print_call_result(&result, ctx.format);
    Ok(result_code(result.kind))
}

/// Transient outcomes worth another attempt. A service that is not running
/// or rejects the command will answer the same way again.
fn is_retryable(kind: ResultKind) -> bool {
    matches!(kind, ResultKind::Timeout | ResultKind::ConnectionError)
}
