use twinpipe_client::PipeClient;

use crate::cmd::{Context, WaitArgs};
use crate::exit::{CliError, CliResult, SUCCESS, TIMEOUT};

pub async fn run(args: WaitArgs, ctx: &Context) -> CliResult<i32> {
    let client = PipeClient::new(ctx.options());

    if client.wait_for_service(args.timeout, args.interval).await {
        Ok(SUCCESS)
    } else {
        Err(CliError::new(
            TIMEOUT,
            format!("service did not come up within {:?}", args.timeout),
        ))
    }
}
