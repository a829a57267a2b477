use twinpipe_client::PipeClient;
use twinpipe_transport::read_flag;

use crate::cmd::{Context, ProbeArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_probe, ProbeOutput};

pub async fn run(_args: ProbeArgs, ctx: &Context) -> CliResult<i32> {
    let options = ctx.options();
    let client = PipeClient::new(options.clone());

    let flag_content = read_flag(&options.liveness_flag_path);
    let connected = client.test_connection().await;

    let out = ProbeOutput {
        service: ctx.pipe.service.clone(),
        command_endpoint: options.command_endpoint().display().to_string(),
        stream_endpoint: options.stream_endpoint().display().to_string(),
        liveness_flag: options.liveness_flag_path.display().to_string(),
        flag_raised: flag_content.is_some(),
        flag_content,
        connected,
    };
    print_probe(&out, ctx.format);

    // The flag alone can be stale; only a successful connect counts.
    Ok(if connected { SUCCESS } else { HEALTH_CHECK_FAILED })
}
