use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("twinpipe {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: twinpipe");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("TWINPIPE_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "frame: i32-le length prefix, max {} bytes, json payload",
        twinpipe_frame::MAX_FRAME_LEN
    );
    println!("endpoints: unix domain sockets in {}", twinpipe_transport::runtime_dir().display());

    Ok(SUCCESS)
}
