use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use twinpipe_log::LogFanoutDispatcher;
use twinpipe_transport::PipeOptions;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod probe;
pub mod serve;
pub mod stream;
pub mod version;
pub mod wait;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a demo service on both endpoints until interrupted.
    Serve(ServeArgs),
    /// Send one command and print the classified reply.
    Call(CallArgs),
    /// Send one streaming request and print every message.
    Stream(StreamArgs),
    /// Report the liveness flag and probe both endpoints.
    Probe(ProbeArgs),
    /// Wait until the service accepts connections.
    Wait(WaitArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// What every subcommand gets besides its own arguments.
pub struct Context {
    pub format: OutputFormat,
    pub pipe: PipeArgs,
    pub dispatcher: Arc<LogFanoutDispatcher>,
}

impl Context {
    pub fn options(&self) -> PipeOptions {
        self.pipe.to_options()
    }
}

pub async fn run(command: Command, ctx: Context) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, &ctx).await,
        Command::Call(args) => call::run(args, &ctx).await,
        Command::Stream(args) => stream::run(args, &ctx).await,
        Command::Probe(args) => probe::run(args, &ctx).await,
        Command::Wait(args) => wait::run(args, &ctx).await,
        Command::Version(args) => version::run(args),
    }
}

/// Endpoint options, each overridable from the environment.
#[derive(Args, Debug, Clone)]
pub struct PipeArgs {
    /// Service name; endpoint names and the liveness flag derive from it.
    #[arg(long, env = "TWINPIPE_SERVICE", default_value = "twinpipe", global = true)]
    pub service: String,
    /// Command endpoint name or socket path.
    #[arg(long, value_name = "NAME", env = "TWINPIPE_COMMAND_PIPE", global = true)]
    pub command_pipe: Option<String>,
    /// Stream endpoint name or socket path.
    #[arg(long, value_name = "NAME", env = "TWINPIPE_STREAM_PIPE", global = true)]
    pub stream_pipe: Option<String>,
    /// Maximum concurrent stream sessions (-1 for unbounded).
    #[arg(
        long,
        value_name = "N",
        env = "TWINPIPE_MAX_CLIENTS",
        allow_negative_numbers = true,
        global = true
    )]
    pub max_clients: Option<i32>,
    /// Liveness flag file.
    #[arg(long, value_name = "PATH", env = "TWINPIPE_LIVENESS_FLAG", global = true)]
    pub liveness_flag: Option<PathBuf>,
    /// Connect budget in milliseconds.
    #[arg(long, value_name = "MS", env = "TWINPIPE_CONNECT_TIMEOUT_MS", global = true)]
    pub connect_timeout_ms: Option<u64>,
    /// Budget for each read or write in milliseconds.
    #[arg(long, value_name = "MS", env = "TWINPIPE_IO_TIMEOUT_MS", global = true)]
    pub io_timeout_ms: Option<u64>,
}

impl PipeArgs {
    pub fn to_options(&self) -> PipeOptions {
        let mut options = PipeOptions::for_service(&self.service);
        if let Some(name) = &self.command_pipe {
            options.command_pipe_name = name.clone();
        }
        if let Some(name) = &self.stream_pipe {
            options.stream_pipe_name = name.clone();
        }
        if let Some(max_clients) = self.max_clients {
            options.max_clients = max_clients;
        }
        if let Some(path) = &self.liveness_flag {
            options.liveness_flag_path = path.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            options.connection_timeout_ms = ms;
        }
        if let Some(ms) = self.io_timeout_ms {
            options.read_write_timeout_ms = ms;
        }
        options
    }
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Command name.
    pub command: String,
    /// Command arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Retry this many times on timeout or connection errors.
    #[arg(long, default_value = "0")]
    pub retries: u32,
    /// Pause between retries (e.g. 500ms, 2s).
    #[arg(long, default_value = "200ms", value_parser = duration_arg)]
    pub retry_delay: Duration,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Stream command name.
    pub command: String,
    /// Command arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ProbeArgs {}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Give up after this long (e.g. 10s, 500ms, 1m).
    #[arg(long, default_value = "10s", value_parser = duration_arg)]
    pub timeout: Duration,
    /// Probe interval.
    #[arg(long, default_value = "250ms", value_parser = duration_arg)]
    pub interval: Duration,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Clap value parser for `<n>ms`, `<n>s`, `<n>m` or a bare number of seconds.
fn duration_arg(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("expected a duration like 500ms or 2s, got {input:?}"))?;
    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        other => return Err(format!("unknown duration unit {other:?} (use ms, s or m)")),
    };
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
