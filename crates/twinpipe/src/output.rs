use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use twinpipe_client::CallResult;
use twinpipe_frame::StreamMessage;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_call_result(result: &CallResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "MESSAGE"])
                .add_row(vec![result.kind.to_string(), result.message.clone()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}: {}", result.kind, result.message),
        OutputFormat::Raw => println!("{}", result.message),
    }
}

pub fn print_stream_message(message: &StreamMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(message),
        OutputFormat::Table | OutputFormat::Pretty => {
            let marker = if message.finished { " (finished)" } else { "" };
            println!("[{}]{} {}", message.kind, marker, message.content);
        }
        OutputFormat::Raw => println!("{}", message.content),
    }
}

#[derive(Serialize)]
pub struct ProbeOutput {
    pub service: String,
    pub command_endpoint: String,
    pub stream_endpoint: String,
    pub liveness_flag: String,
    pub flag_raised: bool,
    pub flag_content: Option<String>,
    pub connected: bool,
}

pub fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["service", out.service.as_str()])
                .add_row(vec!["command endpoint", out.command_endpoint.as_str()])
                .add_row(vec!["stream endpoint", out.stream_endpoint.as_str()])
                .add_row(vec!["liveness flag", out.liveness_flag.as_str()])
                .add_row(vec![
                    "flag",
                    out.flag_content.as_deref().unwrap_or("absent"),
                ])
                .add_row(vec!["connected", if out.connected { "yes" } else { "no" }]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Service {}:", out.service);
            println!("  Command endpoint: {}", out.command_endpoint);
            println!("  Stream endpoint:  {}", out.stream_endpoint);
            println!("  Liveness flag:    {}", out.liveness_flag);
            match &out.flag_content {
                Some(content) => println!("  Flag content:     {content}"),
                None => println!("  Flag content:     absent"),
            }
            println!("  Connected:        {}", out.connected);
        }
        OutputFormat::Raw => {
            println!("{}", if out.connected { "running" } else { "not running" });
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
