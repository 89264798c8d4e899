mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, SessionOpts};
use crate::logging::{LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "vicebridge", version, about = "C64 binary monitor bridge")]
struct Cli {
    /// Monitor host.
    #[arg(long, default_value = "127.0.0.1", global = true)]
    host: String,

    /// Monitor TCP port.
    #[arg(long, default_value_t = 6502, global = true)]
    port: u16,

    /// Protocol generation the peer speaks (v1, v2 or v3).
    #[arg(long, default_value = "v2", global = true)]
    protocol: String,

    /// Per-call response timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let session = SessionOpts {
        host: cli.host,
        port: cli.port,
        protocol: cli.protocol,
        timeout: cli.timeout,
    };

    match cmd::run(cli.command, &session, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if matches!(format, OutputFormat::Json) {
                println!(
                    "{}",
                    output::error_value(&err.kind, &err.message, err.suggestion.as_deref())
                );
            } else {
                eprintln!("error: {err}");
                if let Some(hint) = &err.suggestion {
                    eprintln!("hint: {hint}");
                }
            }
            std::process::exit(err.code);
        }
    }
}
