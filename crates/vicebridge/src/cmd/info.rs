use std::time::Instant;

use serde_json::json;

use crate::cmd::{open, InfoArgs, SessionOpts};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub fn run(_args: InfoArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let client = open(session)?;
    let started = Instant::now();
    client
        .ping()
        .map_err(|err| client_error("ping failed", err))?;
    let ping_ms = started.elapsed().as_secs_f64() * 1000.0;
    let state = client.state();

    match format {
        OutputFormat::Json => print_json(
            json!({
                "protocol": client.config().protocol.name,
                "ping_ms": ping_ms,
            }),
            &state,
        ),
        _ => {
            println!(
                "connected to {}:{} (protocol {})",
                state.host,
                state.port,
                client.config().protocol.name
            );
            println!("running: {}", state.running);
            println!("ping: {ping_ms:.1} ms");
        }
    }
    Ok(SUCCESS)
}
