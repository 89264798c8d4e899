use serde_json::json;
use vicebridge_client::MonitorClient;

use crate::cmd::{open, GoArgs, ResetArgs, RetArgs, SessionOpts, StepArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub fn step(args: StepArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let client = open(session)?;
    client
        .step(args.count, args.over)
        .map_err(|err| client_error("step failed", err))?;
    finish(
        &client,
        format,
        &format!(
            "stepped {} instruction(s){}",
            args.count,
            if args.over { " (over calls)" } else { "" }
        ),
    )
}

pub fn go(_args: GoArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let client = open(session)?;
    client
        .resume()
        .map_err(|err| client_error("continue failed", err))?;
    finish(&client, format, "execution resumed")
}

pub fn ret(_args: RetArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let client = open(session)?;
    client
        .execute_until_return()
        .map_err(|err| client_error("run-to-return failed", err))?;
    finish(&client, format, "running until the current subroutine returns")
}

pub fn reset(args: ResetArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let client = open(session)?;
    client
        .reset(args.hard)
        .map_err(|err| client_error("reset failed", err))?;
    finish(
        &client,
        format,
        if args.hard {
            "hard reset issued"
        } else {
            "soft reset issued"
        },
    )
}

fn finish(client: &MonitorClient, format: OutputFormat, message: &str) -> CliResult<i32> {
    let state = client.state();
    match format {
        OutputFormat::Json => print_json(json!({ "status": message }), &state),
        _ => println!("{message} (running: {})", state.running),
    }
    Ok(SUCCESS)
}
