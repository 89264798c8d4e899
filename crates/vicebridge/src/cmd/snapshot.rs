use serde_json::json;

use crate::cmd::{open, AutostartArgs, SessionOpts, SnapshotAction, SnapshotArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub fn run(args: SnapshotArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let client = open(session)?;
    let (verb, path) = match &args.action {
        SnapshotAction::Save { path } => {
            client
                .save_snapshot(path)
                .map_err(|err| client_error("snapshot save failed", err))?;
            ("saved", path)
        }
        SnapshotAction::Load { path } => {
            client
                .load_snapshot(path)
                .map_err(|err| client_error("snapshot load failed", err))?;
            ("loaded", path)
        }
    };

    match format {
        OutputFormat::Json => print_json(
            json!({ "snapshot": verb, "path": path }),
            &client.state(),
        ),
        _ => println!("snapshot {verb}: {path}"),
    }
    Ok(SUCCESS)
}

pub fn autostart(
    args: AutostartArgs,
    session: &SessionOpts,
    format: OutputFormat,
) -> CliResult<i32> {
    let client = open(session)?;
    client
        .autostart(&args.path, !args.no_run, args.index)
        .map_err(|err| client_error("autostart failed", err))?;

    match format {
        OutputFormat::Json => print_json(
            json!({
                "autostarted": args.path,
                "run": !args.no_run,
                "index": args.index,
            }),
            &client.state(),
        ),
        _ => println!(
            "autostarted {} ({})",
            args.path,
            if args.no_run { "load only" } else { "run" }
        ),
    }
    Ok(SUCCESS)
}
