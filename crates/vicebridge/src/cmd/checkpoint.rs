use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::json;
use vicebridge_client::{Checkpoint, CheckpointKind, CheckpointOptions, ConnectionState};

use crate::cmd::{
    open, parse_address, BreakAction, BreakArgs, BreakSetArgs, SessionOpts, WatchArgs,
};
use crate::exit::{client_error, CliError, CliResult, SUCCESS};
use crate::output::{hex_word, print_json, OutputFormat};

pub fn run_break(args: BreakArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    match args.action {
        BreakAction::Set(set) => set_breakpoint(set, session, format),
        BreakAction::Delete { id } => {
            let client = open(session)?;
            client
                .delete_checkpoint(id)
                .map_err(|err| client_error("delete failed", err))?;
            match format {
                OutputFormat::Json => print_json(json!({ "deleted": id }), &client.state()),
                _ => println!("checkpoint {id} deleted"),
            }
            Ok(SUCCESS)
        }
        BreakAction::Toggle { id, off } => {
            let client = open(session)?;
            client
                .toggle_checkpoint(id, !off)
                .map_err(|err| client_error("toggle failed", err))?;
            match format {
                OutputFormat::Json => {
                    print_json(json!({ "id": id, "enabled": !off }), &client.state())
                }
                _ => println!(
                    "checkpoint {id} {}",
                    if off { "disabled" } else { "enabled" }
                ),
            }
            Ok(SUCCESS)
        }
        BreakAction::List => {
            let client = open(session)?;
            let checkpoints = client.checkpoints();
            print_list(&checkpoints, &client.state(), format);
            Ok(SUCCESS)
        }
    }
}

fn set_breakpoint(
    args: BreakSetArgs,
    session: &SessionOpts,
    format: OutputFormat,
) -> CliResult<i32> {
    let start = parse_address(&args.start)?;
    let end = match &args.end {
        Some(end) => parse_address(end)?,
        None => start,
    };

    let client = open(session)?;
    let checkpoint = client
        .set_breakpoint(
            start,
            end,
            CheckpointOptions {
                enabled: !args.disabled,
                temporary: args.temporary,
                ..CheckpointOptions::default()
            },
        )
        .map_err(|err| client_error("breakpoint failed", err))?;
    print_one(&checkpoint, &client.state(), format);
    Ok(SUCCESS)
}

pub fn run_watch(args: WatchArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let start = parse_address(&args.start)?;
    let end = match &args.end {
        Some(end) => parse_address(end)?,
        None => start,
    };
    let kind: CheckpointKind = args.kind.parse().map_err(CliError::usage)?;

    let client = open(session)?;
    let checkpoint = client
        .set_watchpoint(
            start,
            end,
            kind,
            CheckpointOptions {
                temporary: args.temporary,
                ..CheckpointOptions::default()
            },
        )
        .map_err(|err| client_error("watchpoint failed", err))?;
    print_one(&checkpoint, &client.state(), format);
    Ok(SUCCESS)
}

fn print_one(checkpoint: &Checkpoint, state: &ConnectionState, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(
            json!({
                "id": checkpoint.id,
                "start": hex_word(checkpoint.start),
                "end": hex_word(checkpoint.end),
                "kind": checkpoint.kind,
                "enabled": checkpoint.enabled,
                "temporary": checkpoint.temporary,
            }),
            state,
        ),
        _ => println!(
            "checkpoint {} set at {:#06x}..{:#06x} ({:?}{}{})",
            checkpoint.id,
            checkpoint.start,
            checkpoint.end,
            checkpoint.kind,
            if checkpoint.enabled { "" } else { ", disabled" },
            if checkpoint.temporary {
                ", temporary"
            } else {
                ""
            },
        ),
    }
}

fn print_list(checkpoints: &[Checkpoint], state: &ConnectionState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = checkpoints
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "start": hex_word(c.start),
                        "end": hex_word(c.end),
                        "kind": c.kind,
                        "enabled": c.enabled,
                        "temporary": c.temporary,
                        "hits": c.hit_count,
                    })
                })
                .collect();
            print_json(json!({ "checkpoints": items }), state);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "RANGE", "KIND", "ENABLED", "TEMP", "HITS"]);
            for c in checkpoints {
                table.add_row(vec![
                    c.id.to_string(),
                    format!("{:04x}..{:04x}", c.start, c.end),
                    format!("{:?}", c.kind).to_lowercase(),
                    c.enabled.to_string(),
                    c.temporary.to_string(),
                    c.hit_count.to_string(),
                ]);
            }
            println!("{table}");
        }
        _ => {
            if checkpoints.is_empty() {
                println!("no checkpoints tracked");
            }
            for c in checkpoints {
                println!(
                    "{}: {:04x}..{:04x} {:?} enabled={} temp={} hits={}",
                    c.id, c.start, c.end, c.kind, c.enabled, c.temporary, c.hit_count
                );
            }
        }
    }
}
