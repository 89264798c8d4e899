use std::io::Write as _;

use serde_json::json;

use crate::cmd::{open, parse_address, parse_memspace, ReadArgs, SessionOpts, WriteArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS};
use crate::output::{hex_dump, hex_word, print_json, OutputFormat};

pub fn read(args: ReadArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let start = parse_address(&args.start)?;
    let end = match &args.end {
        Some(end) => parse_address(end)?,
        None => start.saturating_add(0xff),
    };
    let space = parse_memspace(&args.space)?;

    let client = open(session)?;
    let data = client
        .read_memory(start, end, space)
        .map_err(|err| client_error("read failed", err))?;

    match format {
        OutputFormat::Json => {
            let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
            print_json(
                json!({
                    "start": hex_word(start),
                    "end": hex_word(end),
                    "length": data.len(),
                    "data": hex,
                }),
                &client.state(),
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(&data);
            let _ = out.flush();
        }
        _ => {
            for line in hex_dump(start, &data) {
                println!("{line}");
            }
        }
    }
    Ok(SUCCESS)
}

pub fn write(args: WriteArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let addr = parse_address(&args.addr)?;
    let bytes = parse_hex_bytes(&args.data)?;
    let space = parse_memspace(&args.space)?;

    let client = open(session)?;
    client
        .write_memory(addr, &bytes, space)
        .map_err(|err| client_error("write failed", err))?;

    match format {
        OutputFormat::Json => print_json(
            json!({
                "addr": hex_word(addr),
                "written": bytes.len(),
            }),
            &client.state(),
        ),
        _ => println!("wrote {} byte(s) at {addr:#06x}", bytes.len()),
    }
    Ok(SUCCESS)
}

fn parse_hex_bytes(input: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(CliError::usage("no data bytes given"));
    }
    if cleaned.len() % 2 != 0 {
        return Err(CliError::usage(
            "hex byte string must have an even number of digits",
        ));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| CliError::usage(format!("invalid hex byte in '{input}'")))
        })
        .collect()
}
