use serde_json::json;
use vicebridge_c64::disasm;
use vicebridge_client::MemSpace;

use crate::cmd::{open, parse_address, DisasmArgs, SessionOpts};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{hex_word, print_json, OutputFormat};

pub fn run(args: DisasmArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let start = parse_address(&args.start)?;
    let length = args.length.max(1);
    let end = start.saturating_add(length - 1);

    let client = open(session)?;
    let data = client
        .read_memory(start, end, MemSpace::Main)
        .map_err(|err| client_error("read failed", err))?;
    let listing = disasm::disassemble(&data, start);

    match format {
        OutputFormat::Json => {
            let mut offset = 0usize;
            let items: Vec<_> = listing
                .iter()
                .map(|instruction| {
                    let bytes = &data[offset..offset + instruction.len as usize];
                    offset += instruction.len as usize;
                    json!({
                        "address": hex_word(instruction.address),
                        "bytes": bytes.iter().map(|b| format!("{b:02x}")).collect::<String>(),
                        "text": instruction.to_string(),
                    })
                })
                .collect();
            print_json(json!({ "listing": items }), &client.state());
        }
        _ => {
            let mut offset = 0usize;
            for instruction in &listing {
                let bytes = &data[offset..offset + instruction.len as usize];
                offset += instruction.len as usize;
                let byte_column: Vec<String> =
                    bytes.iter().map(|b| format!("{b:02x}")).collect();
                println!(
                    "{:04x}  {:<8}  {}",
                    instruction.address,
                    byte_column.join(" "),
                    instruction
                );
            }
        }
    }
    Ok(SUCCESS)
}
