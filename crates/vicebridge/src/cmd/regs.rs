use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::json;
use vicebridge_client::{RegisterId, Registers};

use crate::cmd::{open, parse_address, parse_memspace, RegsArgs, SessionOpts};
use crate::exit::{client_error, CliError, CliResult, SUCCESS};
use crate::output::{hex_byte, hex_word, print_json, OutputFormat};

pub fn run(args: RegsArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let space = parse_memspace(&args.space)?;
    let assignments = parse_assignments(&args.set)?;

    let client = open(session)?;
    if !assignments.is_empty() {
        client
            .set_registers(&assignments, space)
            .map_err(|err| client_error("register write failed", err))?;
    }
    let registers = client
        .registers(space)
        .map_err(|err| client_error("register read failed", err))?;

    match format {
        OutputFormat::Json => print_json(
            json!({
                "a": hex_byte(registers.a),
                "x": hex_byte(registers.x),
                "y": hex_byte(registers.y),
                "sp": hex_byte(registers.sp),
                "pc": hex_word(registers.pc),
                "flags": {
                    "bits": registers.flags.bits(),
                    "text": registers.flags.to_string(),
                },
            }),
            &client.state(),
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PC", "A", "X", "Y", "SP", "FLAGS"])
                .add_row(vec![
                    format!("{:04x}", registers.pc),
                    format!("{:02x}", registers.a),
                    format!("{:02x}", registers.x),
                    format!("{:02x}", registers.y),
                    format!("{:02x}", registers.sp),
                    registers.flags.to_string(),
                ]);
            println!("{table}");
        }
        _ => print_pretty(&registers),
    }
    Ok(SUCCESS)
}

fn print_pretty(registers: &Registers) {
    println!(
        "pc={:04x} a={:02x} x={:02x} y={:02x} sp={:02x} flags={}",
        registers.pc, registers.a, registers.x, registers.y, registers.sp, registers.flags
    );
}

fn parse_assignments(pairs: &[String]) -> CliResult<Vec<(RegisterId, u16)>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                CliError::usage(format!("expected name=value, got '{pair}'"))
            })?;
            let id: RegisterId = name.trim().parse().map_err(CliError::usage)?;
            let value = parse_address(value.trim())?;
            Ok((id, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_parse_names_and_values() {
        let parsed = parse_assignments(&["pc=0xc000".to_string(), "a=7".to_string()]).unwrap();
        assert_eq!(parsed, vec![(RegisterId::Pc, 0xc000), (RegisterId::A, 7)]);
    }

    #[test]
    fn malformed_assignments_are_usage_errors() {
        assert!(parse_assignments(&["pc".to_string()]).is_err());
        assert!(parse_assignments(&["q=1".to_string()]).is_err());
        assert!(parse_assignments(&["pc=zz".to_string()]).is_err());
    }
}
