use serde_json::json;
use vicebridge_c64::petscii;
use vicebridge_client::MemSpace;

use crate::cmd::{open, ScreenArgs, SessionOpts};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{hex_word, print_json, OutputFormat};

pub fn run(args: ScreenArgs, session: &SessionOpts, format: OutputFormat) -> CliResult<i32> {
    let start = petscii::SCREEN_BASE;
    let end = start + (petscii::SCREEN_WIDTH * petscii::SCREEN_HEIGHT) as u16 - 1;

    let client = open(session)?;
    let data = client
        .read_memory(start, end, MemSpace::Main)
        .map_err(|err| client_error("screen read failed", err))?;
    let rows = petscii::decode_screen(&data, args.lowercase);

    match format {
        OutputFormat::Json => print_json(
            json!({
                "base": hex_word(start),
                "lowercase": args.lowercase,
                "rows": rows,
            }),
            &client.state(),
        ),
        _ => {
            for row in rows {
                println!("{row}");
            }
        }
    }
    Ok(SUCCESS)
}
