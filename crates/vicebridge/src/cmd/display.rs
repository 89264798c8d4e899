use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::json;
use vicebridge_c64::vic;

use crate::cmd::{open, DisplayArgs, PaletteArgs, SessionOpts};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub fn run_display(
    args: DisplayArgs,
    session: &SessionOpts,
    format: OutputFormat,
) -> CliResult<i32> {
    let client = open(session)?;
    let frame = client
        .display(args.indexed)
        .map_err(|err| client_error("display fetch failed", err))?;

    if let Some(path) = &args.save {
        std::fs::write(path, &frame.pixels).map_err(|err| {
            CliError::new(
                INTERNAL,
                format!("failed writing {}: {err}", path.display()),
            )
        })?;
    }

    match format {
        OutputFormat::Json => print_json(
            json!({
                "width": frame.width,
                "height": frame.height,
                "visible": {
                    "x": frame.x_offset,
                    "y": frame.y_offset,
                    "width": frame.inner_width,
                    "height": frame.inner_height,
                },
                "bits_per_pixel": frame.bits_per_pixel,
                "pixel_bytes": frame.pixels.len(),
            }),
            &client.state(),
        ),
        _ => {
            println!(
                "display {}x{} @ {} bpp, visible {}x{} at ({}, {}), {} pixel byte(s)",
                frame.width,
                frame.height,
                frame.bits_per_pixel,
                frame.inner_width,
                frame.inner_height,
                frame.x_offset,
                frame.y_offset,
                frame.pixels.len()
            );
            if let Some(path) = &args.save {
                println!("pixels written to {}", path.display());
            }
        }
    }
    Ok(SUCCESS)
}

pub fn run_palette(
    _args: PaletteArgs,
    session: &SessionOpts,
    format: OutputFormat,
) -> CliResult<i32> {
    let client = open(session)?;
    let palette = client
        .palette()
        .map_err(|err| client_error("palette fetch failed", err))?;

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = palette
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    json!({
                        "index": index,
                        "red": entry.red,
                        "green": entry.green,
                        "blue": entry.blue,
                    })
                })
                .collect();
            print_json(json!({ "palette": entries }), &client.state());
        }
        _ => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INDEX", "RGB", "NAME"]);
            for (index, entry) in palette.iter().enumerate() {
                let name = if index < 16 {
                    vic::color_name(index as u8)
                } else {
                    ""
                };
                table.add_row(vec![
                    index.to_string(),
                    format!("#{:02x}{:02x}{:02x}", entry.red, entry.green, entry.blue),
                    name.to_string(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(SUCCESS)
}
