use std::io::IsTerminal;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::{json, Value};
use vicebridge_client::ConnectionState;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Address/byte values are serialized as `{value, hex}` pairs so callers
/// never have to re-derive one representation from the other.
#[derive(Debug, Serialize)]
pub struct HexValue {
    pub value: u32,
    pub hex: String,
}

pub fn hex_word(value: u16) -> HexValue {
    HexValue {
        value: value as u32,
        hex: format!("0x{value:04x}"),
    }
}

pub fn hex_byte(value: u8) -> HexValue {
    HexValue {
        value: value as u32,
        hex: format!("0x{value:02x}"),
    }
}

/// Attach the connection-state `_meta` block to a JSON payload.
pub fn with_meta(payload: Value, state: &ConnectionState) -> Value {
    let mut value = payload;
    if let Value::Object(map) = &mut value {
        map.insert(
            "_meta".to_string(),
            serde_json::to_value(state).unwrap_or(Value::Null),
        );
    }
    value
}

pub fn print_json(payload: Value, state: &ConnectionState) {
    println!("{}", with_meta(payload, state));
}

/// Structured error object for JSON output.
pub fn error_value(kind: &str, message: &str, suggestion: Option<&str>) -> Value {
    let mut value = json!({
        "isError": true,
        "code": kind,
        "message": message,
    });
    if let Some(suggestion) = suggestion {
        value["suggestion"] = json!(suggestion);
    }
    value
}

/// Hex dump lines in monitor style: address, bytes, decoded text.
pub fn hex_dump(start: u16, data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .enumerate()
        .map(|(i, row)| {
            let addr = start.wrapping_add((i * 16) as u16);
            let bytes: Vec<String> = row.iter().map(|b| format!("{b:02x}")).collect();
            let text: String = row
                .iter()
                .map(|&b| {
                    if (0x20..0x7f).contains(&b) {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!("{addr:04x}: {:<47} |{text}|", bytes.join(" "))
        })
        .collect()
}
