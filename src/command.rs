//! Command codec: converts a user-configured command description into the
//! raw byte buffer written to a characteristic, and back into display text
//! for property-inspector feedback.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// What the command does once the characteristic is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Write,
    Read,
    Notify,
}

/// How the payload in [`Command::data`] must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFormat {
    Hex,
    Text,
    Bytes,
    /// Catch-all for format values this version does not know. Parsing a
    /// command with this format always fails, never silently defaults.
    #[serde(other)]
    Unknown,
}

/// Payload shape depends on the declared format: a string for hex/text, an
/// explicit byte list for bytes. The format decides which one is legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandData {
    Bytes(Vec<u8>),
    Text(String),
}

/// A user-configured command, persisted inside the per-button settings as
/// `{type, data, format}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub data: CommandData,
    pub format: CommandFormat,
}

/// Produces the exact byte sequence to send over the wire.
///
/// The payload must match the declared format; there is no coercion across
/// formats. Hex payloads are expected to have passed [`validate_hex`] first.
pub fn parse_command(command: &Command) -> Result<Vec<u8>, BridgeError> {
    match command.format {
        CommandFormat::Hex => match &command.data {
            CommandData::Text(hex) => Ok(hex_to_bytes(hex)),
            CommandData::Bytes(_) => Err(BridgeError::PayloadMismatch("hex")),
        },
        CommandFormat::Text => match &command.data {
            CommandData::Text(text) => Ok(text.as_bytes().to_vec()),
            CommandData::Bytes(_) => Err(BridgeError::PayloadMismatch("text")),
        },
        CommandFormat::Bytes => match &command.data {
            CommandData::Bytes(bytes) => Ok(bytes.clone()),
            CommandData::Text(_) => Err(BridgeError::PayloadMismatch("bytes")),
        },
        CommandFormat::Unknown => Err(BridgeError::UnknownCommandFormat),
    }
}

/// Decodes a hex string into bytes.
///
/// Whitespace and an optional `0x` prefix are stripped, and an odd digit
/// count is left-padded with a single zero nibble ("ABC" decodes as "0ABC").
/// The input is assumed to have passed [`validate_hex`]; digit pairs that do
/// not parse decode as zero rather than erroring.
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    let mut digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.starts_with("0x") || digits.starts_with("0X") {
        digits.drain(..2);
    }
    if digits.len() % 2 != 0 {
        digits.insert(0, '0');
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .unwrap_or(0)
        })
        .collect()
}

/// Checks that a hex payload contains only hex digits once whitespace and an
/// optional `0x` prefix are removed. Callers are expected to run this before
/// [`hex_to_bytes`].
pub fn validate_hex(hex: &str) -> bool {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Renders a byte buffer as uppercase two-digit groups separated by single
/// spaces, e.g. `[0x0a, 0xbc]` -> `"0A BC"`.
pub fn bytes_to_hex(buffer: &[u8]) -> String {
    buffer
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-readable rendering of a command for logs and UI feedback.
pub fn format_for_display(command: &Command) -> String {
    match (command.format, &command.data) {
        (CommandFormat::Hex, CommandData::Text(hex)) => format!("Hex: {hex}"),
        (CommandFormat::Text, CommandData::Text(text)) => format!("Text: \"{text}\""),
        (CommandFormat::Bytes, CommandData::Bytes(bytes)) => {
            let list = bytes
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("Bytes: [{list}]")
        }
        _ => "Unknown format".to_string(),
    }
}
