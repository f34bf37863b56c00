// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

use iiopcodec::encoding::cdr::codeset::{ISO646, LATIN1, UCS2_LEVEL1, UTF16, UTF8};

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Load message bytes from a file path or from hex text.
///
/// Whitespace in hex input is ignored.
pub fn load_bytes(input: &str) -> Result<Vec<u8>> {
    let path = Path::new(input);
    if path.is_file() {
        return std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()));
    }
    let hex_text: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&hex_text).with_context(|| format!("Not a file or hex string: {input}"))
}

/// Hex plus printable text of an object key.
pub fn format_key(key: &[u8]) -> String {
    let text: String = key
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    format!("{} ({})", hex::encode(key), text)
}

/// Display name of a codeset id.
pub fn codeset_name(id: u32) -> String {
    match id {
        LATIN1 => "ISO-8859-1".to_string(),
        ISO646 => "ISO-646".to_string(),
        UTF8 => "UTF-8".to_string(),
        UCS2_LEVEL1 => "UCS-2".to_string(),
        UTF16 => "UTF-16".to_string(),
        other => format!("0x{other:08x}"),
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
