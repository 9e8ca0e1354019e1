//! Hex helpers for key material

use anyhow::Result;
use clap::Subcommand;

use lwm2m_console_common::hex::{from_hex, to_hex};

#[derive(Subcommand)]
pub enum HexCommands {
    /// Encode text as uppercase hex
    Encode {
        /// Text to encode, taken as UTF-8 bytes
        text: String,
    },

    /// Decode hex into text
    Decode {
        /// Hex string (even length, case-insensitive)
        hex: String,
    },
}

pub fn execute(cmd: HexCommands) -> Result<()> {
    match cmd {
        HexCommands::Encode { text } => println!("{}", to_hex(text.as_bytes())),
        HexCommands::Decode { hex } => println!("{}", decode_text(&hex)?),
    }
    Ok(())
}

/// Decoded bytes as text, with invalid UTF-8 replaced
fn decode_text(hex: &str) -> Result<String> {
    let bytes = from_hex(hex)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
