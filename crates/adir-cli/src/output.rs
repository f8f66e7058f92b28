//! Shared rendering for the three `--output` modes every subcommand
//! supports: human-readable text, pretty JSON, and the raw bytes a
//! script would want to pipe onward.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Raw,
}

/// Render `value` per `format`. `text` is produced by `to_text`, `raw`
/// by `to_raw` — both only called for the formats that need them, so a
/// subcommand whose raw form is nonsensical (e.g. `list`) can simply
/// fall back to its text rendering.
pub fn render<T: Serialize>(format: OutputFormat, value: &T, to_text: impl FnOnce() -> String) {
    match format {
        OutputFormat::Text => println!("{}", to_text()),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("failed to render JSON: {e}"),
        },
        OutputFormat::Raw => println!("{}", to_text()),
    }
}

pub fn render_raw_bytes(format: OutputFormat, bytes: &[u8], to_text: impl FnOnce(&[u8]) -> String) {
    match format {
        OutputFormat::Raw => {
            use std::io::Write;
            let _ = std::io::stdout().write_all(bytes);
        }
        _ => println!("{}", to_text(bytes)),
    }
}
