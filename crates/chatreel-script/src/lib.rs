//! # chatreel-script
//!
//! Parses a line-oriented conversation script into ordered messages and the
//! special elements (inline images, the suggestion widget) anchored between them.

pub mod parser;

pub use parser::{classify_line, required_asset_keys, ParsedScript, ScriptLine, ScriptParser, WIDGET_TOKEN};
