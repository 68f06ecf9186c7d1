//! # WebVTT Processor: A Lenient Parser and Serializer for WebVTT Subtitles
//!
//! This crate provides tools for parsing WebVTT subtitle text into structured
//! Rust objects and serializing those objects back into WebVTT. The parser is
//! deliberately lenient: malformed input never aborts a parse. Instead, every
//! problem is recorded as a [`Diagnostic`] and the parser recovers with as much
//! of the document intact as possible.
//!
//! The two primary functions you will use are:
//! - [`parse_webvtt`]: Converts WebVTT text into a [`ParsedWebvtt`] result.
//! - [`generate_webvtt`]: Creates WebVTT text from a list of [`Cue`] values.
//!
//! Cue payload markup (`<v>`, `<i>`, `<ruby>`, timestamps, ...) is parsed into
//! a tree of [`MarkupNode`] values, with entity references decoded against a
//! configurable [`EntityTable`].
//!
//! ## Examples
//!
//! Here is a basic round-trip example showing how to parse a WebVTT string and
//! then generate a new one from the parsed data.
//!
//! ```rust
//! use webvtt_processor::{parse_webvtt, generate_webvtt, WebvttParsingOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let content = "WEBVTT\n\n\
//!         intro\n\
//!         00:00:01.500 --> 00:00:04.000 align:left\n\
//!         <v Fred>Hello <i>world</i>!\n";
//!
//!     let parsed = parse_webvtt(content, &WebvttParsingOptions::default());
//!
//!     assert!(parsed.diagnostics.is_empty());
//!     assert_eq!(parsed.cues.len(), 1);
//!     assert_eq!(parsed.cues[0].id, "intro");
//!     assert_eq!(parsed.cues[0].start_time, 1.5);
//!
//!     let output = generate_webvtt(&parsed.cues, &parsed.styles)?;
//!     assert!(output.starts_with("WEBVTT\n\n"));
//!     assert!(output.contains("00:01.500 --> 00:04.000 align:left"));
//!
//!     Ok(())
//! }
//! ```

pub mod generator;
pub mod parser;

mod error;
mod types;

pub use error::VttError;
pub use generator::generate_webvtt;
pub use parser::{parse_timestamp, parse_webvtt};
pub use types::{
    Cue, CueBuilder, CueDirection, Diagnostic, ElementNode, EntityTable, LineAlignment,
    MarkupNode, ParseMode, ParsedWebvtt, PositionAlignment, TagName, TextAlignment,
    WebvttParsingOptions,
};
