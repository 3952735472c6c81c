//! Formatting engine for Clausewitz mod scripts
//!
//! Reformats the brace-delimited key/value script files used by
//! Paradox-style strategy game mods into a canonical layout while
//! preserving comments and the author's blank-line structure.
//! Formatting is idempotent.
//!
//! # Example
//!
//! ```
//! use pdxfmt_core::{format, FormatOptions};
//!
//! let source = "country_event = {\nid = 1000\ndays = 30\n}";
//! let options = FormatOptions::default();
//! let formatted = format(source, &options).unwrap();
//!
//! assert_eq!(formatted, "country_event = {\n    id = 1000\n    days = 30\n}\n");
//! ```

pub mod ast;
pub mod config;
pub mod format;
pub mod parser;
pub mod token;

pub use config::{CONFIG_DEFAULT_NAME, Config, ConfigError, ConfigTree, FormatOptions, FormatOptionsOverride};
pub use format::{format, needs_format};
pub use parser::ParseError;
