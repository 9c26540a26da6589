//! # Peticiona Core
//!
//! Domain types, traits, and error definitions shared by every Peticiona crate.
//! Nothing in here touches the filesystem, templates or rule syntax: this crate
//! defines the vocabulary that the loaders, the rule engine, the formatter and
//! the document editor all speak.
//!
//! ```text
//!   data ──► Record ──► rules ──► ResolvedRecord ──► format ──► document
//!                         │                                       │
//!                         └──────────── Diagnostic ◄──────────────┘
//! ```
//!
//! Fatal problems are `Error` values; recoverable per-field problems are
//! collected as [`Diagnostic`]s and surfaced in the per-record report.

pub mod diagnostic;
pub mod error;
pub mod record;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use diagnostic::Diagnostic;
pub use error::{DataLoadError, Error, Result, SchemaLoadError, TemplateError};
pub use record::{FieldLookup, Record};
pub use value::{FieldValue, parse_bool_word, parse_decimal};
