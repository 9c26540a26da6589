//! Error types for the Peticiona domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant; only fatal conditions
//! live here. Recoverable per-field problems are [`crate::Diagnostic`]s.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Peticiona operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Schema errors ---
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaLoadError),

    // --- Data errors ---
    #[error("Data error: {0}")]
    Data(#[from] DataLoadError),

    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// The field definition model could not be built.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("Schema table not found: {}", .path.display())]
    MissingTable { path: PathBuf },

    #[error("Schema table '{table}' has no rows")]
    EmptyTable { table: String },

    #[error("Schema table '{table}' is invalid: {reason}")]
    InvalidTable { table: String, reason: String },

    #[error("Table '{table}' references unknown {entity} '{reference}'")]
    DanglingReference {
        table: String,
        entity: String,
        reference: String,
    },

    #[error("Duplicate field {what} '{value}'")]
    DuplicateField { what: String, value: String },

    #[error("Invalid expression for {owner}: {detail}")]
    InvalidExpression { owner: String, detail: String },

    #[error("Section '{section}' has rows with different conditions")]
    ConflictingRule { section: String },

    #[error("Legacy mapping {} is invalid: {reason}", .path.display())]
    InvalidLegacyMapping { path: PathBuf, reason: String },

    #[error("Cycle among derived fields: {}", .fields.join(" -> "))]
    DerivedFieldCycle { fields: Vec<String> },

    #[error("No usable schema: relational tables failed ({relational}); legacy mapping failed ({legacy})")]
    Unavailable {
        relational: Box<SchemaLoadError>,
        legacy: Box<SchemaLoadError>,
    },
}

/// The record source could not be turned into records.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("Data source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Malformed CSV at line {line}: {reason}")]
    MalformedCsv { line: u64, reason: String },

    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("JSON item {index} is not an object")]
    NotAnObject { index: usize },

    #[error("Data source contains no records")]
    Empty,
}

/// The template package or its structure is unusable.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid template package: {0}")]
    InvalidPackage(String),

    #[error("Template part '{part}' is not well-formed XML: {reason}")]
    MalformedXml { part: String, reason: String },

    #[error("Unresolved section marker '{marker}' in {part}: {reason}")]
    UnresolvedSectionMarker {
        part: String,
        marker: String,
        reason: String,
    },

    #[error("Failed to write output {}: {reason}", .path.display())]
    Output { path: PathBuf, reason: String },
}
