//! Schema validation for table CSV files.
//!
//! A table file starts with five metadata records followed by data:
//!
//! ```text
//! row 0   version (all fields, joined back with commas)
//! row 1   reserved
//! row 2   column names      -> defines the column count
//! row 3   column types      -> must match the column count
//! row 4   column descriptions
//! row 5+  data rows         -> must match the column count
//! ```
//!
//! Validation is a pure function of the (already chunk-normalized) content.

pub mod dialect;
pub mod reserved;

use dialect::grammar_for;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tp_common::{basename, Dialect};

/// Number of metadata records every table must have.
pub const METADATA_ROWS: usize = 5;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern compiles")
});

/// Why a table file was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file[{file}] - unreadable csv: {message}")]
    Parse { file: String, message: String },

    #[error("file[{file}] - missing metadata")]
    MissingMetadata { file: String },

    #[error("file[{file}] - cannot have 0 columns")]
    ZeroColumns { file: String },

    #[error("file[{file}] - column types[{types}] != columns[{columns}]")]
    TypeCountMismatch {
        file: String,
        types: usize,
        columns: usize,
    },

    #[error("file[{file}] - invalid data type[{token}] for {dialect} CSV")]
    InvalidType {
        file: String,
        token: String,
        dialect: Dialect,
    },

    #[error("file[{file}] - data line[{row}] fields[{fields}] != columns[{columns}]")]
    RowWidth {
        file: String,
        row: usize,
        fields: usize,
        columns: usize,
    },

    #[error("file[{file}] - table name[{name}] not allowed")]
    InvalidTableName { file: String, name: String },

    #[error("file[{file}] - table name[{name}] is a reserved word")]
    ReservedTableName { file: String, name: String },

    #[error("file[{file}] - column name[{column}] not allowed")]
    InvalidColumnName { file: String, column: String },
}

impl ValidationError {
    /// Short, comma-free label used in status text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "unparseable",
            Self::MissingMetadata { .. } => "missing metadata",
            Self::ZeroColumns { .. } => "zero columns",
            Self::TypeCountMismatch { .. } => "type count mismatch",
            Self::InvalidType { .. } => "invalid type",
            Self::RowWidth { .. } => "column count mismatch",
            Self::InvalidTableName { .. } => "invalid table name",
            Self::ReservedTableName { .. } => "reserved table name",
            Self::InvalidColumnName { .. } => "invalid column name",
        }
    }
}

impl From<ValidationError> for tp_common::Error {
    fn from(err: ValidationError) -> Self {
        tp_common::Error::Validation(err.to_string())
    }
}

/// What a valid table file contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub columns: usize,
    /// Data rows only.
    pub rows: usize,
    pub version: String,
}

/// Validate table content in the given dialect.
///
/// `file` is the live file path: its basename is the table name, and it is
/// quoted in every error.
pub fn validate(content: &str, dialect: Dialect, file: &Path) -> Result<TableReport, ValidationError> {
    let file_label = file.display().to_string();
    let records = read_records(content, &file_label)?;

    if records.len() < METADATA_ROWS {
        return Err(ValidationError::MissingMetadata { file: file_label });
    }
    let version = records[0].join(",");

    let names = &records[2];
    let columns = names.len();
    if columns == 0 {
        return Err(ValidationError::ZeroColumns { file: file_label });
    }

    let types = &records[3];
    if types.len() != columns {
        return Err(ValidationError::TypeCountMismatch {
            file: file_label,
            types: types.len(),
            columns,
        });
    }
    let grammar = grammar_for(dialect);
    if let Some(bad) = types.iter().find(|t| !grammar.accepts(t)) {
        return Err(ValidationError::InvalidType {
            file: file_label,
            token: grammar.base_type(bad).to_string(),
            dialect,
        });
    }

    let mut rows = 0;
    for (row, record) in records.iter().enumerate().skip(METADATA_ROWS) {
        if record.len() != columns {
            return Err(ValidationError::RowWidth {
                file: file_label,
                row,
                fields: record.len(),
                columns,
            });
        }
        rows += 1;
    }

    let table_name = basename(&file_label);
    check_names(table_name, names, &file_label)?;

    Ok(TableReport {
        columns,
        rows,
        version,
    })
}

/// Check the table name and column names.
///
/// Both must be identifiers; only the table name is checked against the
/// reserved words. Reserved column names are accepted.
pub fn check_names(
    table_name: &str,
    columns: &[String],
    file: &str,
) -> Result<(), ValidationError> {
    if !is_identifier(table_name) {
        return Err(ValidationError::InvalidTableName {
            file: file.to_string(),
            name: table_name.to_string(),
        });
    }
    if reserved::is_reserved(table_name) {
        return Err(ValidationError::ReservedTableName {
            file: file.to_string(),
            name: table_name.to_string(),
        });
    }
    if let Some(column) = columns.iter().find(|c| !is_identifier(c)) {
        return Err(ValidationError::InvalidColumnName {
            file: file.to_string(),
            column: column.clone(),
        });
    }
    Ok(())
}

/// `^[A-Za-z][A-Za-z0-9_]*$`
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn read_records(content: &str, file: &str) -> Result<Vec<Vec<String>>, ValidationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(|f| f.trim_start().to_string()).collect())
                .map_err(|e| ValidationError::Parse {
                    file: file.to_string(),
                    message: e.to_string(),
                })
        })
        .collect()
}
