use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WhereError {
    #[error("Parse error at token {index}: {message}")]
    Parse {
        message: String,
        index: usize,
        tokens: Vec<String>,
    },
    #[error("Unknown fields: {}", join_fields(.fields))]
    UnknownFields { fields: BTreeSet<String> },
    #[error("Statement has not been validated")]
    NotValidated,
    #[error("Invalid like pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("No replacement for placeholder {0}")]
    Placeholder(String),
    #[error("Datasource error: {0}")]
    Datasource(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Query cancelled")]
    Cancelled,
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, WhereError>;

fn join_fields(fields: &BTreeSet<String>) -> String {
    fields.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

// Helper conversions
impl From<config::ConfigError> for WhereError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
