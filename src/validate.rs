//! Field checks on a parsed statement and the diagnostics shown for a bad one.

use std::collections::BTreeSet;

use tracing::debug;

use crate::clause::ClauseTree;
use crate::datasource::Datasource;
use crate::error::{Result, WhereError};
use crate::lexer::Keyword;

/// Confirm every field named in `tree` exists in `scope`.
pub fn validate<D: Datasource + ?Sized>(
    tree: &ClauseTree,
    datasource: &D,
    scope: &str,
) -> Result<()> {
    let mut unknown = BTreeSet::new();
    for id in tree.walk_order() {
        if let Some(field) = tree.node(id).field() {
            if !unknown.contains(field) && !datasource.field_exists(scope, field)? {
                unknown.insert(field.to_string());
            }
        }
    }
    if unknown.is_empty() {
        return Ok(());
    }
    debug!(scope, fields = unknown.len(), "unknown fields");
    Err(WhereError::UnknownFields { fields: unknown })
}

/// What went wrong with a statement, kept for reporting.
///
/// Processing stops at the first error, so at most one of the token prefix
/// and the unknown fields is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementError {
    statement: String,
    tokens: Option<Vec<String>>,
    fields: Option<BTreeSet<String>>,
}

impl StatementError {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            tokens: None,
            fields: None,
        }
    }
    pub fn statement(&self) -> &str {
        &self.statement
    }
    /// Tokens up to and including the one the parser stopped at.
    pub fn tokens(&self) -> Option<&[String]> {
        self.tokens.as_deref()
    }
    pub fn fields(&self) -> Option<&BTreeSet<String>> {
        self.fields.as_ref()
    }
    pub fn has_error(&self) -> bool {
        self.tokens.is_some() || self.fields.is_some()
    }

    pub(crate) fn record(&mut self, error: &WhereError) {
        match error {
            WhereError::Parse { tokens, .. } => self.tokens = Some(tokens.clone()),
            WhereError::UnknownFields { fields } => self.fields = Some(fields.clone()),
            _ => {}
        }
    }

    pub(crate) fn clear(&mut self) {
        self.tokens = None;
        self.fields = None;
    }

    /// A report for the user, listing `field_names` as the fields of the file.
    pub fn report(&self, field_names: &[String]) -> String {
        if !self.has_error() {
            return format!("No error information available for query '{}'", self.statement);
        }
        let mut names = field_names.to_vec();
        names.sort();
        let mut keywords: Vec<&str> = Keyword::ALL.iter().map(Keyword::as_str).collect();
        keywords.sort_unstable();

        let mut report = Vec::new();
        if let Some(tokens) = &self.tokens {
            report.push(format!(
                "Error found in query, probably near end of:\n\n{}\n\nelements.",
                tokens.join(" ")
            ));
        }
        if let Some(fields) = &self.fields {
            let (keywordish, misspelt): (Vec<&String>, Vec<&String>) =
                fields.iter().partition(|f| f.split_whitespace().count() > 1);
            if !keywordish.is_empty() {
                report.push(format!(
                    "Probably keywords are missing or have spelling mistakes:\n\n{}\n\n\
                     although these could be field names if the list of allowed field names \
                     has names with spaces.",
                    join_lines(&keywordish)
                ));
            }
            if !misspelt.is_empty() {
                report.push(format!(
                    "Probably field names with spelling mistakes:\n\n{}",
                    join_lines(&misspelt)
                ));
            }
        }
        report.push(format!("Fields in file are:\n\n{}", names.join("\n")));
        report.push(format!("Keywords are:\n\n{}", keywords.join("  ")));
        report.join("\n\n")
    }
}

fn join_lines(lines: &[&String]) -> String {
    lines.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("\n")
}
