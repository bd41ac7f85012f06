//! A query statement through its lifecycle: lex, parse, validate, evaluate.

use std::collections::HashMap;

use tracing::debug;

use crate::clause::{ClauseTree, Condition, Value};
use crate::config::EngineConfig;
use crate::datasource::Datasource;
use crate::error::{Result, WhereError};
use crate::evaluate::Evaluator;
use crate::lexer::{Token, lex};
use crate::parser::{is_placeholder, like_pattern, parse};
use crate::recordset::RecordSet;
use crate::validate::{StatementError, validate};

#[derive(Debug, Clone)]
pub struct Where {
    statement: String,
    tokens: Option<Vec<Token>>,
    tree: Option<ClauseTree>,
    validated: bool,
    error_information: StatementError,
}

impl Where {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            tokens: None,
            tree: None,
            validated: false,
            error_information: StatementError::new(statement),
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
    pub fn tokens(&self) -> Option<&[Token]> {
        self.tokens.as_deref()
    }
    pub fn tree(&self) -> Option<&ClauseTree> {
        self.tree.as_ref()
    }
    pub fn error_information(&self) -> &StatementError {
        &self.error_information
    }

    pub fn lex(&mut self) -> &[Token] {
        self.tokens.insert(lex(&self.statement))
    }

    /// Parse the tokens, lexing first if needed.
    pub fn parse(&mut self) -> Result<()> {
        if self.tokens.is_none() {
            self.lex();
        }
        self.tree = None;
        self.validated = false;
        self.error_information.clear();
        let tokens = self.tokens.as_deref().unwrap_or(&[]);
        match parse(tokens) {
            Ok(tree) => {
                self.tree = Some(tree);
                Ok(())
            }
            Err(e) => {
                self.error_information.record(&e);
                Err(e)
            }
        }
    }

    /// Check the fields against `scope`, parsing first if needed.
    pub fn validate<D: Datasource + ?Sized>(&mut self, datasource: &D, scope: &str) -> Result<()> {
        if self.tree.is_none() {
            self.parse()?;
        }
        let tree = self.tree.as_ref().ok_or(WhereError::NotValidated)?;
        match validate(tree, datasource, scope) {
            Ok(()) => {
                self.validated = true;
                Ok(())
            }
            Err(e) => {
                self.error_information.record(&e);
                Err(e)
            }
        }
    }

    /// Replace `?name?` values with the entry keyed `?name?` in
    /// `replacements`. Used entries are removed from the map.
    pub fn fill_placeholders(&mut self, replacements: &mut HashMap<String, String>) -> Result<()> {
        let Some(tree) = self.tree.as_mut() else {
            return Ok(());
        };
        for id in tree.walk_order() {
            let node = tree.node_mut(id);
            let like = node.condition == Some(Condition::Like);
            match &mut node.value {
                Some(Value::Single(v)) => {
                    fill(v, replacements)?;
                    if like {
                        like_pattern(v).map_err(|e| WhereError::InvalidPattern {
                            pattern: v.clone(),
                            message: e.to_string(),
                        })?;
                    }
                }
                Some(Value::Range(low, high)) => {
                    fill(low, replacements)?;
                    fill(high, replacements)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Evaluate a validated statement.
    pub fn evaluate<D: Datasource + ?Sized>(
        &mut self,
        datasource: &D,
        scope: &str,
    ) -> Result<RecordSet> {
        self.evaluate_with(datasource, scope, &EngineConfig::default())
    }

    pub fn evaluate_with<D: Datasource + ?Sized>(
        &mut self,
        datasource: &D,
        scope: &str,
        config: &EngineConfig,
    ) -> Result<RecordSet> {
        if !self.validated {
            return Err(WhereError::NotValidated);
        }
        let tree = self.tree.as_mut().ok_or(WhereError::NotValidated)?;
        let answer = Evaluator::new(datasource, scope)
            .use_indexes(config.use_indexes)
            .evaluate(tree)?;
        debug!(scope, records = answer.count(), "statement evaluated");
        Ok(answer)
    }

    /// Lex, parse, validate and evaluate in one go.
    pub fn run<D: Datasource + ?Sized>(
        statement: &str,
        datasource: &D,
        scope: &str,
    ) -> Result<RecordSet> {
        let mut query = Where::new(statement);
        query.validate(datasource, scope)?;
        query.evaluate(datasource, scope)
    }
}

fn fill(value: &mut String, replacements: &mut HashMap<String, String>) -> Result<()> {
    if !is_placeholder(value) {
        return Ok(());
    }
    match replacements.remove(value.as_str()) {
        Some(replacement) => {
            *value = replacement;
            Ok(())
        }
        None => Err(WhereError::Placeholder(value.clone())),
    }
}
