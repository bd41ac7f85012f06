//! State-machine parser from tokens to a [`ClauseTree`].
//!
//! Each state names what may come next and consumes one token. Two pieces of
//! context are carried between tokens: a pending `not`, committed to the phrase
//! or the condition once the next token shows which it negates, and a pending
//! text token after a boolean, which becomes a field if a condition follows or
//! a repeated value (`f eq a or b`) if a boolean, `)` or the end follows.

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::clause::{ClauseTree, Condition, Lower, NodeId, Operator, Upper, Value, WhereClause};
use crate::error::{Result, WhereError};
use crate::lexer::{Keyword, Token};

/// Compile a `like` value the way the evaluator applies it.
pub fn like_pattern(value: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(value)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

/// `?name?` values are filled in after parsing.
pub fn is_placeholder(value: &str) -> bool {
    value.len() > 1 && value.starts_with('?') && value.ends_with('?')
}

fn check_like(value: &str) -> std::result::Result<(), String> {
    if is_placeholder(value) {
        return Ok(());
    }
    like_pattern(value)
        .map(|_| ())
        .map_err(|e| format!("invalid like pattern '{value}': {e}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Field, `not` or `(` to start the statement.
    FieldNotLeftpStart,
    /// Field or `(` after `not`.
    FieldLeftp,
    /// Field, `not` or `(` after `(` or a boolean.
    FieldNotLeftp,
    NotNumAlphaCondition,
    NumAlphaCondition,
    /// Condition after `num` or `alpha`.
    Condition,
    NotValue,
    Value,
    ValueLike,
    FirstValue(Lower),
    SecondCondition(Lower, String),
    SecondValue(Lower, Upper, String),
    AndOrNorRightpSingleCondition,
    AndOrNorRightpDoubleConditionOrPresent,
    AndOrNorRightp,
    FieldLeftpNotCondition,
    FieldLeftpCondition,
    FieldLeftpNotConditionValue,
    FieldLeftpConditionValue,
    /// Text after a boolean, role still open.
    FieldOrValueNot(String),
    FieldOrValue(String),
}

type Step = std::result::Result<State, String>;

fn unexpected(token: &Token) -> String {
    format!("unexpected token '{token}'")
}

struct Parser {
    tree: ClauseTree,
    current: NodeId,
    not: Option<bool>,
}

/// Build the clause tree for `tokens`.
pub fn parse(tokens: &[Token]) -> Result<ClauseTree> {
    let mut parser = Parser {
        tree: ClauseTree::new(),
        current: NodeId::ROOT,
        not: None,
    };
    let mut state = State::FieldNotLeftpStart;
    for (index, token) in tokens.iter().enumerate() {
        state = parser.step(state, token).map_err(|message| {
            debug!(index, token = %token, message = %message, "parse failed");
            WhereError::Parse {
                message,
                index,
                tokens: tokens[..=index].iter().map(Token::to_string).collect(),
            }
        })?;
    }
    parser.finish(state).map_err(|message| WhereError::Parse {
        message,
        index: tokens.len(),
        tokens: tokens.iter().map(Token::to_string).collect(),
    })?;
    Ok(parser.tree)
}

impl Parser {
    fn step(&mut self, state: State, token: &Token) -> Step {
        match state {
            State::FieldNotLeftpStart => self.field_not_leftp_start(token),
            State::FieldLeftp => self.field_leftp(token),
            State::FieldNotLeftp => self.field_not_leftp(token),
            State::NotNumAlphaCondition => self.not_num_alpha_condition(token),
            State::NumAlphaCondition => self.num_alpha_condition(token),
            State::Condition => self.condition(token),
            State::NotValue => self.not_value(token),
            State::Value => self.value(token),
            State::ValueLike => self.value_like(token),
            State::FirstValue(lower) => match token {
                Token::Text(t) => Ok(State::SecondCondition(lower, t.clone())),
                _ => Err(unexpected(token)),
            },
            State::SecondCondition(lower, first) => match token.keyword() {
                Some(Keyword::To) => Ok(State::SecondValue(lower, Upper::To, first)),
                Some(Keyword::Below) => Ok(State::SecondValue(lower, Upper::Below, first)),
                _ => Err(format!("expected 'to' or 'below' but found '{token}'")),
            },
            State::SecondValue(lower, upper, first) => match token {
                Token::Text(t) => {
                    let node = self.node();
                    node.condition = Some(Condition::Range(lower, upper));
                    node.value = Some(Value::Range(first, t.clone()));
                    Ok(State::AndOrNorRightpSingleCondition)
                }
                _ => Err(unexpected(token)),
            },
            State::AndOrNorRightpSingleCondition => {
                self.and_or_nor_rightp(token, State::FieldLeftpNotConditionValue)
            }
            State::AndOrNorRightpDoubleConditionOrPresent => {
                self.and_or_nor_rightp(token, State::FieldLeftpNotCondition)
            }
            State::AndOrNorRightp => self.and_or_nor_rightp(token, State::FieldNotLeftp),
            State::FieldLeftpNotCondition => {
                if token.keyword() == Some(Keyword::Not) {
                    self.not = Some(true);
                    return Ok(State::FieldLeftpCondition);
                }
                self.field_leftp_condition(token)
            }
            State::FieldLeftpCondition => self.field_leftp_condition(token),
            State::FieldLeftpNotConditionValue => {
                if token.keyword() == Some(Keyword::Not) {
                    self.not = Some(true);
                    return Ok(State::FieldLeftpConditionValue);
                }
                self.field_leftp_condition_value(token)
            }
            State::FieldLeftpConditionValue => self.field_leftp_condition_value(token),
            State::FieldOrValueNot(pending) => self.field_or_value_not(pending, token),
            State::FieldOrValue(pending) => self.field_or_value(pending, token),
        }
    }

    fn finish(&mut self, state: State) -> std::result::Result<(), String> {
        match state {
            State::FieldNotLeftpStart
            | State::AndOrNorRightpSingleCondition
            | State::AndOrNorRightpDoubleConditionOrPresent
            | State::AndOrNorRightp => {}
            State::FieldOrValueNot(pending) => self.deferred_value(pending)?,
            _ => return Err("statement ends before the phrase is complete".into()),
        }
        match self.tree.node(self.current).up {
            None | Some(NodeId::ROOT) => Ok(()),
            Some(_) => Err("unmatched left parenthesis".into()),
        }
    }

    // ------------- states -------------
    fn field_not_leftp_start(&mut self, token: &Token) -> Step {
        match token {
            Token::Keyword(Keyword::Not) => {
                self.first_token_invert();
                Ok(State::FieldLeftp)
            }
            Token::Keyword(Keyword::LeftParenthesis) => {
                self.first_token_left_parenthesis();
                Ok(State::FieldNotLeftp)
            }
            Token::Text(t) => {
                self.first_token_field(t);
                Ok(State::NotNumAlphaCondition)
            }
            _ => Err(unexpected(token)),
        }
    }

    fn field_leftp(&mut self, token: &Token) -> Step {
        match token {
            // `not not` cancels
            Token::Keyword(Keyword::Not) => {
                self.not = Some(!self.not.unwrap_or(false));
                Ok(State::FieldLeftp)
            }
            Token::Keyword(Keyword::LeftParenthesis) => {
                self.boolean_left_parenthesis();
                Ok(State::FieldNotLeftp)
            }
            Token::Text(t) => {
                self.deferred_not_phrase();
                self.node().field = Some(t.clone());
                Ok(State::NotNumAlphaCondition)
            }
            _ => Err(unexpected(token)),
        }
    }

    fn field_not_leftp(&mut self, token: &Token) -> Step {
        if token.keyword() == Some(Keyword::Not) {
            self.not = Some(true);
            return Ok(State::FieldLeftp);
        }
        self.field_leftp(token)
    }

    fn not_num_alpha_condition(&mut self, token: &Token) -> Step {
        if token.keyword() == Some(Keyword::Not) {
            self.not = Some(true);
            return Ok(State::NumAlphaCondition);
        }
        self.num_alpha_condition(token)
    }

    fn num_alpha_condition(&mut self, token: &Token) -> Step {
        match token.keyword() {
            Some(Keyword::Is) => {
                self.reject_not_is()?;
                self.node().condition = Some(Condition::Is);
                Ok(State::NotValue)
            }
            Some(k @ (Keyword::Like | Keyword::Starts | Keyword::Present)) => {
                self.deferred_not_condition();
                self.node().condition = Condition::single(k);
                Ok(Self::after_condition(k))
            }
            Some(k) if k.is_alphanumeric() => {
                self.deferred_not_condition();
                self.alphanum_condition(k);
                Ok(State::Condition)
            }
            _ => self.condition(token),
        }
    }

    fn condition(&mut self, token: &Token) -> Step {
        match token.keyword() {
            Some(k) if k.is_single_condition() => {
                self.deferred_not_condition();
                self.node().condition = Condition::single(k);
                Ok(State::Value)
            }
            Some(k) if k.is_first_condition() => {
                self.deferred_not_condition();
                Ok(State::FirstValue(Self::lower(k)))
            }
            _ => Err(unexpected(token)),
        }
    }

    fn not_value(&mut self, token: &Token) -> Step {
        if token.keyword() == Some(Keyword::Not) {
            self.node().not_value = true;
            return Ok(State::Value);
        }
        self.value(token)
    }

    fn value(&mut self, token: &Token) -> Step {
        match token {
            Token::Text(t) => {
                self.node().value = Some(Value::Single(t.clone()));
                Ok(State::AndOrNorRightpSingleCondition)
            }
            _ => Err(unexpected(token)),
        }
    }

    fn value_like(&mut self, token: &Token) -> Step {
        match token {
            Token::Text(t) => {
                check_like(t)?;
                self.node().value = Some(Value::Single(t.clone()));
                Ok(State::AndOrNorRightpSingleCondition)
            }
            _ => Err(unexpected(token)),
        }
    }

    fn and_or_nor_rightp(&mut self, token: &Token, after_boolean: State) -> Step {
        match token.keyword().and_then(Operator::from_keyword) {
            Some(operator) => {
                self.right_parenthesis_boolean(operator);
                Ok(after_boolean)
            }
            None => self.rightp(token),
        }
    }

    fn rightp(&mut self, token: &Token) -> Step {
        if token.keyword() != Some(Keyword::RightParenthesis) {
            return Err(unexpected(token));
        }
        self.close_level()?;
        Ok(State::AndOrNorRightp)
    }

    fn field_leftp_condition(&mut self, token: &Token) -> Step {
        match token {
            Token::Text(t) => {
                self.deferred_not_phrase();
                self.node().field = Some(t.clone());
                Ok(State::NotNumAlphaCondition)
            }
            _ => self.leftp_condition(token),
        }
    }

    fn field_leftp_condition_value(&mut self, token: &Token) -> Step {
        match token {
            Token::Text(t) => Ok(State::FieldOrValueNot(t.clone())),
            _ => self.leftp_condition(token),
        }
    }

    fn field_or_value_not(&mut self, pending: String, token: &Token) -> Step {
        match token.keyword() {
            Some(Keyword::Not) => {
                self.deferred_not_phrase();
                self.not = Some(true);
                Ok(State::FieldOrValue(pending))
            }
            Some(Keyword::RightParenthesis) => {
                self.deferred_value(pending)?;
                self.close_level()?;
                Ok(State::AndOrNorRightp)
            }
            Some(k) if k.is_boolean() => {
                self.deferred_value(pending)?;
                if let Some(operator) = Operator::from_keyword(k) {
                    self.right_parenthesis_boolean(operator);
                }
                Ok(State::FieldLeftpNotConditionValue)
            }
            _ => {
                self.deferred_not_phrase();
                self.field_or_value(pending, token)
            }
        }
    }

    fn field_or_value(&mut self, pending: String, token: &Token) -> Step {
        match token.keyword() {
            Some(Keyword::Is) => {
                self.reject_not_is()?;
                self.field_condition(pending, Some(Condition::Is));
                Ok(State::NotValue)
            }
            Some(k) if k.is_single_condition() => {
                self.field_condition(pending, Condition::single(k));
                Ok(State::Value)
            }
            Some(k) if k.is_first_condition() => {
                self.field_condition(pending, None);
                Ok(State::FirstValue(Self::lower(k)))
            }
            Some(k @ (Keyword::Like | Keyword::Starts | Keyword::Present)) => {
                self.field_condition(pending, Condition::single(k));
                Ok(Self::after_condition(k))
            }
            Some(k) if k.is_alphanumeric() => {
                self.field_condition(pending, None);
                self.alphanum_condition(k);
                Ok(State::Condition)
            }
            _ => Err(unexpected(token)),
        }
    }

    /// `(` or a condition where the field is repeated from the left phrase.
    fn leftp_condition(&mut self, token: &Token) -> Step {
        match token.keyword() {
            Some(Keyword::LeftParenthesis) => {
                self.boolean_left_parenthesis();
                Ok(State::FieldNotLeftp)
            }
            Some(Keyword::Is) => {
                self.reject_not_is()?;
                self.copy_pre_is()?;
                self.node().condition = Some(Condition::Is);
                Ok(State::NotValue)
            }
            Some(k) if k.is_single_condition() => {
                self.copy_pre_condition()?;
                self.node().condition = Condition::single(k);
                Ok(State::Value)
            }
            Some(k) if k.is_first_condition() => {
                self.copy_pre_condition()?;
                Ok(State::FirstValue(Self::lower(k)))
            }
            Some(k @ (Keyword::Like | Keyword::Starts | Keyword::Present)) => {
                self.copy_pre_like_starts_present()?;
                self.node().condition = Condition::single(k);
                Ok(Self::after_condition(k))
            }
            Some(k) if k.is_alphanumeric() => {
                self.copy_pre_like_starts_present()?;
                self.alphanum_condition(k);
                Ok(State::Condition)
            }
            _ => Err(unexpected(token)),
        }
    }

    fn after_condition(keyword: Keyword) -> State {
        match keyword {
            Keyword::Like => State::ValueLike,
            Keyword::Present => State::AndOrNorRightpDoubleConditionOrPresent,
            _ => State::Value,
        }
    }

    fn lower(keyword: Keyword) -> Lower {
        if keyword == Keyword::Above {
            Lower::Above
        } else {
            Lower::From
        }
    }

    // ------------- pending negation and values -------------
    fn reject_not_is(&self) -> std::result::Result<(), String> {
        if self.not == Some(true) {
            return Err("'not' cannot precede 'is', use 'is not'".into());
        }
        Ok(())
    }

    fn deferred_not_condition(&mut self) {
        if let Some(not) = self.not.take() {
            self.node().not_condition = not;
        }
    }

    fn deferred_not_phrase(&mut self) {
        if let Some(not) = self.not.take() {
            self.node().not_phrase = not;
        }
    }

    fn deferred_value(&mut self, pending: String) -> std::result::Result<(), String> {
        self.copy_pre_value()?;
        if self.tree.node(self.current).condition == Some(Condition::Like) {
            check_like(&pending)?;
        }
        self.node().value = Some(Value::Single(pending));
        Ok(())
    }

    // ------------- copies from the phrase to the left -------------
    fn left_node(&self) -> std::result::Result<WhereClause, String> {
        self.tree
            .node(self.current)
            .left
            .map(|left| self.tree.node(left).clone())
            .ok_or_else(|| "no phrase to the left to repeat".to_string())
    }

    fn copy_pre_is(&mut self) -> std::result::Result<WhereClause, String> {
        let left = self.left_node()?;
        let node = self.node();
        node.not_phrase = left.not_phrase;
        node.field = left.field.clone();
        Ok(left)
    }

    fn copy_pre_like_starts_present(&mut self) -> std::result::Result<WhereClause, String> {
        let left = self.copy_pre_is()?;
        self.node().not_condition = left.not_condition;
        self.deferred_not_condition();
        Ok(left)
    }

    fn copy_pre_condition(&mut self) -> std::result::Result<WhereClause, String> {
        let left = self.copy_pre_like_starts_present()?;
        let node = self.node();
        node.num = left.num;
        node.alpha = left.alpha;
        Ok(left)
    }

    fn copy_pre_value(&mut self) -> std::result::Result<(), String> {
        let condition = self.left_node()?.condition;
        match condition {
            None => return Err("no condition to the left to repeat".into()),
            Some(Condition::Present) => {
                return Err("present phrase followed by value phrase".into());
            }
            Some(range @ Condition::Range(..)) => {
                return Err(format!("{range} phrase followed by value phrase"));
            }
            Some(Condition::Like | Condition::Starts) => {
                self.copy_pre_like_starts_present()?;
            }
            Some(Condition::Is) => {
                self.copy_pre_is()?;
                if let Some(not) = self.not.take() {
                    self.node().not_value = not;
                }
            }
            Some(_) => {
                self.copy_pre_condition()?;
            }
        }
        self.node().condition = condition;
        Ok(())
    }

    // ------------- tree building -------------
    fn node(&mut self) -> &mut WhereClause {
        self.tree.node_mut(self.current)
    }

    fn first_token_field(&mut self, field: &str) {
        let leaf = self.tree.add(WhereClause {
            field: Some(field.to_string()),
            up: Some(self.current),
            ..WhereClause::default()
        });
        self.node().down = Some(leaf);
        self.current = leaf;
    }

    fn first_token_left_parenthesis(&mut self) {
        let group = self.tree.add(WhereClause {
            up: Some(self.current),
            ..WhereClause::default()
        });
        self.node().down = Some(group);
        let leaf = self.tree.add(WhereClause {
            up: Some(group),
            ..WhereClause::default()
        });
        self.tree.node_mut(group).down = Some(leaf);
        self.current = leaf;
    }

    fn first_token_invert(&mut self) {
        let leaf = self.tree.add(WhereClause {
            up: Some(self.current),
            ..WhereClause::default()
        });
        self.node().down = Some(leaf);
        self.current = leaf;
        self.not = Some(true);
    }

    fn boolean_left_parenthesis(&mut self) {
        self.deferred_not_phrase();
        let group = self.current;
        let leaf = self.tree.add(WhereClause {
            up: Some(group),
            ..WhereClause::default()
        });
        self.node().down = Some(leaf);
        self.current = leaf;
    }

    fn right_parenthesis_boolean(&mut self, operator: Operator) {
        let left = self.current;
        let up = self.tree.node(left).up;
        let sibling = self.tree.add(WhereClause {
            up,
            left: Some(left),
            operator: Some(operator),
            ..WhereClause::default()
        });
        self.node().right = Some(sibling);
        self.current = sibling;
    }

    fn close_level(&mut self) -> std::result::Result<(), String> {
        match self.tree.node(self.current).up {
            Some(up) if up != NodeId::ROOT => {
                self.current = up;
                Ok(())
            }
            _ => Err("no unmatched left parenthesis".into()),
        }
    }

    fn field_condition(&mut self, field: String, condition: Option<Condition>) {
        let node = self.node();
        node.field = Some(field);
        node.condition = condition;
        self.deferred_not_condition();
    }

    fn alphanum_condition(&mut self, keyword: Keyword) {
        let node = self.node();
        node.alpha = keyword == Keyword::Alpha;
        node.num = keyword == Keyword::Num;
        if node.num {
            warn!(field = ?node.field, "num comparisons are not supported, comparing as alpha");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn tree(statement: &str) -> ClauseTree {
        parse(&lex(statement)).expect("parse ok")
    }

    fn leaves(tree: &ClauseTree) -> Vec<&WhereClause> {
        tree.walk_order()
            .into_iter()
            .map(|id| tree.node(id))
            .filter(|n| n.is_leaf() && n.field().is_some())
            .collect()
    }

    #[test]
    fn negations_land_where_they_belong() {
        let t = tree("not f not like a");
        let leaf = leaves(&t)[0];
        assert!(leaf.not_phrase() && leaf.not_condition());
        let t = tree("f is not a");
        assert!(leaves(&t)[0].not_value());
        let t = tree("not not f eq a");
        assert!(!leaves(&t)[0].not_phrase());
        assert!(parse(&lex("f not is a")).is_err());
    }

    #[test]
    fn abbreviations_copy_from_the_left() {
        let t = tree("f4 eq v and w and gt x");
        let l = leaves(&t);
        assert_eq!(l.len(), 3);
        assert!(l.iter().all(|n| n.field() == Some("f4")));
        assert_eq!(l[1].condition(), Some(Condition::Eq));
        assert_eq!(l[2].condition(), Some(Condition::Gt));
        let t = tree("f eq a or not b");
        let l = leaves(&t);
        assert!(l[1].not_condition());
        let t = tree("f is a or is b");
        assert_eq!(leaves(&t)[1].field(), Some("f"));
    }

    #[test]
    fn ranges_hold_both_bounds() {
        let t = tree("f above a below b");
        let leaf = leaves(&t)[0];
        assert_eq!(leaf.condition(), Some(Condition::Range(Lower::Above, Upper::Below)));
        assert_eq!(leaf.value(), Some(&Value::Range("a".into(), "b".into())));
    }

    #[test]
    fn malformed_statements_fail_at_the_right_token() {
        // after present the next text is a field, which then lacks a condition
        let err = parse(&lex("f present or v")).unwrap_err();
        assert!(matches!(err, WhereError::Parse { index: 4, .. }), "{err:?}");
        let err = parse(&lex("f from a to b or c or d")).unwrap_err();
        assert!(matches!(err, WhereError::Parse { index: 7, .. }), "{err:?}");
        assert!(parse(&lex("f eq a )")).is_err());
        assert!(parse(&lex("( f eq a")).is_err());
        assert!(parse(&lex("f like (")).is_err());
        assert!(parse(&lex("f like [")).is_err());
    }
}
