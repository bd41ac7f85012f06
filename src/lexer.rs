//! Splits a statement into keyword and text tokens.
//!
//! Keywords are recognized case-insensitively, but only at whitespace or
//! parenthesis boundaries, so `android` or `"and"` stay text. Text between
//! keywords, including any quoted fragments (quotes removed), is joined into a
//! single token trimmed of surrounding whitespace. The lexer never fails;
//! anything unexpected is left for the parser to reject.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    LeftParenthesis,
    RightParenthesis,
    And,
    Or,
    Nor,
    Not,
    Is,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Before,
    After,
    From,
    To,
    Above,
    Below,
    Like,
    Starts,
    Present,
    Num,
    Alpha,
}

impl Keyword {
    pub const ALL: [Keyword; 24] = [
        Keyword::LeftParenthesis,
        Keyword::RightParenthesis,
        Keyword::And,
        Keyword::Or,
        Keyword::Nor,
        Keyword::Not,
        Keyword::Is,
        Keyword::Eq,
        Keyword::Ne,
        Keyword::Lt,
        Keyword::Le,
        Keyword::Gt,
        Keyword::Ge,
        Keyword::Before,
        Keyword::After,
        Keyword::From,
        Keyword::To,
        Keyword::Above,
        Keyword::Below,
        Keyword::Like,
        Keyword::Starts,
        Keyword::Present,
        Keyword::Num,
        Keyword::Alpha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::LeftParenthesis => "(",
            Keyword::RightParenthesis => ")",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Nor => "nor",
            Keyword::Not => "not",
            Keyword::Is => "is",
            Keyword::Eq => "eq",
            Keyword::Ne => "ne",
            Keyword::Lt => "lt",
            Keyword::Le => "le",
            Keyword::Gt => "gt",
            Keyword::Ge => "ge",
            Keyword::Before => "before",
            Keyword::After => "after",
            Keyword::From => "from",
            Keyword::To => "to",
            Keyword::Above => "above",
            Keyword::Below => "below",
            Keyword::Like => "like",
            Keyword::Starts => "starts",
            Keyword::Present => "present",
            Keyword::Num => "num",
            Keyword::Alpha => "alpha",
        }
    }

    /// Case-insensitive lookup of a word keyword.
    pub fn from_word(word: &str) -> Option<Keyword> {
        let lower = word.to_lowercase();
        Keyword::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .filter(|k| !matches!(k, Keyword::LeftParenthesis | Keyword::RightParenthesis))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Keyword::And | Keyword::Or | Keyword::Nor)
    }

    pub fn is_single_condition(&self) -> bool {
        matches!(
            self,
            Keyword::Eq
                | Keyword::Ne
                | Keyword::Lt
                | Keyword::Le
                | Keyword::Gt
                | Keyword::Ge
                | Keyword::Before
                | Keyword::After
        )
    }

    pub fn is_first_condition(&self) -> bool {
        matches!(self, Keyword::From | Keyword::Above)
    }

    pub fn is_second_condition(&self) -> bool {
        matches!(self, Keyword::To | Keyword::Below)
    }

    pub fn is_alphanumeric(&self) -> bool {
        matches!(self, Keyword::Num | Keyword::Alpha)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Keyword(Keyword),
    /// A field name or a value.
    Text(String),
}

impl Token {
    pub fn as_str(&self) -> &str {
        match self {
            Token::Keyword(k) => k.as_str(),
            Token::Text(t) => t,
        }
    }
    pub fn keyword(&self) -> Option<Keyword> {
        match self {
            Token::Keyword(k) => Some(*k),
            Token::Text(_) => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------- Chunks -------------
lazy_static! {
    static ref CHUNK: Regex = Regex::new(r#""[^"]*"|'[^']*'|\(|\)|\s+|[^\s()"']+|["']"#)
        .expect("chunk pattern is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'s> {
    Quoted(&'s str),
    LeftParenthesis,
    RightParenthesis,
    Space(&'s str),
    Word(&'s str),
}

fn chunks(statement: &str) -> Vec<Chunk<'_>> {
    CHUNK
        .find_iter(statement)
        .map(|m| {
            let s = m.as_str();
            match s {
                "(" => Chunk::LeftParenthesis,
                ")" => Chunk::RightParenthesis,
                _ if s.len() >= 2 && (s.starts_with('"') || s.starts_with('\'')) => {
                    Chunk::Quoted(&s[1..s.len() - 1])
                }
                _ if s.trim().is_empty() => Chunk::Space(s),
                // an unterminated quote is kept as text
                _ => Chunk::Word(s),
            }
        })
        .collect()
}

fn is_space(chunk: Option<&Chunk<'_>>) -> bool {
    matches!(chunk, Some(Chunk::Space(_)))
}

/// Whether a word keyword sits on the boundaries it needs to count as one.
fn on_boundary(keyword: Keyword, before: Option<&Chunk<'_>>, after: Option<&Chunk<'_>>) -> bool {
    let space_or_left =
        |c: Option<&Chunk<'_>>| is_space(c) || matches!(c, Some(Chunk::LeftParenthesis));
    let space_or_right =
        |c: Option<&Chunk<'_>>| is_space(c) || matches!(c, Some(Chunk::RightParenthesis));
    match keyword {
        Keyword::And | Keyword::Or => space_or_right(before) && space_or_left(after),
        Keyword::Not => (before.is_none() || space_or_left(before)) && space_or_left(after),
        Keyword::Nor => space_or_left(before) && space_or_left(after),
        Keyword::Present => is_space(before) && (after.is_none() || space_or_right(after)),
        _ => is_space(before) && is_space(after),
    }
}

fn flush(text: &mut String, tokens: &mut Vec<Token>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        tokens.push(Token::Text(trimmed.to_string()));
    }
    text.clear();
}

/// Split `statement` into tokens.
pub fn lex(statement: &str) -> Vec<Token> {
    let chunks = chunks(statement);
    let mut tokens = Vec::new();
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let keyword = match chunk {
            Chunk::LeftParenthesis => Some(Keyword::LeftParenthesis),
            Chunk::RightParenthesis => Some(Keyword::RightParenthesis),
            Chunk::Word(word) => Keyword::from_word(word).filter(|k| {
                let before = i.checked_sub(1).and_then(|b| chunks.get(b));
                on_boundary(*k, before, chunks.get(i + 1))
            }),
            _ => None,
        };
        match (keyword, chunk) {
            (Some(k), _) => {
                flush(&mut text, &mut tokens);
                tokens.push(Token::Keyword(k));
            }
            (None, Chunk::Quoted(s) | Chunk::Space(s) | Chunk::Word(s)) => text.push_str(s),
            (None, _) => {}
        }
    }
    flush(&mut text, &mut tokens);
    tokens
}
