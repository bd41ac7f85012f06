//! Whereset – a field query language evaluated into segmented record sets.
//!
//! A statement such as `town eq york and not name like ^b or age from 20 to 29`
//! selects records from a file of records with named fields. The answer is a
//! [`recordset::RecordSet`]: record numbers partitioned into fixed-size
//! segments, each held as a single number, a sorted list, or a bitmap,
//! whichever is smallest.
//!
//! A statement goes through four steps:
//! * [`lexer`] – splits the text into keyword and text tokens.
//! * [`parser`] – a state machine building a [`clause::ClauseTree`] of phrases
//!   (`field condition value`), negations, booleans and parenthesized groups.
//! * [`validate`] – confirms each field exists in the file and keeps the
//!   diagnostics for a [`validate::StatementError`] report.
//! * [`evaluate`] – resolves what indexes can answer first, then scans only
//!   the records still in question for the rest.
//!
//! Storage is reached through the [`datasource::Datasource`] trait;
//! [`memory::MemoryDatabase`] is an in-memory implementation.
//!
//! ## Statements
//! * Conditions: `is`, `eq`, `ne`, `lt`, `le`, `gt`, `ge`, `before`, `after`,
//!   `like` (regular expression, case-insensitive), `starts`, `present`, and
//!   ranges `from`/`above` a value `to`/`below` another.
//! * `not` before a field negates the phrase, `not` before a condition negates
//!   the condition, and `is not` negates the value.
//! * `and`, `or` and `nor` join phrases; `a nor b` keeps records of `a` not in
//!   `b`. `nor` and `and` bind tighter than `or`.
//! * `f eq a or b` repeats the field and condition of the phrase to the left.
//! * Quote values containing keywords or spaces at the ends, or use a `?name?`
//!   placeholder filled in after parsing.
//!
//! ## Quick Start
//! ```
//! use whereset::{memory::MemoryDatabase, recordset::SegmentSize, statement::Where};
//! let mut db = MemoryDatabase::new(SegmentSize::default());
//! db.create_file("people", &["name", "town"], &["note"]);
//! db.add_record("people", &[("name", "ann"), ("town", "york")]).unwrap();
//! db.add_record("people", &[("name", "bob"), ("town", "leeds"), ("note", "new")]).unwrap();
//! let answer = Where::run("town eq york or note present", &db, "people").unwrap();
//! assert_eq!(answer.iter().collect::<Vec<_>>(), vec![0, 1]);
//! ```
//!
//! ## Logging
//! The crate logs through `tracing` and never installs a subscriber.

pub mod clause;
pub mod config;
pub mod datasource;
pub mod error;
pub mod evaluate;
pub mod interface;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod recordset;
pub mod statement;
pub mod validate;

pub use error::{Result, WhereError};
