#![allow(dead_code)]

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use whereset::config::EngineConfig;
use whereset::memory::MemoryDatabase;
use whereset::recordset::{RecordNumber, SegmentSize};
use whereset::statement::Where;

pub const SCOPE: &str = "file";
pub const INDEXED: [&str; 6] = ["f1", "f2", "f3", "f4", "f5", "f6"];

/// Send engine logs to the test output; `RUST_LOG=whereset=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Small segments so answers spread over several segments and encodings.
pub fn small_segments() -> SegmentSize {
    SegmentSize::new(4, 2, 1)
}

fn database(indexed: &[&str], unindexed: &[&str], records: &[&[(&str, &str)]]) -> MemoryDatabase {
    init_tracing();
    let mut db = MemoryDatabase::new(small_segments());
    db.create_file(SCOPE, indexed, unindexed);
    for fields in records {
        db.add_record(SCOPE, fields).expect("record added");
    }
    db
}

/// Four records: a, b (with f3 x), c and one holding only f2 p.
pub fn four_records() -> MemoryDatabase {
    four_records_indexing(&INDEXED, &["f"])
}

pub fn four_records_indexing(indexed: &[&str], unindexed: &[&str]) -> MemoryDatabase {
    database(
        indexed,
        unindexed,
        &[
            &[("f1", "a")],
            &[("f1", "b"), ("f3", "x")],
            &[("f1", "c")],
            &[("f2", "p")],
        ],
    )
}

/// Columns of the house/room rows; an empty cell is a missing field.
const HOUSE_ROOM_FIELDS: [&str; 7] = ["f", "f1", "f2", "f2", "f3", "f4", "f5"];
const HOUSE_ROOM: [[&str; 7]; 10] = [
    ["0", "b", "m", "n", "a", "a", "de"],
    ["1", "c", "n", "o", "ab", "xa", ""],
    ["2", "d", "o", "p", "b", "xax", "de"],
    ["3", "e", "p", "q", "ba", "axa", ""],
    ["4", "f", "q", "r", "bc", "ax", "df"],
    ["5", "g", "s", "t", "1", "b", ""],
    ["6", "h", "u", "v", "12", "xb", "df"],
    ["7", "i", "w", "x", "2", "xbx", ""],
    ["8", "j", "y", "z", "21", "xbax", "dg"],
    ["9", "k", "l", "l", "23", "x", ""],
];

/// Ten records over the unindexed `f` and indexed `f1` to `f6`; `f2` has two
/// occurrences per record, `f5` is on even records only, `f6` on none.
pub fn house_room() -> MemoryDatabase {
    let rows: Vec<Vec<(&str, &str)>> = HOUSE_ROOM
        .iter()
        .map(|row| {
            HOUSE_ROOM_FIELDS
                .iter()
                .zip(row)
                .filter(|(_, value)| !value.is_empty())
                .map(|(field, value)| (*field, *value))
                .collect()
        })
        .collect();
    let records: Vec<&[(&str, &str)]> = rows.iter().map(Vec::as_slice).collect();
    database(&INDEXED, &["f"], &records)
}

/// Record numbers answered by `statement`, resolving through indexes.
pub fn query(db: &MemoryDatabase, statement: &str) -> Vec<RecordNumber> {
    query_with(db, statement, &EngineConfig::default())
}

/// Record numbers answered by `statement` with every condition scanned.
pub fn scan(db: &MemoryDatabase, statement: &str) -> Vec<RecordNumber> {
    let config = EngineConfig {
        use_indexes: false,
        ..EngineConfig::default()
    };
    query_with(db, statement, &config)
}

pub fn query_with(
    db: &MemoryDatabase,
    statement: &str,
    config: &EngineConfig,
) -> Vec<RecordNumber> {
    let mut query = Where::new(statement);
    query.validate(db, SCOPE).expect("query ok");
    query
        .evaluate_with(db, SCOPE, config)
        .expect("query ok")
        .iter()
        .collect()
}

pub fn all_but(excluded: &[RecordNumber]) -> Vec<RecordNumber> {
    (0..10).filter(|r| !excluded.contains(r)).collect()
}
