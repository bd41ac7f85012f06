//! What the evaluator needs from a storage backend.

use std::ops::Bound;

use regex::Regex;

use crate::clause::{Condition, Lower, Upper, Value};
use crate::error::Result;
use crate::recordset::{RecordNumber, RecordSet};

/// Key bounds for a range lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub lower: Bound<String>,
    pub upper: Bound<String>,
}

impl KeyRange {
    /// The bounds a comparison condition selects, if it is one.
    pub fn for_condition(condition: Condition, value: &Value) -> Option<KeyRange> {
        use Bound::{Excluded, Included, Unbounded};
        let (lower, upper) = match (condition, value) {
            (Condition::Gt | Condition::After, Value::Single(v)) => {
                (Excluded(v.clone()), Unbounded)
            }
            (Condition::Ge, Value::Single(v)) => (Included(v.clone()), Unbounded),
            (Condition::Lt | Condition::Before, Value::Single(v)) => {
                (Unbounded, Excluded(v.clone()))
            }
            (Condition::Le, Value::Single(v)) => (Unbounded, Included(v.clone())),
            (Condition::Range(lower, upper), Value::Range(low, high)) => (
                match lower {
                    Lower::From => Included(low.clone()),
                    Lower::Above => Excluded(low.clone()),
                },
                match upper {
                    Upper::To => Included(high.clone()),
                    Upper::Below => Excluded(high.clone()),
                },
            ),
            _ => return None,
        };
        Some(KeyRange { lower, upper })
    }

    pub fn contains(&self, key: &str) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => key >= l.as_str(),
            Bound::Excluded(l) => key > l.as_str(),
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => key <= u.as_str(),
            Bound::Excluded(u) => key < u.as_str(),
            Bound::Unbounded => true,
        };
        above && below
    }

    /// No key can fall inside the bounds.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l) | Bound::Excluded(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u)) => l >= u,
            _ => false,
        }
    }

    pub fn as_bounds(&self) -> (Bound<&str>, Bound<&str>) {
        (bound_str(&self.lower), bound_str(&self.upper))
    }
}

fn bound_str(bound: &Bound<String>) -> Bound<&str> {
    match bound {
        Bound::Included(s) => Bound::Included(s.as_str()),
        Bound::Excluded(s) => Bound::Excluded(s.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// A file of records with named, possibly indexed, fields.
///
/// `scope` names the file. Lookups return `Ok(None)` when no index can
/// answer them; the evaluator then scans record values instead.
pub trait Datasource {
    fn field_exists(&self, scope: &str, field: &str) -> Result<bool>;

    fn lookup_equal(&self, scope: &str, field: &str, value: &str) -> Result<Option<RecordSet>>;

    fn lookup_range(
        &self,
        scope: &str,
        field: &str,
        range: &KeyRange,
    ) -> Result<Option<RecordSet>>;

    fn lookup_prefix(
        &self,
        _scope: &str,
        _field: &str,
        _prefix: &str,
    ) -> Result<Option<RecordSet>> {
        Ok(None)
    }

    fn lookup_pattern(
        &self,
        _scope: &str,
        _field: &str,
        _pattern: &Regex,
    ) -> Result<Option<RecordSet>> {
        Ok(None)
    }

    /// Every record in the file.
    fn full_existence(&self, scope: &str) -> Result<RecordSet>;

    fn empty_set(&self, scope: &str) -> Result<RecordSet>;

    /// All occurrences of `field` in `record`, empty when it has none.
    fn fetch_field_values(
        &self,
        scope: &str,
        record: RecordNumber,
        field: &str,
    ) -> Result<Vec<String>>;
}
