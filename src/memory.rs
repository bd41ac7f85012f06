//! An in-memory [`Datasource`].
//!
//! Each file keeps its records as field -> values maps. Indexed fields also
//! keep an ordered value -> records index, so equality, range, prefix and
//! pattern lookups are answered from it. Unindexed fields answer no lookups
//! and are only ever scanned.

use core::hash::BuildHasherDefault;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;
use seahash::SeaHasher;

use crate::config::EngineConfig;
use crate::datasource::{Datasource, KeyRange};
use crate::error::{Result, WhereError};
use crate::recordset::{RecordNumber, RecordSet, SegmentSize};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Record numbers -------------
/// Hands out record numbers, reusing released ones first.
#[derive(Debug)]
pub struct RecordGenerator {
    next: RecordNumber,
    released: Vec<RecordNumber>,
}

impl RecordGenerator {
    pub fn new() -> Self {
        Self {
            next: 0,
            released: Vec::new(),
        }
    }
    /// Make sure `record` is never handed out.
    pub fn retain(&mut self, record: RecordNumber) {
        self.released.retain(|r| *r != record);
        if record >= self.next {
            self.next = record + 1;
        }
    }
    pub fn release(&mut self, record: RecordNumber) {
        self.released.push(record);
    }
    pub fn generate(&mut self) -> RecordNumber {
        self.released.pop().unwrap_or_else(|| {
            self.next += 1;
            self.next - 1
        })
    }
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- MemoryFile -------------
type Fields = HashMap<String, Vec<String>, OtherHasher>;

#[derive(Debug)]
pub struct MemoryFile {
    indexed: HashSet<String, OtherHasher>,
    unindexed: HashSet<String, OtherHasher>,
    records: BTreeMap<RecordNumber, Fields>,
    indexes: HashMap<String, BTreeMap<String, RecordSet>, OtherHasher>,
    existence: RecordSet,
    generator: RecordGenerator,
}

impl MemoryFile {
    fn new(size: SegmentSize, indexed: &[&str], unindexed: &[&str]) -> Self {
        let mut indexes = HashMap::<String, BTreeMap<String, RecordSet>, OtherHasher>::default();
        for field in indexed {
            indexes.insert(field.to_string(), BTreeMap::new());
        }
        Self {
            indexed: indexed.iter().map(|f| f.to_string()).collect(),
            unindexed: unindexed.iter().map(|f| f.to_string()).collect(),
            records: BTreeMap::new(),
            indexes,
            existence: RecordSet::new(size),
            generator: RecordGenerator::new(),
        }
    }
    pub fn has_field(&self, field: &str) -> bool {
        self.indexed.contains(field) || self.unindexed.contains(field)
    }
    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed.contains(field)
    }
    /// Field names, sorted.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexed.iter().chain(&self.unindexed).cloned().collect();
        names.sort();
        names
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn existence(&self) -> &RecordSet {
        &self.existence
    }
    fn index(&self, field: &str) -> Option<&BTreeMap<String, RecordSet>> {
        if !self.is_indexed(field) {
            return None;
        }
        self.indexes.get(field)
    }
    fn empty(&self) -> RecordSet {
        RecordSet::new(self.existence.segment_size())
    }
}

// ------------- MemoryDatabase -------------
#[derive(Debug)]
pub struct MemoryDatabase {
    size: SegmentSize,
    files: HashMap<String, MemoryFile, OtherHasher>,
    fetches: AtomicU64,
}

impl MemoryDatabase {
    pub fn new(size: SegmentSize) -> Self {
        Self {
            size,
            files: HashMap::<String, MemoryFile, OtherHasher>::default(),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.segment_size())
    }

    /// Create (or replace) the file `scope`.
    pub fn create_file(&mut self, scope: &str, indexed: &[&str], unindexed: &[&str]) {
        self.files
            .insert(scope.to_string(), MemoryFile::new(self.size, indexed, unindexed));
    }

    pub fn file(&self, scope: &str) -> Result<&MemoryFile> {
        self.files
            .get(scope)
            .ok_or_else(|| WhereError::Datasource(format!("unknown file {scope}")))
    }

    fn file_mut(&mut self, scope: &str) -> Result<&mut MemoryFile> {
        self.files
            .get_mut(scope)
            .ok_or_else(|| WhereError::Datasource(format!("unknown file {scope}")))
    }

    /// Add a record under the next free record number. A field given more
    /// than once gets one occurrence per pair.
    pub fn add_record(&mut self, scope: &str, fields: &[(&str, &str)]) -> Result<RecordNumber> {
        let record = self.file_mut(scope)?.generator.generate();
        self.put_record(scope, record, fields)?;
        Ok(record)
    }

    /// Store a record under `record`, replacing any record already there.
    pub fn put_record(
        &mut self,
        scope: &str,
        record: RecordNumber,
        fields: &[(&str, &str)],
    ) -> Result<()> {
        let file = self.file_mut(scope)?;
        if let Some((field, _)) = fields.iter().find(|(field, _)| !file.has_field(field)) {
            return Err(WhereError::Datasource(format!("unknown field {field} in file {scope}")));
        }
        remove_from_indexes(file, record);
        let mut values = Fields::default();
        for (field, value) in fields {
            values
                .entry(field.to_string())
                .or_default()
                .push(value.to_string());
        }
        for (field, occurrences) in &values {
            if let Some(index) = file.indexes.get_mut(field) {
                for value in occurrences {
                    index
                        .entry(value.clone())
                        .or_insert_with(|| RecordSet::new(file.existence.segment_size()))
                        .insert(record);
                }
            }
        }
        file.records.insert(record, values);
        file.existence.insert(record);
        file.generator.retain(record);
        Ok(())
    }

    pub fn delete_record(&mut self, scope: &str, record: RecordNumber) -> Result<bool> {
        let file = self.file_mut(scope)?;
        if !remove_from_indexes(file, record) {
            return Ok(false);
        }
        file.records.remove(&record);
        file.existence.remove(record);
        file.generator.release(record);
        Ok(true)
    }

    /// Field value fetches served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

/// Take `record` out of every index; false if the file does not hold it.
fn remove_from_indexes(file: &mut MemoryFile, record: RecordNumber) -> bool {
    let Some(values) = file.records.get(&record) else {
        return false;
    };
    for (field, occurrences) in values {
        if let Some(index) = file.indexes.get_mut(field) {
            for value in occurrences {
                let emptied = index.get_mut(value).is_some_and(|records| {
                    records.remove(record);
                    records.is_empty()
                });
                if emptied {
                    index.remove(value);
                }
            }
        }
    }
    true
}

impl Datasource for MemoryDatabase {
    fn field_exists(&self, scope: &str, field: &str) -> Result<bool> {
        Ok(self.file(scope)?.has_field(field))
    }

    fn lookup_equal(&self, scope: &str, field: &str, value: &str) -> Result<Option<RecordSet>> {
        let file = self.file(scope)?;
        Ok(file
            .index(field)
            .map(|index| index.get(value).cloned().unwrap_or_else(|| file.empty())))
    }

    fn lookup_range(
        &self,
        scope: &str,
        field: &str,
        range: &KeyRange,
    ) -> Result<Option<RecordSet>> {
        let file = self.file(scope)?;
        let Some(index) = file.index(field) else {
            return Ok(None);
        };
        let mut found = file.empty();
        if !range.is_empty() {
            for records in index.range::<str, _>(range.as_bounds()).map(|(_, r)| r) {
                found.union_with(records);
            }
        }
        Ok(Some(found))
    }

    fn lookup_prefix(&self, scope: &str, field: &str, prefix: &str) -> Result<Option<RecordSet>> {
        let file = self.file(scope)?;
        let Some(index) = file.index(field) else {
            return Ok(None);
        };
        let mut found = file.empty();
        for (_, records) in index
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            found.union_with(records);
        }
        Ok(Some(found))
    }

    fn lookup_pattern(
        &self,
        scope: &str,
        field: &str,
        pattern: &Regex,
    ) -> Result<Option<RecordSet>> {
        let file = self.file(scope)?;
        let Some(index) = file.index(field) else {
            return Ok(None);
        };
        let mut found = file.empty();
        for (_, records) in index.iter().filter(|(key, _)| pattern.is_match(key)) {
            found.union_with(records);
        }
        Ok(Some(found))
    }

    fn full_existence(&self, scope: &str) -> Result<RecordSet> {
        Ok(self.file(scope)?.existence.clone())
    }

    fn empty_set(&self, scope: &str) -> Result<RecordSet> {
        Ok(self.file(scope)?.empty())
    }

    fn fetch_field_values(
        &self,
        scope: &str,
        record: RecordNumber,
        field: &str,
    ) -> Result<Vec<String>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .file(scope)?
            .records
            .get(&record)
            .and_then(|fields| fields.get(field))
            .cloned()
            .unwrap_or_default())
    }
}
