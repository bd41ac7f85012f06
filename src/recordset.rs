//! Segmented sets of record numbers.
//!
//! A [`RecordSet`] partitions record numbers into fixed-size segments, keyed by
//! `record / segment_size`. Each [`Segment`] picks its own encoding from the
//! number of records it holds: a single offset, a sorted list of offsets, or a
//! roaring bitmap. The encoding never changes what a set means; two sets with
//! the same members are equal and combine the same whatever their encodings.
//!
//! The combinators (`union`, `intersection`, `symmetric_difference`,
//! `difference`) build a new set and leave their operands alone. The `*_with`
//! variants mutate the receiver and are meant for scratch accumulation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map::{self, Entry};
use std::fmt;
use std::iter::Peekable;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Sub, SubAssign};

// used for segments holding many records
use roaring::RoaringBitmap;

use crate::config::{
    DEFAULT_LOWER_CONVERSION_LIMIT, DEFAULT_SEGMENT_SIZE, DEFAULT_UPPER_CONVERSION_LIMIT,
};

// ------------- Record numbers -------------
pub type RecordNumber = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentSize {
    records: u32,
    upper_conversion_limit: u32,
    lower_conversion_limit: u32,
}

impl SegmentSize {
    pub fn new(records: u32, upper_conversion_limit: u32, lower_conversion_limit: u32) -> Self {
        let records = records.max(1);
        let upper_conversion_limit = upper_conversion_limit.min(records);
        Self {
            records,
            upper_conversion_limit,
            lower_conversion_limit: lower_conversion_limit.min(upper_conversion_limit),
        }
    }
    pub fn records(&self) -> u32 {
        self.records
    }
    pub fn upper_conversion_limit(&self) -> u32 {
        self.upper_conversion_limit
    }
    pub fn lower_conversion_limit(&self) -> u32 {
        self.lower_conversion_limit
    }
    /// Segment number and offset within the segment of `record`.
    pub fn split(&self, record: RecordNumber) -> (u64, u32) {
        let records = u64::from(self.records);
        (record / records, (record % records) as u32)
    }
    pub fn join(&self, segment: u64, offset: u32) -> RecordNumber {
        segment * u64::from(self.records) + u64::from(offset)
    }
}

impl Default for SegmentSize {
    fn default() -> Self {
        Self::new(
            DEFAULT_SEGMENT_SIZE,
            DEFAULT_UPPER_CONVERSION_LIMIT,
            DEFAULT_LOWER_CONVERSION_LIMIT,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Union,
    Intersection,
    SymmetricDifference,
    Difference,
}

impl SetOp {
    fn keeps(self, in_left: bool, in_right: bool) -> bool {
        match self {
            SetOp::Union => in_left || in_right,
            SetOp::Intersection => in_left && in_right,
            SetOp::SymmetricDifference => in_left != in_right,
            SetOp::Difference => in_left && !in_right,
        }
    }
    fn apply(self, left: &RoaringBitmap, right: &RoaringBitmap) -> RoaringBitmap {
        match self {
            SetOp::Union => left | right,
            SetOp::Intersection => left & right,
            SetOp::SymmetricDifference => left ^ right,
            SetOp::Difference => left - right,
        }
    }
}

// ------------- Segment -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Single,
    List,
    Bitmap,
}

#[derive(Debug, Clone)]
pub enum Segment {
    Single(u32),
    /// Sorted, duplicate-free offsets.
    List(Vec<u32>),
    Bitmap(RoaringBitmap),
}

impl Segment {
    /// Canonical encoding for sorted, duplicate-free offsets; `None` when empty.
    fn from_sorted(offsets: Vec<u32>, size: &SegmentSize) -> Option<Self> {
        match offsets.len() {
            0 => None,
            1 => Some(Segment::Single(offsets[0])),
            n if n as u64 <= u64::from(size.upper_conversion_limit) => Some(Segment::List(offsets)),
            _ => Some(Segment::Bitmap(offsets.into_iter().collect())),
        }
    }

    fn from_bitmap(bitmap: RoaringBitmap, limit: u32) -> Option<Self> {
        match bitmap.len() {
            0 => None,
            1 => bitmap.min().map(Segment::Single),
            n if n <= u64::from(limit) => Some(Segment::List(bitmap.iter().collect())),
            _ => Some(Segment::Bitmap(bitmap)),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Segment::Single(_) => Encoding::Single,
            Segment::List(_) => Encoding::List,
            Segment::Bitmap(_) => Encoding::Bitmap,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Segment::Single(_) => 1,
            Segment::List(offsets) => offsets.len() as u64,
            Segment::Bitmap(bitmap) => bitmap.len(),
        }
    }

    pub fn contains(&self, offset: u32) -> bool {
        match self {
            Segment::Single(only) => *only == offset,
            Segment::List(offsets) => offsets.binary_search(&offset).is_ok(),
            Segment::Bitmap(bitmap) => bitmap.contains(offset),
        }
    }

    pub fn iter(&self) -> SegmentIter<'_> {
        match self {
            Segment::Single(only) => SegmentIter::Single(std::iter::once(*only)),
            Segment::List(offsets) => SegmentIter::List(offsets.iter().copied()),
            Segment::Bitmap(bitmap) => SegmentIter::Bitmap(bitmap.iter()),
        }
    }

    pub fn first(&self) -> Option<u32> {
        match self {
            Segment::Single(only) => Some(*only),
            Segment::List(offsets) => offsets.first().copied(),
            Segment::Bitmap(bitmap) => bitmap.min(),
        }
    }

    pub fn last(&self) -> Option<u32> {
        match self {
            Segment::Single(only) => Some(*only),
            Segment::List(offsets) => offsets.last().copied(),
            Segment::Bitmap(bitmap) => bitmap.max(),
        }
    }

    /// Number of offsets in the segment less than `offset`.
    fn rank(&self, offset: u32) -> u64 {
        match self {
            Segment::Single(only) => u64::from(*only < offset),
            Segment::List(offsets) => offsets.partition_point(|o| *o < offset) as u64,
            Segment::Bitmap(bitmap) => bitmap.rank(offset) - u64::from(bitmap.contains(offset)),
        }
    }

    /// The offset at zero-based `position` in the segment.
    fn select(&self, position: u64) -> Option<u32> {
        match self {
            Segment::Single(only) => (position == 0).then_some(*only),
            Segment::List(offsets) => usize::try_from(position)
                .ok()
                .and_then(|p| offsets.get(p).copied()),
            Segment::Bitmap(bitmap) => u32::try_from(position).ok().and_then(|p| bitmap.select(p)),
        }
    }

    fn to_bitmap(&self) -> Cow<'_, RoaringBitmap> {
        match self {
            Segment::Bitmap(bitmap) => Cow::Borrowed(bitmap),
            other => Cow::Owned(other.iter().collect()),
        }
    }

    fn insert(&mut self, offset: u32, size: &SegmentSize) -> bool {
        match self {
            Segment::Single(only) => {
                if *only == offset {
                    return false;
                }
                let mut offsets = vec![*only, offset];
                offsets.sort_unstable();
                if let Some(segment) = Segment::from_sorted(offsets, size) {
                    *self = segment;
                }
                true
            }
            Segment::List(offsets) => match offsets.binary_search(&offset) {
                Ok(_) => false,
                Err(at) => {
                    offsets.insert(at, offset);
                    if offsets.len() as u64 > u64::from(size.upper_conversion_limit) {
                        *self = Segment::Bitmap(offsets.iter().copied().collect());
                    }
                    true
                }
            },
            Segment::Bitmap(bitmap) => bitmap.insert(offset),
        }
    }

    /// Remove `offset`; an emptied segment is left as an empty list for the
    /// caller to discard.
    fn remove(&mut self, offset: u32, size: &SegmentSize) -> bool {
        match self {
            Segment::Single(only) => {
                if *only != offset {
                    return false;
                }
                *self = Segment::List(Vec::new());
                true
            }
            Segment::List(offsets) => match offsets.binary_search(&offset) {
                Ok(at) => {
                    offsets.remove(at);
                    if offsets.len() == 1 {
                        *self = Segment::Single(offsets[0]);
                    }
                    true
                }
                Err(_) => false,
            },
            Segment::Bitmap(bitmap) => {
                if !bitmap.remove(offset) {
                    return false;
                }
                if bitmap.len() <= u64::from(size.lower_conversion_limit) {
                    let bitmap = std::mem::take(bitmap);
                    *self = Segment::from_bitmap(bitmap, size.lower_conversion_limit)
                        .unwrap_or(Segment::List(Vec::new()));
                }
                true
            }
        }
    }

    fn normalized(self, size: &SegmentSize, use_upper_limit: bool) -> Option<Self> {
        match self {
            Segment::Bitmap(bitmap) => {
                let limit = if use_upper_limit {
                    size.upper_conversion_limit
                } else {
                    size.lower_conversion_limit
                };
                Segment::from_bitmap(bitmap, limit)
            }
            Segment::List(offsets) => Segment::from_sorted(offsets, size),
            single => Some(single),
        }
    }

    fn combine(&self, other: &Segment, op: SetOp, size: &SegmentSize) -> Option<Segment> {
        match (self, other) {
            (Segment::Bitmap(_), _) | (_, Segment::Bitmap(_)) => {
                let combined = op.apply(&self.to_bitmap(), &other.to_bitmap());
                Segment::from_bitmap(combined, size.upper_conversion_limit)
            }
            _ => Segment::from_sorted(merge_offsets(self.iter(), other.iter(), op), size),
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.count() == other.count() && self.iter().eq(other.iter())
    }
}
impl Eq for Segment {}

fn merge_offsets(
    left: impl Iterator<Item = u32>,
    right: impl Iterator<Item = u32>,
    op: SetOp,
) -> Vec<u32> {
    let mut left: Peekable<_> = left.peekable();
    let mut right: Peekable<_> = right.peekable();
    let mut merged = Vec::new();
    loop {
        let (offset, in_left, in_right) = match (left.peek().copied(), right.peek().copied()) {
            (None, None) => break,
            (Some(l), None) => (l, true, false),
            (None, Some(r)) => (r, false, true),
            (Some(l), Some(r)) if l < r => (l, true, false),
            (Some(l), Some(r)) if r < l => (r, false, true),
            (Some(l), Some(_)) => (l, true, true),
        };
        if in_left {
            left.next();
        }
        if in_right {
            right.next();
        }
        if op.keeps(in_left, in_right) {
            merged.push(offset);
        }
    }
    merged
}

pub enum SegmentIter<'a> {
    Single(std::iter::Once<u32>),
    List(std::iter::Copied<std::slice::Iter<'a, u32>>),
    Bitmap(roaring::bitmap::Iter<'a>),
}

impl Iterator for SegmentIter<'_> {
    type Item = u32;
    fn next(&mut self) -> Option<u32> {
        match self {
            SegmentIter::Single(it) => it.next(),
            SegmentIter::List(it) => it.next(),
            SegmentIter::Bitmap(it) => it.next(),
        }
    }
}

// ------------- RecordSet -------------
#[derive(Clone)]
pub struct RecordSet {
    size: SegmentSize,
    segments: BTreeMap<u64, Segment>,
}

impl RecordSet {
    pub fn new(size: SegmentSize) -> Self {
        Self {
            size,
            segments: BTreeMap::new(),
        }
    }

    pub fn from_records(
        size: SegmentSize,
        records: impl IntoIterator<Item = RecordNumber>,
    ) -> Self {
        let mut recordset = Self::new(size);
        recordset.extend(records);
        recordset
    }

    pub fn segment_size(&self) -> SegmentSize {
        self.size
    }

    pub fn segments(&self) -> impl Iterator<Item = (u64, &Segment)> {
        self.segments.iter().map(|(number, segment)| (*number, segment))
    }

    pub fn segment(&self, number: u64) -> Option<&Segment> {
        self.segments.get(&number)
    }

    /// Add `record`; returns false if it was already present.
    pub fn insert(&mut self, record: RecordNumber) -> bool {
        let (number, offset) = self.size.split(record);
        match self.segments.entry(number) {
            Entry::Vacant(e) => {
                e.insert(Segment::Single(offset));
                true
            }
            Entry::Occupied(mut e) => e.get_mut().insert(offset, &self.size),
        }
    }

    /// Remove `record`; returns false if it was not present.
    pub fn remove(&mut self, record: RecordNumber) -> bool {
        let (number, offset) = self.size.split(record);
        let Entry::Occupied(mut e) = self.segments.entry(number) else {
            return false;
        };
        let removed = e.get_mut().remove(offset, &self.size);
        if e.get().count() == 0 {
            e.remove();
        }
        removed
    }

    pub fn contains(&self, record: RecordNumber) -> bool {
        let (number, offset) = self.size.split(record);
        self.segments
            .get(&number)
            .is_some_and(|segment| segment.contains(offset))
    }

    pub fn count(&self) -> u64 {
        self.segments.values().map(Segment::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            size: self.size,
            segments: self.segments.iter(),
            current: None,
        }
    }

    pub fn first(&self) -> Option<RecordNumber> {
        let (number, segment) = self.segments.first_key_value()?;
        segment.first().map(|offset| self.size.join(*number, offset))
    }

    pub fn last(&self) -> Option<RecordNumber> {
        let (number, segment) = self.segments.last_key_value()?;
        segment.last().map(|offset| self.size.join(*number, offset))
    }

    /// Zero-based position of `record` counting the records in the set.
    pub fn position_of(&self, record: RecordNumber) -> Option<u64> {
        if !self.contains(record) {
            return None;
        }
        let (number, offset) = self.size.split(record);
        let before: u64 = self.segments.range(..number).map(|(_, s)| s.count()).sum();
        let within = self.segments.get(&number)?.rank(offset);
        Some(before + within)
    }

    /// The record at zero-based `position`.
    pub fn record_at(&self, position: u64) -> Option<RecordNumber> {
        let mut remaining = position;
        for (number, segment) in &self.segments {
            let count = segment.count();
            if remaining < count {
                return segment
                    .select(remaining)
                    .map(|offset| self.size.join(*number, offset));
            }
            remaining -= count;
        }
        None
    }

    pub fn cursor(&self) -> RecordSetCursor<'_> {
        RecordSetCursor {
            recordset: self,
            position: None,
        }
    }

    pub fn union(&self, other: &RecordSet) -> RecordSet {
        self.combine(other, SetOp::Union)
    }

    pub fn intersection(&self, other: &RecordSet) -> RecordSet {
        self.combine(other, SetOp::Intersection)
    }

    pub fn symmetric_difference(&self, other: &RecordSet) -> RecordSet {
        self.combine(other, SetOp::SymmetricDifference)
    }

    pub fn difference(&self, other: &RecordSet) -> RecordSet {
        self.combine(other, SetOp::Difference)
    }

    pub fn union_with(&mut self, other: &RecordSet) {
        self.combine_in_place(other, SetOp::Union);
    }

    pub fn intersect_with(&mut self, other: &RecordSet) {
        self.combine_in_place(other, SetOp::Intersection);
    }

    pub fn symmetric_difference_with(&mut self, other: &RecordSet) {
        self.combine_in_place(other, SetOp::SymmetricDifference);
    }

    /// Remove every record of `other` from the set.
    pub fn remove_recordset(&mut self, other: &RecordSet) {
        self.combine_in_place(other, SetOp::Difference);
    }

    /// Make the set hold exactly the records of `other`.
    pub fn replace_records(&mut self, other: &RecordSet) {
        self.segments.clear();
        self.union_with(other);
    }

    /// Re-encode every segment for its record count. With `use_upper_limit`
    /// false, bitmaps above the lower conversion limit are left alone.
    pub fn normalize(&mut self, use_upper_limit: bool) {
        let size = self.size;
        let segments = std::mem::take(&mut self.segments);
        self.segments = segments
            .into_iter()
            .filter_map(|(number, segment)| {
                segment
                    .normalized(&size, use_upper_limit)
                    .map(|segment| (number, segment))
            })
            .collect();
    }

    fn aligned(size: SegmentSize, other: &RecordSet) -> Cow<'_, RecordSet> {
        if other.size.records == size.records {
            Cow::Borrowed(other)
        } else {
            Cow::Owned(RecordSet::from_records(size, other.iter()))
        }
    }

    fn combine(&self, other: &RecordSet, op: SetOp) -> RecordSet {
        let mut combined = self.clone();
        combined.combine_in_place(other, op);
        combined
    }

    fn combine_in_place(&mut self, other: &RecordSet, op: SetOp) {
        let size = self.size;
        let other = Self::aligned(size, other);
        if op == SetOp::Intersection {
            self.segments
                .retain(|number, _| other.segments.contains_key(number));
        }
        for (number, theirs) in &other.segments {
            match self.segments.entry(*number) {
                Entry::Vacant(e) => {
                    if op.keeps(false, true) {
                        e.insert(theirs.clone());
                    }
                }
                Entry::Occupied(mut e) => match e.get().combine(theirs, op, &size) {
                    Some(segment) => {
                        e.insert(segment);
                    }
                    None => {
                        e.remove();
                    }
                },
            }
        }
    }
}

impl Default for RecordSet {
    fn default() -> Self {
        Self::new(SegmentSize::default())
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.count() == other.count() && self.iter().eq(other.iter())
    }
}
impl Eq for RecordSet {}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<RecordNumber> for RecordSet {
    fn from_iter<I: IntoIterator<Item = RecordNumber>>(iter: I) -> Self {
        RecordSet::from_records(SegmentSize::default(), iter)
    }
}

impl Extend<RecordNumber> for RecordSet {
    fn extend<I: IntoIterator<Item = RecordNumber>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = RecordNumber;
    type IntoIter = Iter<'a>;
    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl BitOr<&RecordSet> for &RecordSet {
    type Output = RecordSet;
    fn bitor(self, rhs: &RecordSet) -> RecordSet {
        self.union(rhs)
    }
}
impl BitAnd<&RecordSet> for &RecordSet {
    type Output = RecordSet;
    fn bitand(self, rhs: &RecordSet) -> RecordSet {
        self.intersection(rhs)
    }
}
impl BitXor<&RecordSet> for &RecordSet {
    type Output = RecordSet;
    fn bitxor(self, rhs: &RecordSet) -> RecordSet {
        self.symmetric_difference(rhs)
    }
}
impl Sub<&RecordSet> for &RecordSet {
    type Output = RecordSet;
    fn sub(self, rhs: &RecordSet) -> RecordSet {
        self.difference(rhs)
    }
}
impl BitOrAssign<&RecordSet> for RecordSet {
    fn bitor_assign(&mut self, rhs: &RecordSet) {
        self.union_with(rhs);
    }
}
impl BitAndAssign<&RecordSet> for RecordSet {
    fn bitand_assign(&mut self, rhs: &RecordSet) {
        self.intersect_with(rhs);
    }
}
impl BitXorAssign<&RecordSet> for RecordSet {
    fn bitxor_assign(&mut self, rhs: &RecordSet) {
        self.symmetric_difference_with(rhs);
    }
}
impl SubAssign<&RecordSet> for RecordSet {
    fn sub_assign(&mut self, rhs: &RecordSet) {
        self.remove_recordset(rhs);
    }
}

pub struct Iter<'a> {
    size: SegmentSize,
    segments: btree_map::Iter<'a, u64, Segment>,
    current: Option<(u64, SegmentIter<'a>)>,
}

impl Iterator for Iter<'_> {
    type Item = RecordNumber;
    fn next(&mut self) -> Option<RecordNumber> {
        loop {
            if let Some((number, offsets)) = &mut self.current {
                if let Some(offset) = offsets.next() {
                    return Some(self.size.join(*number, offset));
                }
            }
            let (number, segment) = self.segments.next()?;
            self.current = Some((*number, segment.iter()));
        }
    }
}

// ------------- Cursor -------------
/// Positional navigation over a record set.
pub struct RecordSetCursor<'a> {
    recordset: &'a RecordSet,
    position: Option<u64>,
}

impl RecordSetCursor<'_> {
    pub fn count(&self) -> u64 {
        self.recordset.count()
    }
    pub fn current(&self) -> Option<RecordNumber> {
        self.position.and_then(|p| self.recordset.record_at(p))
    }
    pub fn first(&mut self) -> Option<RecordNumber> {
        self.move_to(0)
    }
    pub fn last(&mut self) -> Option<RecordNumber> {
        let count = self.recordset.count();
        if count == 0 {
            return None;
        }
        self.move_to(count - 1)
    }
    /// Step forward; from no position this is `first`.
    pub fn next(&mut self) -> Option<RecordNumber> {
        match self.position {
            None => self.first(),
            Some(p) => self.move_to(p + 1),
        }
    }
    /// Step back; from no position this is `last`.
    pub fn prev(&mut self) -> Option<RecordNumber> {
        match self.position {
            None => self.last(),
            Some(0) => None,
            Some(p) => self.move_to(p - 1),
        }
    }
    /// Position the cursor on `record` if it is in the set.
    pub fn setat(&mut self, record: RecordNumber) -> Option<RecordNumber> {
        let position = self.recordset.position_of(record)?;
        self.position = Some(position);
        Some(record)
    }
    fn move_to(&mut self, position: u64) -> Option<RecordNumber> {
        let record = self.recordset.record_at(position)?;
        self.position = Some(position);
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SegmentSize {
        SegmentSize::new(16, 3, 2)
    }

    fn set(records: &[RecordNumber]) -> RecordSet {
        RecordSet::from_records(small(), records.iter().copied())
    }

    #[test]
    fn encoding_follows_count() {
        let mut rs = set(&[1]);
        assert_eq!(rs.segment(0).map(Segment::encoding), Some(Encoding::Single));
        rs.insert(5);
        rs.insert(3);
        assert_eq!(rs.segment(0).map(Segment::encoding), Some(Encoding::List));
        rs.insert(9);
        assert_eq!(rs.segment(0).map(Segment::encoding), Some(Encoding::Bitmap));
        // shrinking keeps the bitmap until the lower limit is reached
        rs.remove(9);
        assert_eq!(rs.segment(0).map(Segment::encoding), Some(Encoding::Bitmap));
        rs.remove(5);
        assert_eq!(rs.segment(0).map(Segment::encoding), Some(Encoding::List));
        rs.remove(3);
        assert_eq!(rs.segment(0).map(Segment::encoding), Some(Encoding::Single));
        rs.remove(1);
        assert!(rs.is_empty());
        assert_eq!(rs.segment(0), None);
    }

    #[test]
    fn records_split_into_segments() {
        let rs = set(&[0, 15, 16, 40]);
        assert_eq!(rs.segments().map(|(n, _)| n).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(rs.iter().collect::<Vec<_>>(), vec![0, 15, 16, 40]);
        assert!(rs.contains(40));
        assert!(!rs.contains(41));
        assert_eq!(rs.count(), 4);
    }

    #[test]
    fn combinators_across_encodings() {
        let bitmap = set(&[0, 1, 2, 3, 4, 5, 20]);
        let list = set(&[2, 4, 6, 21]);
        let single = set(&[4]);
        assert_eq!(bitmap.union(&list), set(&[0, 1, 2, 3, 4, 5, 6, 20, 21]));
        assert_eq!(bitmap.intersection(&list), set(&[2, 4]));
        assert_eq!(bitmap.symmetric_difference(&list), set(&[0, 1, 3, 5, 6, 20, 21]));
        assert_eq!(bitmap.difference(&list), set(&[0, 1, 3, 5, 20]));
        assert_eq!(&list & &single, single);
        assert_eq!(&single - &list, set(&[]));
        // operands are untouched
        assert_eq!(list, set(&[2, 4, 6, 21]));
    }

    #[test]
    fn in_place_variants() {
        let mut scratch = set(&[1, 2, 3]);
        scratch |= &set(&[3, 4]);
        assert_eq!(scratch, set(&[1, 2, 3, 4]));
        scratch &= &set(&[2, 3, 4, 17]);
        assert_eq!(scratch, set(&[2, 3, 4]));
        scratch ^= &set(&[4, 5]);
        assert_eq!(scratch, set(&[2, 3, 5]));
        scratch -= &set(&[3]);
        assert_eq!(scratch, set(&[2, 5]));
        scratch.replace_records(&set(&[30]));
        assert_eq!(scratch, set(&[30]));
    }

    #[test]
    fn equality_ignores_encoding() {
        let mut as_bitmap = set(&[1, 2, 3, 4]);
        as_bitmap.remove(4);
        let as_list = set(&[1, 2, 3]);
        assert_eq!(as_bitmap.segment(0).map(Segment::encoding), Some(Encoding::Bitmap));
        assert_eq!(as_list.segment(0).map(Segment::encoding), Some(Encoding::List));
        assert_eq!(as_bitmap, as_list);
        as_bitmap.normalize(true);
        assert_eq!(as_bitmap.segment(0).map(Segment::encoding), Some(Encoding::List));
    }

    #[test]
    fn positions_and_cursor() {
        let rs = set(&[3, 7, 18, 33, 34]);
        assert_eq!(rs.position_of(18), Some(2));
        assert_eq!(rs.position_of(19), None);
        assert_eq!(rs.record_at(4), Some(34));
        assert_eq!(rs.record_at(5), None);
        assert_eq!((rs.first(), rs.last()), (Some(3), Some(34)));

        let mut cursor = rs.cursor();
        assert_eq!(cursor.current(), None);
        assert_eq!(cursor.next(), Some(3));
        assert_eq!(cursor.next(), Some(7));
        assert_eq!(cursor.setat(33), Some(33));
        assert_eq!(cursor.next(), Some(34));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.current(), Some(34));
        assert_eq!(cursor.prev(), Some(33));
        assert_eq!(cursor.first(), Some(3));
        assert_eq!(cursor.prev(), None);
    }

    #[test]
    fn different_segment_sizes_combine_by_membership() {
        let wide = RecordSet::from_records(SegmentSize::new(1024, 10, 5), [1, 100, 500]);
        let narrow = set(&[100, 501]);
        let union = narrow.union(&wide);
        assert_eq!(union.segment_size(), small());
        assert_eq!(union.iter().collect::<Vec<_>>(), vec![1, 100, 500, 501]);
    }
}
