use std::collections::BTreeSet;

use proptest::prelude::*;
use whereset::recordset::{Encoding, RecordNumber, RecordSet, SegmentSize};

fn setup() -> SegmentSize {
    SegmentSize::new(16, 3, 2)
}

fn encodings(set: &RecordSet) -> Vec<(u64, Encoding)> {
    set.segments().map(|(n, s)| (n, s.encoding())).collect()
}

fn members(set: &RecordSet) -> BTreeSet<RecordNumber> {
    set.iter().collect()
}

#[test]
fn segments_change_encoding_as_they_fill_and_drain() {
    let size = setup();
    let mut set = RecordSet::new(size);
    set.insert(17);
    assert_eq!(encodings(&set), vec![(1, Encoding::Single)], "one record");
    set.extend([18, 19]);
    assert_eq!(encodings(&set), vec![(1, Encoding::List)], "three records");
    set.insert(20);
    assert_eq!(encodings(&set), vec![(1, Encoding::Bitmap)], "over the upper limit");
    set.remove(20);
    assert_eq!(encodings(&set), vec![(1, Encoding::Bitmap)], "above the lower limit");
    set.remove(19);
    assert_eq!(encodings(&set), vec![(1, Encoding::List)], "down to the lower limit");
    set.remove(18);
    assert_eq!(encodings(&set), vec![(1, Encoding::Single)], "one left");
    set.remove(17);
    assert!(set.is_empty(), "emptied");
    assert_eq!(set.segments().count(), 0, "no empty segments kept");
}

#[test]
fn normalize_picks_the_smallest_encoding() {
    let size = setup();
    let mut set = RecordSet::from_records(size, 0..4);
    set.remove(3);
    assert_eq!(encodings(&set), vec![(0, Encoding::Bitmap)], "hysteresis");
    set.normalize(false);
    assert_eq!(encodings(&set), vec![(0, Encoding::Bitmap)], "lower limit");
    set.normalize(true);
    assert_eq!(encodings(&set), vec![(0, Encoding::List)], "upper limit");
}

#[test]
fn positions_and_cursor() {
    let set = RecordSet::from_records(setup(), [3, 5, 16, 40, 41, 42, 43, 44]);
    assert_eq!(set.count(), 8, "count");
    assert_eq!(set.position_of(16), Some(2), "position");
    assert_eq!(set.position_of(17), None, "not a member");
    assert_eq!(set.record_at(5), Some(42), "record at position");
    assert_eq!(set.record_at(8), None, "past the end");
    assert_eq!((set.first(), set.last()), (Some(3), Some(44)), "ends");

    let mut cursor = set.cursor();
    assert_eq!(cursor.first(), Some(3), "first");
    assert_eq!(cursor.next(), Some(5), "next");
    assert_eq!(cursor.setat(20), None, "setat needs a member");
    assert_eq!(cursor.current(), Some(5), "cursor left where it was");
    assert_eq!(cursor.setat(40), Some(40), "setat");
    assert_eq!(cursor.prev(), Some(16), "prev");
    assert_eq!(cursor.last(), Some(44), "last");
    assert_eq!(cursor.next(), None, "past the end");
}

#[test]
fn operators_match_methods() {
    let size = setup();
    let a = RecordSet::from_records(size, [1, 2, 3, 20, 40]);
    let b = RecordSet::from_records(size, [2, 3, 4, 40, 41]);
    assert_eq!(&a | &b, a.union(&b), "union");
    assert_eq!(&a & &b, a.intersection(&b), "intersection");
    assert_eq!(&a ^ &b, a.symmetric_difference(&b), "symmetric difference");
    assert_eq!(&a - &b, a.difference(&b), "difference");
    let mut c = a.clone();
    c -= &b;
    assert_eq!(members(&c), BTreeSet::from([1, 20]), "difference assign");
}

fn arb_records() -> impl Strategy<Value = BTreeSet<RecordNumber>> {
    prop::collection::btree_set(0u64..200, 0..60)
}

fn arb_size() -> impl Strategy<Value = SegmentSize> {
    (1u32..40, 0u32..8, 0u32..8)
        .prop_map(|(records, upper, lower)| SegmentSize::new(records, upper, lower))
}

proptest! {
    #[test]
    fn encodings_keep_membership(records in arb_records(), size in arb_size()) {
        let mut set = RecordSet::from_records(size, records.iter().copied());
        prop_assert_eq!(members(&set), records.clone());
        set.normalize(true);
        prop_assert_eq!(members(&set), records.clone());
        prop_assert_eq!(set.count(), records.len() as u64);
        let rebuilt: RecordSet = set.iter().collect();
        prop_assert_eq!(&rebuilt, &set);
    }

    #[test]
    fn combinations_match_sets(
        a in arb_records(),
        b in arb_records(),
        size_a in arb_size(),
        size_b in arb_size(),
    ) {
        let x = RecordSet::from_records(size_a, a.iter().copied());
        let y = RecordSet::from_records(size_b, b.iter().copied());
        prop_assert_eq!(members(&x.union(&y)), &a | &b);
        prop_assert_eq!(members(&x.intersection(&y)), &a & &b);
        prop_assert_eq!(members(&x.symmetric_difference(&y)), &a ^ &b);
        prop_assert_eq!(members(&x.difference(&y)), &a - &b);
        let mut z = x.clone();
        z.remove_recordset(&y);
        prop_assert_eq!(members(&z), &a - &b);
    }

    #[test]
    fn combinations_commute_and_associate(
        a in arb_records(),
        b in arb_records(),
        c in arb_records(),
        size in arb_size(),
    ) {
        let x = RecordSet::from_records(size, a);
        let y = RecordSet::from_records(size, b);
        let z = RecordSet::from_records(size, c);
        prop_assert_eq!(x.union(&y), y.union(&x));
        prop_assert_eq!(x.intersection(&y), y.intersection(&x));
        prop_assert_eq!(x.symmetric_difference(&y), y.symmetric_difference(&x));
        prop_assert_eq!(x.union(&y).union(&z), x.union(&y.union(&z)));
        prop_assert_eq!(x.intersection(&y).intersection(&z), x.intersection(&y.intersection(&z)));
        prop_assert_eq!(
            x.symmetric_difference(&y).symmetric_difference(&z),
            x.symmetric_difference(&y.symmetric_difference(&z))
        );
    }

    #[test]
    fn cursor_walks_every_member(records in arb_records(), size in arb_size()) {
        let set = RecordSet::from_records(size, records.iter().copied());
        let mut cursor = set.cursor();
        let mut walked = Vec::new();
        let mut at = cursor.first();
        while let Some(record) = at {
            walked.push(record);
            at = cursor.next();
        }
        prop_assert_eq!(walked, records.iter().copied().collect::<Vec<_>>());
        for (position, record) in records.iter().enumerate() {
            prop_assert_eq!(set.position_of(*record), Some(position as u64));
        }
    }
}
