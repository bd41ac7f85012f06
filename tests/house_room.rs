mod common;

use common::{all_but, house_room, query, scan};
use whereset::memory::MemoryDatabase;
use whereset::recordset::RecordNumber;

fn setup() -> MemoryDatabase {
    house_room()
}

fn check(db: &MemoryDatabase, statement: &str, expected: &[RecordNumber]) {
    assert_eq!(query(db, statement), expected, "indexed answer for '{statement}'");
    assert_eq!(scan(db, statement), expected, "scanned answer for '{statement}'");
}

#[test]
fn like() {
    let db = setup();
    check(&db, "f1 like a", &[]);
    check(&db, "f1 like b", &[0]);
    check(&db, "f2 like p", &[2, 3]);
    check(&db, "f3 like a", &[0, 1, 3]);
    check(&db, "f4 like a", &[0, 1, 2, 3, 4, 8]);
    check(&db, "f4 like b", &[5, 6, 7, 8]);
    check(&db, r"f4 like \Aa", &[0, 3, 4]);
    check(&db, r"f4 like \Ab", &[5]);
    check(&db, "f3 like a$", &[0, 3]);
    check(&db, "f4 like A", &[0, 1, 2, 3, 4, 8]);
}

#[test]
fn like_negations() {
    let db = setup();
    check(&db, "not f1 like a", &all_but(&[]));
    check(&db, "f4 not like a", &[5, 6, 7, 9]);
    check(&db, "not f4 not like a", &[0, 1, 2, 3, 4, 8]);
    assert_eq!(
        query(&db, "not f1 not like a"),
        query(&db, "f1 like a"),
        "double negation cancels"
    );
}

#[test]
fn eq() {
    let db = setup();
    check(&db, "f1 eq b", &[0]);
    check(&db, "f2 eq p", &[2, 3]);
    check(&db, "f3 eq a", &[0]);
    check(&db, "not f3 eq a", &all_but(&[0]));
    check(&db, "f eq 7", &[7]);
}

#[test]
fn present() {
    let db = setup();
    check(&db, "f4 present", &all_but(&[]));
    check(&db, "f5 present", &[0, 2, 4, 6, 8]);
    check(&db, "f6 present", &[]);
    check(&db, "not f5 present", &[1, 3, 5, 7, 9]);
    check(&db, "not f4 not present", &all_but(&[]));
}

#[test]
fn is() {
    let db = setup();
    check(&db, "f4 is xb", &[6]);
    check(&db, "f5 is df", &[4, 6]);
    check(&db, "not f5 is df", &[0, 1, 2, 3, 5, 7, 8, 9]);
    check(&db, "f4 is not xb", &all_but(&[6]));
    check(&db, "f5 is not df", &[0, 2, 8]);
    check(&db, "f6 is not v", &[]);
    check(&db, "not f5 is not df", &[1, 3, 4, 5, 6, 7, 9]);
    check(&db, "not f6 is not v", &all_but(&[]));
}

#[test]
fn ranges() {
    let db = setup();
    check(&db, "f3 from 22 to b", &[0, 1, 2, 9]);
    check(&db, "f4 from axb to xba", &[1, 2, 5, 6, 9]);
    check(&db, "f5 from df to dg", &[4, 6, 8]);
    check(&db, "f3 from 22 below b", &[0, 1, 9]);
    check(&db, "f5 from df below dg", &[4, 6]);
    check(&db, "f3 above 22 below b", &[0, 1, 9]);
    check(&db, "f5 above df below dg", &[]);
    check(&db, "f5 above df to dg", &[8]);
    check(&db, "f3 above 22 to b", &[0, 1, 2, 9]);
    check(&db, "f3 from b to a", &[]);
    check(&db, "f3 not from 22 to b", &[3, 4, 5, 6, 7, 8]);
}

#[test]
fn ne() {
    let db = setup();
    check(&db, "f1 ne e", &all_but(&[3]));
    check(&db, "f2 ne q", &all_but(&[]));
    check(&db, "f4 ne b", &all_but(&[5]));
    check(&db, "f1 not ne e", &[3]);
    check(&db, "not f1 ne e", &[3]);
    check(&db, "f2 not ne q", &[]);
    check(&db, "not f1 not ne e", &all_but(&[3]));
}

#[test]
fn gt_and_lt() {
    let db = setup();
    check(&db, "f1 gt e", &[4, 5, 6, 7, 8, 9]);
    check(&db, "f2 gt q", &[4, 5, 6, 7, 8]);
    check(&db, "f2 gt r", &[5, 6, 7, 8]);
    check(&db, "f4 gt b", &[1, 2, 6, 7, 8, 9]);
    check(&db, "f1 not gt e", &[0, 1, 2, 3]);
    check(&db, "f2 not gt q", &[0, 1, 2, 3, 9]);
    check(&db, "f4 not gt b", &[0, 3, 4, 5]);
    check(&db, "f1 lt e", &[0, 1, 2]);
    check(&db, "f2 lt q", &[0, 1, 2, 3, 9]);
    check(&db, "f2 lt r", &[0, 1, 2, 3, 4, 9]);
    check(&db, "f4 lt b", &[0, 3, 4]);
    check(&db, "f1 not lt e", &[3, 4, 5, 6, 7, 8, 9]);
    check(&db, "f2 not lt q", &[4, 5, 6, 7, 8]);
    check(&db, "f1 ge e and le g", &[3, 4, 5]);
    check(&db, "f1 after e and before g", &[4]);
}

#[test]
fn starts() {
    let db = setup();
    check(&db, "f4 starts xb", &[6, 7, 8]);
    check(&db, "f3 starts 2", &[7, 8, 9]);
    check(&db, "f3 not starts b", &[0, 1, 5, 6, 7, 8, 9]);
}

#[test]
fn parentheses_do_not_change_answers() {
    let db = setup();
    let forms = [
        ("f4 like b or f5 is df", "( f4 like b or f5 is df )"),
        ("not f4 like b", "not ( f4 like b )"),
        ("not f4 like b", "( not f4 like b )"),
        ("f1 like a or f2 eq p", "( f1 like a or f2 eq p )"),
        ("f3 like a and f5 present", "((f3 like a) and (f5 present))"),
    ];
    for (plain, grouped) in forms {
        assert_eq!(query(&db, plain), query(&db, grouped), "'{plain}' vs '{grouped}'");
    }
}

#[test]
fn booleans_combine_phrases() {
    let db = setup();
    check(&db, "f5 present and f4 like b", &[6, 8]);
    check(&db, "f5 present nor f4 like b", &[0, 2, 4]);
    check(&db, "f5 present or f4 like b", &[0, 2, 4, 5, 6, 7, 8]);
    check(&db, "f1 eq b or c or d", &[0, 1, 2]);
    check(&db, "f1 gt b and lt e or f eq 9", &[1, 2, 9]);
    check(&db, "not ( f5 present or f4 like b )", &[1, 3, 9]);
    check(&db, "f4 like a and not ( f5 is de or f eq 3 )", &[1, 4, 8]);
}

#[test]
fn unindexed_field_mixed_with_indexes() {
    let db = setup();
    check(&db, "f eq 3 or f1 eq b", &[0, 3]);
    check(&db, "f1 eq b or f eq 3", &[0, 3]);
    check(&db, "f5 present and f ge 5", &[6, 8]);
    check(&db, "f ge 5 and f5 present or f1 eq b", &[0, 6, 8]);
    check(&db, "f1 eq b nor f eq 0", &[]);
    check(&db, "f like 1 or f3 like a$ and f ne 0", &[1, 3]);
}
