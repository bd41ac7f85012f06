use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use whereset::config::EngineConfig;
use whereset::memory::MemoryDatabase;
use whereset::recordset::{RecordSet, SegmentSize};
use whereset::statement::Where;

pub fn recordset_benchmark(c: &mut Criterion) {
    let size = SegmentSize::default();
    let mut r1 = RecordSet::new(size);
    let mut r2 = RecordSet::new(size);
    c.bench_function("intersect 0", |b| b.iter(|| black_box(r1.intersection(&r2))));
    r1.insert(42);
    r2.insert(42);
    c.bench_function("intersect 1", |b| b.iter(|| black_box(r1.intersection(&r2))));
    r1.extend(1..1000);
    r2.extend((1..1000).step_by(3));
    println!("{:?}", r1.segments().map(|(_, s)| s.encoding()).collect::<Vec<_>>());
    c.bench_function("intersect 1k", |b| b.iter(|| black_box(r1.intersection(&r2))));
    c.bench_function("union 1k", |b| b.iter(|| black_box(r1.union(&r2))));
    r1.extend(100_000..200_000);
    r2.extend((100_000..200_000).step_by(7));
    c.bench_function("intersect 100k", |b| b.iter(|| black_box(r1.intersection(&r2))));
    c.bench_function("union 100k", |b| b.iter(|| black_box(r1.union(&r2))));
    r1.extend(1_000_000..2_000_000);
    r2.extend((1_000_000..2_000_000).step_by(2));
    println!("{} and {} records", r1.count(), r2.count());
    c.bench_function("intersect 1M", |b| b.iter(|| black_box(r1.intersection(&r2))));
    c.bench_function("union 1M", |b| b.iter(|| black_box(r1.union(&r2))));
    c.bench_function("difference 1M", |b| b.iter(|| black_box(r1.difference(&r2))));
}

pub fn query_benchmark(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut db = MemoryDatabase::from_config(&config);
    db.create_file("people", &["name", "town"], &["age"]);
    let towns = ["york", "leeds", "hull", "ripon", "selby"];
    for n in 0..20_000u32 {
        let name = format!("n{n:05}");
        let age = (n % 90).to_string();
        db.add_record(
            "people",
            &[("name", &name), ("town", towns[n as usize % towns.len()]), ("age", &age)],
        )
        .expect("record added");
    }
    for statement in [
        "town eq york or town eq hull",
        "name starts n1 and not town eq leeds",
        "town eq ripon and age from 20 to 29",
        "age like ^1 or town eq selby",
    ] {
        c.bench_function(statement, |b| {
            b.iter(|| black_box(Where::run(statement, &db, "people").expect("query ok")))
        });
    }
}

criterion_group!(benches, recordset_benchmark, query_benchmark);
criterion_main!(benches);
