use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use classguard_auth::{Caller, Principal};
use classguard_core::{Row, UserId};
use classguard_policy::{PolicyEngine, Relation, RowFilter, RowSource, sql};
use serde_json::json;
use std::collections::HashMap;

struct Snapshot(HashMap<Relation, Vec<Row>>);

impl RowSource for Snapshot {
    fn rows(&self, relation: Relation) -> &[Row] {
        self.0.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn row(v: serde_json::Value) -> Row {
    Row::try_from(v).unwrap_or_default()
}

/// `classrooms` classrooms, each with 10 assignments and 30 students.
fn snapshot(classrooms: u128) -> Snapshot {
    let mut tables: HashMap<Relation, Vec<Row>> = HashMap::new();
    for c in 0..classrooms {
        let classroom = UserId::from_u128(0xc000_0000 + c).to_string();
        let teacher = UserId::from_u128(c % 8).to_string();
        tables
            .entry(Relation::Classrooms)
            .or_default()
            .push(row(json!({"id": classroom, "teacher_id": teacher})));
        for a in 0..10 {
            let assignment = UserId::from_u128(0xa000_0000 + c * 100 + a).to_string();
            tables
                .entry(Relation::Assignments)
                .or_default()
                .push(row(json!({"id": assignment, "classroom_id": classroom})));
            for s in 0..30 {
                let student = UserId::from_u128(0x5000_0000 + s).to_string();
                tables.entry(Relation::Progress).or_default().push(row(json!({
                    "id": format!("{c}-{a}-{s}"),
                    "user_id": student,
                    "assignment_id": assignment,
                    "status": "submitted",
                })));
            }
        }
    }
    Snapshot(tables)
}

fn bench_read_filter(c: &mut Criterion) {
    let engine = PolicyEngine::default();
    let teacher: Caller = Principal::teacher(UserId::from_u128(1)).into();

    c.bench_function("read_filter/teacher_progress", |b| {
        b.iter(|| {
            engine
                .read_filter(black_box(&teacher), Relation::Progress, &RowFilter::All)
                .map(|f| black_box(f))
        })
    });
}

fn bench_resolve_and_match(c: &mut Criterion) {
    let engine = PolicyEngine::default();
    let teacher: Caller = Principal::teacher(UserId::from_u128(1)).into();
    let filter = engine
        .read_filter(&teacher, Relation::Progress, &RowFilter::All)
        .unwrap_or(RowFilter::Nothing);

    let mut group = c.benchmark_group("resolve_and_match");
    for classrooms in [4u128, 16, 64] {
        let source = snapshot(classrooms);
        group.bench_with_input(BenchmarkId::from_parameter(classrooms), &source, |b, source| {
            b.iter(|| {
                let resolved = filter.resolve(source);
                source
                    .rows(Relation::Progress)
                    .iter()
                    .filter(|r| resolved.matches(r))
                    .count()
            })
        });
    }
    group.finish();
}

fn bench_render_sql(c: &mut Criterion) {
    let engine = PolicyEngine::default();
    let teacher: Caller = Principal::teacher(UserId::from_u128(1)).into();
    let filter = engine
        .read_filter(&teacher, Relation::Progress, &RowFilter::eq("status", "submitted"))
        .unwrap_or(RowFilter::Nothing);

    c.bench_function("sql/render_where", |b| b.iter(|| sql::render_where(black_box(&filter))));
}

criterion_group!(benches, bench_read_filter, bench_resolve_and_match, bench_render_sql);
criterion_main!(benches);
