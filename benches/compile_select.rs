use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use querykit::placeholders::interpolate;
use querykit::prelude::*;
use querykit::test_utils::RecordingDriver;

fn driver_for(dialect: Dialect) -> RecordingDriver {
    match dialect {
        Dialect::MySql => RecordingDriver::mysql(),
        Dialect::Postgres => RecordingDriver::postgres(),
    }
}

fn compile_filtered_select(db: &mut dyn Driver, predicates: usize) -> DbResult<QueryAndParams> {
    let mut builder = db.table("orders");
    builder
        .select("id, customer_id, total")
        .join("customers c", "c.id = orders.customer_id", "left");
    for n in 0..predicates as i64 {
        if n % 3 == 0 {
            builder.group_start().where_("status", "=", "open").or_where("total", ">", n);
            builder.group_end();
        } else {
            builder.where_in("region", [n, n + 1, n + 2]);
        }
    }
    builder.order_by("total", "DESC").limit(50);
    builder.fragments().compile_select()
}

fn select_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_select");
    for dialect in [Dialect::MySql, Dialect::Postgres] {
        for predicates in [1usize, 10, 100] {
            let mut driver = driver_for(dialect);
            group.throughput(Throughput::Elements(predicates as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{dialect:?}"), predicates),
                &predicates,
                |b, &predicates| {
                    b.iter(|| black_box(compile_filtered_select(&mut driver, predicates)));
                },
            );
        }
    }
    group.finish();
}

fn literal_interpolation(c: &mut Criterion) {
    let mut driver = RecordingDriver::postgres();
    let query = match compile_filtered_select(&mut driver, 100) {
        Ok(query) => query,
        Err(err) => panic!("benchmark query failed to compile: {err}"),
    };
    c.bench_function("interpolate_postgres_100", |b| {
        b.iter(|| black_box(interpolate(&query.query, &query.params, Dialect::Postgres)));
    });
}

criterion_group!(benches, select_compilation, literal_interpolation);
criterion_main!(benches);
