use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_core::{Declared, Method, ParamDecl, ParamType, Signature};
use trellis_router::Router;

type Handler = Declared<usize>;

fn build_router(routes: usize) -> Router<Handler> {
    let mut api = Router::with_prefix("/api").unwrap();
    for i in 0..routes {
        api.get(&format!("/static/{i}"), Declared::new(i, Signature::new()))
            .unwrap();
        api.get(
            &format!("/items{i}/{{id:digit}}"),
            Declared::new(i, Signature::new().param(ParamDecl::new("id", ParamType::Int))),
        )
        .unwrap();
    }
    let mut app = Router::new();
    app.include_router(api).unwrap();
    app
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");
    for routes in [10, 100] {
        let router = build_router(routes);
        let last = routes - 1;
        let static_path = format!("/api/static/{last}");
        let dynamic_path = format!("/api/items{last}/42");

        group.bench_with_input(BenchmarkId::new("static", routes), &static_path, |b, path| {
            b.iter(|| router.find(black_box(path), Some(Method::Get)).code());
        });
        group.bench_with_input(BenchmarkId::new("placeholder", routes), &dynamic_path, |b, path| {
            b.iter(|| router.find(black_box(path), Some(Method::Get)).code());
        });
        group.bench_with_input(BenchmarkId::new("resolve", routes), &dynamic_path, |b, path| {
            b.iter(|| router.resolve(black_box(path), Method::Get).map(|r| r.params.len()));
        });
        group.bench_function(BenchmarkId::new("miss", routes), |b| {
            b.iter(|| router.find(black_box("/api/nowhere/1"), None).code());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find);
criterion_main!(benches);
