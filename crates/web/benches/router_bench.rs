use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::Method;
use tern_web::Router;

fn router() -> Router<&'static str> {
    Router::builder()
        .on(&[], "/", "index")
        .on(&[], "/test/exact", "exact")
        .on(&[], "/test/{number:int}", "number")
        .on(&[], "/test/{string:str}", "string")
        .on(&[], "/test/{number:int}-{id:int}", "number-id")
        .on(&[], "/users/{id:uuid}/posts/{post:int}", "post")
        .on(&[], "/files/{path}", "files")
        .build()
        .expect("bench routes should be valid")
}

fn benchmark_router_find(criterion: &mut Criterion) {
    let router = router();
    let paths = [
        ("exact", "/test/exact"),
        ("int", "/test/42"),
        ("str", "/test/something"),
        ("two_ints", "/test/24-42"),
        ("uuid", "/users/16fd2706-8baf-433b-82eb-8c7fada847da/posts/7"),
        ("catch_all", "/files/a/b/c.txt"),
    ];

    let mut group = criterion.benchmark_group("router_find");
    for (name, path) in paths {
        group.bench_with_input(BenchmarkId::from_parameter(name), path, |b, path| {
            b.iter(|| black_box(router.find(&Method::GET, black_box(path)).expect("bench path should match")));
        });
    }
    group.finish();
}

criterion_group!(router_find, benchmark_router_find);
criterion_main!(router_find);
