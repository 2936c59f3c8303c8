use criterion::{criterion_group, criterion_main, Criterion};
use retrieval_core::tokenizer::tokenize;

const TEXT: &str = "When a killer shark unleashes chaos on a beach community off Long Island, \
it's up to a local police chief, a marine biologist, and an old seafarer to hunt the beast down. \
The summer season is at stake, and the mayor refuses to close the beaches.";

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_description", |b| b.iter(|| tokenize(TEXT)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
