use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retrieval_core::{Document, InvertedIndex};

const WORDS: &[&str] = &[
    "shark", "escape", "room", "prison", "space", "alien", "love", "war", "detective", "heist",
    "island", "robot", "dragon", "storm", "city", "train", "ghost", "family", "music", "desert",
];

fn corpus(n: u32) -> Vec<Document> {
    (0..n)
        .map(|i| {
            let pick = |k: u32| WORDS[((i * 7 + k * 13) as usize) % WORDS.len()];
            let description = (0..12).map(pick).collect::<Vec<_>>().join(" ");
            Document::new(i, format!("{} {}", pick(1), pick(2)), description).expect("valid document")
        })
        .collect()
}

fn bench_bm25(c: &mut Criterion) {
    let index = InvertedIndex::build(corpus(5_000)).expect("index builds");
    c.bench_function("bm25_search_5k", |b| b.iter(|| index.bm25_search(black_box("shark escape island"), 10)));
    c.bench_function("build_1k", |b| b.iter(|| InvertedIndex::build(corpus(1_000))));
}

criterion_group!(benches, bench_bm25);
criterion_main!(benches);
