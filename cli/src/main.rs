use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retrieval_core::chunking::{fixed_size_chunks, sentence_chunks};
use retrieval_core::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_SEARCH_LIMIT, DEFAULT_SEMANTIC_CHUNK_OVERLAP, DEFAULT_SEMANTIC_CHUNK_SIZE,
};
use retrieval_core::corpus::load_documents;
use retrieval_core::persist::IndexPaths;
use retrieval_core::{
    normalize_scores, EmbeddingProvider, FlatVectorIndex, FusedResult, HashEmbedder, HybridSearch, InvertedIndex,
    SearchConfig, VectorIndex,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "retrieval")]
#[command(about = "Build a BM25 index and run keyword, semantic and hybrid searches", long_about = None)]
struct Cli {
    /// Index directory path
    #[arg(long, global = true, default_value = "./cache/index")]
    index: String,
    /// Optional JSON file overriding search tunables
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index (and embedding cache) from a JSON/JSONL file or directory
    Build {
        #[arg(long, default_value = "./data/movies.json")]
        input: String,
    },
    /// BM25 keyword search
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Raw term frequency of a term in a document
    Tf { doc_id: u32, term: String },
    /// Smoothed inverse document frequency of a term
    Idf { term: String },
    /// TF-IDF of a term in a document
    Tfidf { doc_id: u32, term: String },
    /// BM25 IDF of a term
    Bm25idf { term: String },
    /// BM25 saturated term frequency of a term in a document
    Bm25tf {
        doc_id: u32,
        term: String,
        /// Tunable BM25 k1 parameter
        #[arg(allow_negative_numbers = true)]
        k1: Option<f64>,
        /// Tunable BM25 b parameter
        #[arg(allow_negative_numbers = true)]
        b: Option<f64>,
    },
    /// Embed a piece of text and show its first dimensions
    EmbedText { text: String },
    /// Inspect the cached chunk embeddings next to the index
    VerifyEmbeddings,
    /// Split text into fixed-size word chunks
    Chunk {
        text: String,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(long, default_value_t = 0)]
        overlap: usize,
    },
    /// Split text into groups of sentences
    SemanticChunk {
        text: String,
        #[arg(long, default_value_t = DEFAULT_SEMANTIC_CHUNK_SIZE)]
        max_chunk_size: usize,
        #[arg(long, default_value_t = DEFAULT_SEMANTIC_CHUNK_OVERLAP)]
        overlap: usize,
    },
    /// Nearest documents by embedding similarity
    SemanticSearch {
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Min-max normalize a list of scores
    Normalize {
        #[arg(required = true, allow_negative_numbers = true)]
        scores: Vec<f64>,
    },
    /// Hybrid search fusing normalized BM25 and semantic scores
    WeightedSearch {
        query: String,
        #[arg(long)]
        alpha: Option<f64>,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Hybrid search by Reciprocal Rank Fusion
    RrfSearch {
        query: String,
        #[arg(short)]
        k: Option<u32>,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SearchConfig::from_json_file(path).with_context(|| format!("reading config {path}"))?,
        None => SearchConfig::default(),
    };
    let paths = IndexPaths::new(&cli.index);

    match cli.command {
        Commands::Build { input } => build(&input, &paths, &config),
        Commands::Search { query, limit } => {
            println!("Searching for: {query}");
            let index = InvertedIndex::load(&paths)?;
            for (i, hit) in index.bm25_search_with(&query, limit, config.bm25)?.iter().enumerate() {
                println!("{}. ({}) {} - score {:.2}", i + 1, hit.id, hit.title, hit.score);
            }
            Ok(())
        }
        Commands::Tf { doc_id, term } => {
            let tf = InvertedIndex::load(&paths)?.get_term_frequency(doc_id, &term)?;
            println!("Term frequency of '{term}' in document '{doc_id}': {tf}");
            Ok(())
        }
        Commands::Idf { term } => {
            let idf = InvertedIndex::load(&paths)?.get_inverse_document_frequency(&term)?;
            println!("Inverse document frequency of '{term}': {idf:.2}");
            Ok(())
        }
        Commands::Tfidf { doc_id, term } => {
            let tf_idf = InvertedIndex::load(&paths)?.get_tf_idf(doc_id, &term)?;
            println!("TF-IDF score of '{term}' in document '{doc_id}': {tf_idf:.2}");
            Ok(())
        }
        Commands::Bm25idf { term } => {
            let idf = InvertedIndex::load(&paths)?.get_bm25_inverse_document_frequency(&term)?;
            println!("BM25 IDF score of '{term}': {idf:.2}");
            Ok(())
        }
        Commands::Bm25tf { doc_id, term, k1, b } => {
            let k1 = k1.unwrap_or(config.bm25.k1);
            let b = b.unwrap_or(config.bm25.b);
            let tf = InvertedIndex::load(&paths)?.get_bm25_term_frequency(doc_id, &term, k1, b)?;
            println!("BM25 TF score of '{term}' in document '{doc_id}': {tf:.2}");
            Ok(())
        }
        Commands::EmbedText { text } => {
            let embedding = HashEmbedder::new(config.embedding_dim)?.embed(&text)?;
            println!("Text: {text}");
            println!("First 3 dimensions: {:?}", &embedding[..embedding.len().min(3)]);
            println!("Dimensions: {}", embedding.len());
            Ok(())
        }
        Commands::VerifyEmbeddings => verify_embeddings(&paths),
        Commands::Chunk { text, chunk_size, overlap } => {
            let chunks = fixed_size_chunks(&text, chunk_size, overlap)?;
            print_chunks(text.chars().count(), &chunks);
            Ok(())
        }
        Commands::SemanticChunk { text, max_chunk_size, overlap } => {
            let chunks = sentence_chunks(&text, max_chunk_size, overlap)?;
            print_chunks(text.chars().count(), &chunks);
            Ok(())
        }
        Commands::SemanticSearch { query, limit } => {
            let engine = HybridSearch::open(&paths, config)?;
            for (i, m) in engine.semantic_search(&query, limit).await?.iter().enumerate() {
                println!("{}. {} (score: {:.4})", i + 1, m.document.title, m.score);
                println!("   {}", preview(&m.document.description));
            }
            Ok(())
        }
        Commands::Normalize { scores } => {
            for score in normalize_scores(&scores) {
                println!("* {score:.4}");
            }
            Ok(())
        }
        Commands::WeightedSearch { query, alpha, limit } => {
            let alpha = alpha.unwrap_or(config.alpha);
            let engine = HybridSearch::open(&paths, config)?;
            let results = engine.weighted_search(&query, alpha, limit).await?;
            print_weighted(&results);
            Ok(())
        }
        Commands::RrfSearch { query, k, limit } => {
            let k = k.unwrap_or(config.rrf_k);
            let engine = HybridSearch::open(&paths, config)?;
            let results = engine.rrf_search(&query, k, limit).await?;
            print_rrf(&results);
            Ok(())
        }
    }
}

fn build(input: &str, paths: &IndexPaths, config: &SearchConfig) -> Result<()> {
    let documents = load_documents(input).with_context(|| format!("loading documents from {input}"))?;
    let index = InvertedIndex::build(documents)?;
    index.save(paths)?;

    let embedder = HashEmbedder::new(config.embedding_dim)?;
    let vectors = FlatVectorIndex::build(
        index.documents().cloned(),
        &embedder,
        config.semantic_chunk_size,
        config.semantic_chunk_overlap,
    )?;
    vectors.save(&paths.embeddings())?;
    tracing::info!(index = %paths.root.display(), num_docs = index.num_docs(), "index build complete");
    Ok(())
}

fn verify_embeddings(paths: &IndexPaths) -> Result<()> {
    let path = paths.embeddings();
    let vectors = FlatVectorIndex::load(&path).with_context(|| format!("reading {}", path.display()))?;
    let (max_sentences, overlap) = vectors.chunking();
    println!("Number of docs: {}", vectors.len());
    println!("Number of chunks: {}", vectors.num_chunks());
    println!("Embedding dimension: {}", vectors.dimension());
    println!("Chunking: {max_sentences} sentences, overlap {overlap}");
    if paths.exists() {
        let indexed = InvertedIndex::load(paths)?.num_docs();
        if indexed != vectors.len() {
            println!("Warning: index holds {indexed} documents; embeddings are stale");
        }
    }
    Ok(())
}

fn print_chunks(chars: usize, chunks: &[String]) {
    println!("Chunking {chars} characters");
    for (i, chunk) in chunks.iter().enumerate() {
        println!("{}. {chunk}", i + 1);
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(100).collect();
    if text.chars().count() > 100 {
        out.push_str("...");
    }
    out
}

fn print_weighted(results: &[FusedResult]) {
    for (i, r) in results.iter().enumerate() {
        println!("{}. {}", i + 1, r.title);
        println!("   Hybrid Score: {:.4}", r.score);
        println!("   BM25: {:.4}, Semantic: {:.4}", r.lexical_score, r.semantic_score);
        println!("   {}", preview(&r.description));
    }
}

fn print_rrf(results: &[FusedResult]) {
    let rank = |v: Option<usize>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
    for (i, r) in results.iter().enumerate() {
        println!("{}. {}", i + 1, r.title);
        println!("   RRF Score: {:.4}", r.score);
        println!("   BM25 Rank: {}, Semantic Rank: {}", rank(r.lexical_rank), rank(r.semantic_rank));
        println!("   {}", preview(&r.description));
    }
}
