use crate::error::{Result, SearchError};
use crate::index::{DocLengths, DocMap, InvertedIndex, Postings, TermFrequencies};
use crate::tokenizer::Tokenizer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bumped whenever the layout of any artifact changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub num_docs: usize,
    pub num_terms: usize,
}

/// Self-describing container written for every binary artifact.
#[derive(Serialize, Deserialize)]
struct Artifact<T> {
    kind: String,
    version: u32,
    payload: T,
}

#[derive(Serialize)]
struct ArtifactRef<'a, T> {
    kind: &'a str,
    version: u32,
    payload: &'a T,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn term_frequencies(&self) -> PathBuf { self.root.join("term_frequencies.bin") }
    pub fn doc_lengths(&self) -> PathBuf { self.root.join("doc_lengths.bin") }
    pub fn docmap(&self) -> PathBuf { self.root.join("docmap.bin") }
    pub fn embeddings(&self) -> PathBuf { self.root.join("embeddings.bin") }

    pub fn exists(&self) -> bool { self.meta().is_file() }

    fn with_root(&self, root: PathBuf) -> Self { Self { root } }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self.root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "index".into());
        self.root.with_file_name(format!(".{name}.{suffix}"))
    }
}

pub(crate) fn write_artifact<T: Serialize>(path: &Path, kind: &str, payload: &T) -> Result<()> {
    let bytes = bincode::serialize(&ArtifactRef { kind, version: FORMAT_VERSION, payload })?;
    let mut f = BufWriter::new(File::create(path)?);
    f.write_all(&bytes)?;
    f.flush()?;
    Ok(())
}

/// Read an artifact written by [`write_artifact`]. A missing file, an
/// undecodable payload, a foreign kind or another format version all mean the
/// index on disk cannot be used.
pub(crate) fn read_artifact<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T> {
    let mut f = File::open(path)
        .map_err(|e| SearchError::IndexNotBuilt(format!("cannot open {}: {e}", path.display())))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let artifact: Artifact<T> = bincode::deserialize(&buf)
        .map_err(|e| SearchError::IndexNotBuilt(format!("cannot decode {}: {e}", path.display())))?;
    if artifact.kind != kind {
        return Err(SearchError::IndexNotBuilt(format!(
            "{} holds '{}' where '{kind}' was expected",
            path.display(),
            artifact.kind
        )));
    }
    if artifact.version != FORMAT_VERSION {
        return Err(SearchError::IndexNotBuilt(format!(
            "{} has format version {}, expected {FORMAT_VERSION}",
            path.display(),
            artifact.version
        )));
    }
    Ok(artifact.payload)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let raw = fs::read_to_string(paths.meta())
        .map_err(|e| SearchError::IndexNotBuilt(format!("cannot read {}: {e}", paths.meta().display())))?;
    let meta: MetaFile = serde_json::from_str(&raw)
        .map_err(|e| SearchError::IndexNotBuilt(format!("cannot parse {}: {e}", paths.meta().display())))?;
    if meta.version != FORMAT_VERSION {
        return Err(SearchError::IndexNotBuilt(format!(
            "index format version {} is not supported (expected {FORMAT_VERSION})",
            meta.version
        )));
    }
    Ok(meta)
}

fn write_all_artifacts(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_artifact(&paths.postings(), "postings", &index.postings)?;
    write_artifact(&paths.term_frequencies(), "term_frequencies", &index.term_frequencies)?;
    write_artifact(&paths.doc_lengths(), "doc_lengths", &index.doc_lengths)?;
    write_artifact(&paths.docmap(), "docmap", &index.docmap)?;
    let meta = MetaFile {
        version: FORMAT_VERSION,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
    };
    save_meta(paths, &meta)
}

/// Write the four artifacts into a staging directory, then swap it in place
/// of `paths.root` so readers never see a mix of old and new artifacts.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    let staging = paths.with_root(paths.sibling("staging"));
    if staging.root.exists() {
        fs::remove_dir_all(&staging.root)?;
    }
    if let Some(parent) = paths.root.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    write_all_artifacts(&staging, index)?;

    let retired = paths.sibling("retired");
    if retired.exists() {
        fs::remove_dir_all(&retired)?;
    }
    if paths.root.exists() {
        fs::rename(&paths.root, &retired)?;
    }
    fs::rename(&staging.root, &paths.root)?;
    if retired.exists() {
        fs::remove_dir_all(&retired)?;
    }
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), "saved index");
    Ok(())
}

pub fn load_index(paths: &IndexPaths, tokenizer: Arc<dyn Tokenizer>) -> Result<InvertedIndex> {
    if !paths.root.is_dir() {
        return Err(SearchError::IndexNotBuilt(format!("{} does not exist", paths.root.display())));
    }
    let meta = load_meta(paths)?;
    let postings: Postings = read_artifact(&paths.postings(), "postings")?;
    let term_frequencies: TermFrequencies = read_artifact(&paths.term_frequencies(), "term_frequencies")?;
    let doc_lengths: DocLengths = read_artifact(&paths.doc_lengths(), "doc_lengths")?;
    let docmap: DocMap = read_artifact(&paths.docmap(), "docmap")?;
    if meta.num_docs != docmap.len() {
        return Err(SearchError::IndexNotBuilt(format!(
            "meta.json records {} documents, docmap holds {}",
            meta.num_docs,
            docmap.len()
        )));
    }
    let index = InvertedIndex::from_parts(postings, term_frequencies, doc_lengths, docmap, tokenizer)?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "loaded index");
    Ok(index)
}
