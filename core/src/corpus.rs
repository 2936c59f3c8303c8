//! Reading the document collection from JSON, JSONL, or a directory of both.

use crate::document::Document;
use crate::error::{Result, SearchError};
use crate::DocId;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: DocId,
    title: String,
    #[serde(default, alias = "body")]
    description: String,
}

/// `{"movies": [...]}` as shipped with the sample dataset.
#[derive(Debug, Deserialize)]
struct MovieFile {
    movies: Vec<InputDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonInput {
    Movies(MovieFile),
    Many(Vec<InputDoc>),
    One(InputDoc),
}

/// Load every document under `input` (a file, or a directory walked
/// recursively for `.json` / `.jsonl` files in sorted path order).
pub fn load_documents<P: AsRef<Path>>(input: P) -> Result<Vec<Document>> {
    let input = input.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(SearchError::invalid("load_documents", format!("{} is neither a file nor a directory", input.display())));
    }

    let mut raw = Vec::new();
    for file in &files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut raw)?;
        } else {
            read_json(file, &mut raw)?;
        }
    }

    let mut seen = BTreeSet::new();
    let mut documents = Vec::with_capacity(raw.len());
    for doc in raw {
        if !seen.insert(doc.id) {
            return Err(SearchError::invalid("load_documents", format!("duplicate document id {}", doc.id)));
        }
        documents.push(Document::new(doc.id, doc.title, doc.description)?);
    }
    tracing::info!(num_docs = documents.len(), num_files = files.len(), "loaded documents");
    Ok(documents)
}

fn read_jsonl(file: &Path, out: &mut Vec<InputDoc>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<InputDoc>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let input: JsonInput = serde_json::from_reader(reader)?;
    match input {
        JsonInput::Movies(m) => out.extend(m.movies),
        JsonInput::Many(docs) => out.extend(docs),
        JsonInput::One(doc) => out.push(doc),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_movie_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.json");
        fs::write(&path, r#"{"movies": [{"id": 2, "title": "Jaws", "description": "shark"}, {"id": 1, "title": "Up"}]}"#).unwrap();
        let docs = load_documents(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "Jaws");
        assert_eq!(docs[1].description, "");
    }

    #[test]
    fn walks_directories_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jsonl"), "{\"id\": 3, \"title\": \"C\", \"body\": \"third\"}\n\n").unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"id": 1, "title": "A"}, {"id": 2, "title": "B"}]"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let ids: Vec<DocId> = load_documents(dir.path()).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.json");
        fs::write(&path, r#"[{"id": 1, "title": "A"}, {"id": 1, "title": "B"}]"#).unwrap();
        assert!(matches!(load_documents(&path), Err(SearchError::InvalidArgument { .. })));
    }
}
