//! Splitting document text into pieces small enough to embed.

use crate::error::{Result, SearchError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE: Regex = Regex::new(r"[^.!?]+(?:[.!?]+|$)").expect("valid regex");
}

fn check_window(operation: &'static str, size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(SearchError::invalid(operation, "chunk size must be at least 1"));
    }
    if overlap >= size {
        return Err(SearchError::invalid(operation, format!("overlap {overlap} must be smaller than chunk size {size}")));
    }
    Ok(())
}

/// Slide a window of `size` units forward by `size - overlap` until the tail
/// is covered. A trailing window that only repeats overlap is not emitted.
fn windows<T: AsRef<str>>(units: &[T], size: usize, overlap: usize, sep: &str) -> Vec<String> {
    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < units.len() {
        let end = (start + size).min(units.len());
        let chunk: Vec<&str> = units[start..end].iter().map(|u| u.as_ref()).collect();
        chunks.push(chunk.join(sep));
        if end == units.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Whitespace-delimited word windows of `chunk_size` words.
pub fn fixed_size_chunks(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    check_window("fixed_size_chunks", chunk_size, overlap)?;
    let words: Vec<&str> = text.split_whitespace().collect();
    Ok(windows(&words, chunk_size, overlap, " "))
}

/// Sentences ending in `.`, `!` or `?`, grouped `max_sentences` at a time.
pub fn sentence_chunks(text: &str, max_sentences: usize, overlap: usize) -> Result<Vec<String>> {
    check_window("sentence_chunks", max_sentences, overlap)?;
    let sentences: Vec<&str> = SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();
    Ok(windows(&sentences, max_sentences, overlap, " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_windows_with_overlap() {
        let chunks = fixed_size_chunks("a b c d e f g", 3, 1).unwrap();
        assert_eq!(chunks, vec!["a b c", "c d e", "e f g"]);
    }

    #[test]
    fn fixed_windows_without_overlap() {
        let chunks = fixed_size_chunks("one two three four five", 2, 0).unwrap();
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
        assert!(fixed_size_chunks("   ", 2, 0).unwrap().is_empty());
    }

    #[test]
    fn sentence_groups() {
        let text = "A shark appears. The town panics! Who will help? A sheriff steps up.";
        let chunks = sentence_chunks(text, 2, 1).unwrap();
        assert_eq!(
            chunks,
            vec![
                "A shark appears. The town panics!",
                "The town panics! Who will help?",
                "Who will help? A sheriff steps up.",
            ]
        );
    }

    #[test]
    fn trailing_text_without_terminator_is_kept() {
        let chunks = sentence_chunks("First one. second without end", 4, 0).unwrap();
        assert_eq!(chunks, vec!["First one. second without end"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(fixed_size_chunks("a b", 2, 2).is_err());
        assert!(sentence_chunks("a.", 0, 0).is_err());
    }
}
