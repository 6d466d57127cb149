//! Overlapping fixed-size text chunker.
//!
//! Splits file text into windows of at most `chunk_size` characters where
//! each window after the first starts `chunk_size - chunk_overlap`
//! characters after its predecessor. Consecutive windows therefore share
//! exactly `chunk_overlap` characters, and dropping that prefix from every
//! window but the first reproduces the input (see [`reassemble`]).
//!
//! Sizes are counted in Unicode scalar values, so multi-byte text is never
//! split inside a character.
//!
//! # Example
//!
//! ```rust
//! use codebase_rag_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(10, 4).unwrap();
//! let windows: Vec<_> = chunker.windows("abcdefghijklmnop").map(|w| w.text).collect();
//! assert_eq!(windows, vec!["abcdefghij", "ghijklmnop"]);
//! ```

use std::iter::FusedIterator;

use crate::error::RagError;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// A borrowed window of the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWindow<'a> {
    pub index: usize,
    pub text: &'a str,
    pub char_len: usize,
}

/// Chunking parameters, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily iterates the windows of `text`. Each call starts over.
    pub fn windows<'a>(&self, text: &'a str) -> Windows<'a> {
        Windows {
            text,
            start: 0,
            index: 0,
            size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
            done: text.is_empty(),
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Iterator returned by [`Chunker::windows`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    text: &'a str,
    /// Byte offset of the next window.
    start: usize,
    index: usize,
    size: usize,
    step: usize,
    done: bool,
}

impl<'a> Iterator for Windows<'a> {
    type Item = TextWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = &self.text[self.start..];
        let end = byte_offset(rest, self.size);
        let piece = &rest[..end];

        let window = TextWindow {
            index: self.index,
            text: piece,
            char_len: piece.chars().count(),
        };

        if end == rest.len() {
            self.done = true;
        } else {
            self.start += byte_offset(rest, self.step);
        }
        self.index += 1;
        Some(window)
    }
}

impl FusedIterator for Windows<'_> {}

/// Byte offset just past the first `n` chars of `s`, clamped to `s.len()`.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Rebuilds the original text from consecutive windows by dropping the
/// `overlap` leading characters of every window after the first.
pub fn reassemble<'a, I>(windows: I, overlap: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for (i, w) in windows.into_iter().enumerate() {
        if i == 0 {
            out.push_str(w);
        } else {
            out.push_str(&w[byte_offset(w, overlap)..]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(chunker: &Chunker, text: &'a str) -> Vec<&'a str> {
        chunker.windows(text).map(|w| w.text).collect()
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let chunker = Chunker::default();
        assert_eq!(chunker.windows("").count(), 0);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::default();
        let src = "function foo() { return 1; }";
        let windows: Vec<_> = chunker.windows(src).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].index, 0);
        assert_eq!(windows[0].text, src);
        assert_eq!(windows[0].char_len, 28);
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let chunker = Chunker::new(8, 2).unwrap();
        assert_eq!(texts(&chunker, "abcdefgh"), vec!["abcdefgh"]);
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let chunker = Chunker::new(500, 100).unwrap();
        let src: String = (0..1800).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let windows: Vec<_> = chunker.windows(&src).collect();
        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(&prev[prev.len() - 100..], &next[..100]);
        }
        assert!(windows.iter().all(|w| w.char_len <= 500));
    }

    #[test]
    fn test_lossless_reassembly() {
        let chunker = Chunker::new(7, 3).unwrap();
        for len in 8..40 {
            let src: String = "the quick brown fox jumps over the lazy dog"
                .chars()
                .take(len)
                .collect();
            let rebuilt = reassemble(texts(&chunker, &src), 3);
            assert_eq!(rebuilt, src, "len {}", len);
        }
    }

    #[test]
    fn test_multibyte_text_never_splits_chars() {
        let chunker = Chunker::new(5, 2).unwrap();
        let src = "héllo wörld — ünïcödé ✓ 日本語テキスト";
        let windows: Vec<_> = chunker.windows(src).collect();
        assert!(windows.iter().all(|w| w.char_len <= 5));
        assert_eq!(reassemble(windows.iter().map(|w| w.text), 2), src);
    }

    #[test]
    fn test_indices_contiguous_and_restartable() {
        let chunker = Chunker::new(4, 1).unwrap();
        let src = "abcdefghijklmnopqrstuvwxyz";
        let first: Vec<_> = chunker.windows(src).collect();
        for (i, w) in first.iter().enumerate() {
            assert_eq!(w.index, i);
        }
        let second: Vec<_> = chunker.windows(src).collect();
        assert_eq!(first, second);

        let iter = chunker.windows(src);
        let cloned = iter.clone();
        assert_eq!(iter.count(), cloned.count());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(10, 10).is_err());
        assert!(Chunker::new(10, 11).is_err());
        assert!(Chunker::new(10, 0).is_ok());
    }
}
