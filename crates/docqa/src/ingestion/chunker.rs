//! Text chunking with page and position tracking

use unicode_segmentation::UnicodeSegmentation;

use super::parser::{PageContent, ParsedDocument};
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSource};

/// Sentence-aware chunker with configurable size and overlap, both in characters
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Upper bound on chunk length
    chunk_size: usize,
    /// Characters carried over from the end of the previous chunk
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; the overlap must be smaller than the chunk size
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Chunk every page of a parsed document; chunk indices run across pages
    pub fn chunk_document(&self, doc: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &doc.pages {
            let next_index = chunks.len() as u32;
            chunks.extend(self.chunk_page(doc, page, next_index));
        }
        chunks
    }

    fn chunk_page(&self, doc: &ParsedDocument, page: &PageContent, start_index: u32) -> Vec<Chunk> {
        let source = ChunkSource {
            filename: doc.filename.clone(),
            file_type: doc.file_type,
            page_number: page.page_number,
            total_pages: doc.total_pages,
        };

        let mut chunks = Vec::new();
        let mut chunk_index = start_index;
        let mut current = String::new();
        let mut current_chars = 0usize;
        let mut current_start = 0usize;
        let mut char_pos = 0usize;

        let mut emit = |text: &str, start: usize, end: usize, chunks: &mut Vec<Chunk>| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return;
            }
            chunks.push(Chunk::new(
                doc.id,
                trimmed.to_string(),
                source.clone(),
                page.char_offset + start,
                page.char_offset + end,
                chunk_index,
            ));
            chunk_index += 1;
        };

        for piece in self.split_into_pieces(&page.content) {
            let piece_chars = piece.chars().count();

            if current_chars > 0 && current_chars + piece_chars > self.chunk_size {
                emit(&current, current_start, char_pos, &mut chunks);

                // Start new chunk with overlap, unless the overlap would push it past the limit
                let overlap_text = self.get_overlap_text(&current);
                let overlap_chars = overlap_text.chars().count();
                if overlap_chars + piece_chars <= self.chunk_size {
                    current = overlap_text;
                    current_chars = overlap_chars;
                    current_start = char_pos - overlap_chars;
                } else {
                    current.clear();
                    current_chars = 0;
                    current_start = char_pos;
                }
            }

            current.push_str(piece);
            current_chars += piece_chars;
            char_pos += piece_chars;
        }

        emit(&current, current_start, char_pos, &mut chunks);
        chunks
    }

    /// Split text into sentences, breaking sentences longer than a chunk at
    /// word bounds and words longer than a chunk at character bounds
    fn split_into_pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        for sentence in text.split_sentence_bounds() {
            if sentence.chars().count() <= self.chunk_size {
                pieces.push(sentence);
                continue;
            }
            for word in sentence.split_word_bounds() {
                if word.chars().count() <= self.chunk_size {
                    pieces.push(word);
                } else {
                    pieces.extend(hard_split(word, self.chunk_size));
                }
            }
        }
        pieces
    }

    /// Get overlap text from the end of a chunk
    fn get_overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }

        let total = text.chars().count();
        if total <= self.overlap {
            return text.to_string();
        }

        let start = text
            .char_indices()
            .nth(total - self.overlap)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let overlap_text = &text[start..];

        // Try to start at a sentence boundary, then a word boundary
        for (sep, skip) in [(". ", 2), (" ", 1)] {
            if let Some(pos) = overlap_text.find(sep) {
                let rest = &overlap_text[pos + skip..];
                if !rest.trim().is_empty() {
                    return rest.to_string();
                }
            }
        }

        overlap_text.to_string()
    }
}

/// Split a string into pieces of at most `size` characters
fn hard_split(text: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            pieces.push(&text[start..idx]);
            start = idx;
        }
    }
    pieces.push(&text[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::FileParser;

    fn doc(text: &str) -> ParsedDocument {
        FileParser::parse("notes.txt", text.as_bytes()).unwrap()
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(100, 100).is_err());
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(800, 20).unwrap();
        let chunks = chunker.chunk_document(&doc("Paris is the capital of France."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Paris is the capital of France.");
        assert_eq!(chunks[0].source.filename, "notes.txt");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(60);
        let chunker = TextChunker::new(200, 20).unwrap();
        let chunks = chunker.chunk_document(&doc(&text));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 200, "chunk too long: {}", chunk.content.len());
        }
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        let expected: Vec<u32> = (0..chunks.len() as u32).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_overlap_carries_previous_text() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi omicron pi.";
        let chunker = TextChunker::new(50, 15).unwrap();
        let chunks = chunker.chunk_document(&doc(text));

        assert!(chunks.len() >= 2);
        let first_words: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let last_word = first_words.last().unwrap();
        assert!(chunks[1].content.contains(last_word));
    }

    #[test]
    fn test_long_word_is_hard_split() {
        let text = "x".repeat(250);
        let chunker = TextChunker::new(100, 10).unwrap();
        let chunks = chunker.chunk_document(&doc(&text));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 100));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "Ünïcödé sèntençe wîth äccents. ".repeat(30);
        let chunker = TextChunker::new(64, 8).unwrap();
        let chunks = chunker.chunk_document(&doc(&text));
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 64));
    }

    #[test]
    fn test_hard_split() {
        assert_eq!(hard_split("abcdef", 2), vec!["ab", "cd", "ef"]);
        assert_eq!(hard_split("abcde", 2), vec!["ab", "cd", "e"]);
    }
}
