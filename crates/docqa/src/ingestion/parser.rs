//! PDF and plain-text parsing

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::FileType;

/// How long a single PDF extraction may run before it is abandoned
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Glyph names some PDF fonts leak into extracted text, with their replacements
const GLYPH_REPLACEMENTS: &[(&str, &str)] = &[
    ("uni2010", "-"),
    ("uni2011", "-"),
    ("uni2013", "-"),
    ("uni2014", "--"),
    ("uni2018", "'"),
    ("uni2019", "'"),
    ("uni201C", "\""),
    ("uni201D", "\""),
    ("uni2022", "* "),
    ("uni2026", "..."),
    ("uni00A0", " "),
    ("f_f_i", "ffi"),
    ("f_f_l", "ffl"),
    ("f_i", "fi"),
    ("f_l", "fl"),
    ("f_f", "ff"),
];

/// Unicode characters normalised to ASCII
const CHAR_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// A letter, a hyphen at the end of a line, then a lowercase letter
static LINE_END_HYPHEN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\p{L})-\n(\p{Ll})").ok());

/// Clean up PDF text: glyph names, ligatures, null bytes, blank lines and line-end hyphenation
fn cleanup_pdf_text(text: &str) -> String {
    let mut result = text.replace('\0', "");

    for (glyph, replacement) in GLYPH_REPLACEMENTS {
        for pattern in [format!("({})", glyph), format!("<{}>", glyph)] {
            if result.contains(&pattern) {
                result = result.replace(&pattern, replacement);
            }
        }
    }
    for (ch, replacement) in CHAR_REPLACEMENTS {
        if result.contains(*ch) {
            result = result.replace(*ch, replacement);
        }
    }

    let joined = result
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    // Rejoin words hyphenated across a line break
    match LINE_END_HYPHEN.as_ref() {
        Some(re) => re.replace_all(&joined, "$1$2").into_owned(),
        None => joined,
    }
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Parsed document: ordered page texts plus source metadata
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Document ID, shared by every chunk cut from it
    pub id: Uuid,
    /// Filename as uploaded
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the extracted text
    pub content_hash: String,
    /// Total pages (PDFs only)
    pub total_pages: Option<u32>,
    /// Page-level content, in reading order
    pub pages: Vec<PageContent>,
}

impl ParsedDocument {
    /// Full text, pages separated by a blank line
    pub fn content(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Total characters across all pages
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.content.chars().count()).sum()
    }
}

/// Content from a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed); `None` for unpaginated text
    pub page_number: Option<u32>,
    /// Text content of the page
    pub content: String,
    /// Character offset in the full document
    pub char_offset: usize,
}

/// File parser for the formats the upload form accepts
pub struct FileParser;

impl FileParser {
    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename);

        if file_type.is_supported() && data.is_empty() {
            return Err(Error::file_parse(filename, "File is empty"));
        }

        let (pages, total_pages) = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Txt | FileType::Markdown => (Self::parse_text(filename, data)?, None),
            FileType::Unknown => {
                return Err(Error::UnsupportedFileType(format!(
                    "{} - only PDF and plain text files are accepted",
                    filename
                )))
            }
        };

        let mut char_offset = 0usize;
        let pages: Vec<PageContent> = pages
            .into_iter()
            .map(|(page_number, content)| {
                let page = PageContent {
                    page_number,
                    char_offset,
                    content,
                };
                char_offset += page.content.chars().count() + 2;
                page
            })
            .collect();

        let joined: String = pages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ParsedDocument {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            file_type,
            content_hash: hash_content(&joined),
            total_pages,
            pages,
        })
    }

    /// Parse plain text, decoding lossily and dropping a byte-order mark
    fn parse_text(filename: &str, data: &[u8]) -> Result<Vec<(Option<u32>, String)>> {
        let text = String::from_utf8_lossy(data);
        let text = text.trim_start_matches('\u{FEFF}');

        let meaningful = text
            .chars()
            .any(|c| !c.is_whitespace() && c != char::REPLACEMENT_CHARACTER);
        if !meaningful {
            return Err(Error::file_parse(filename, "File contains no readable text"));
        }

        Ok(vec![(None, text.to_string())])
    }

    /// Parse PDF into per-page text
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<(Vec<(Option<u32>, String)>, Option<u32>)> {
        let extracted = Self::extract_pdf_with_timeout(filename, data)?;
        let total_pages = extracted.page_count as u32;
        // Page labels are only trustworthy when every page was extracted on its own
        let numbered = extracted.pages.len() == extracted.page_count;

        let pages: Vec<(Option<u32>, String)> = extracted
            .pages
            .into_iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let cleaned = cleanup_pdf_text(&text);
                let page_number = numbered.then_some(i as u32 + 1);
                (!cleaned.is_empty()).then_some((page_number, cleaned))
            })
            .collect();

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF. It may be image-based or encrypted.",
            ));
        }

        Ok((pages, Some(total_pages)))
    }

    /// Extract PDF pages on a helper thread so a pathological font cannot hang the request
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<PdfText> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let _ = tx.send(Self::extract_pdf_pages(&data_vec));
        });

        match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
            Ok(result) => {
                let _ = handle.join();
                result.map_err(|message| Error::file_parse(filename, message))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The thread cannot be killed; it is left to finish on its own.
                tracing::error!(
                    "PDF extraction for '{}' timed out after {}s",
                    filename,
                    PDF_EXTRACT_TIMEOUT.as_secs()
                );
                Err(Error::file_parse(
                    filename,
                    format!(
                        "PDF extraction timed out after {}s",
                        PDF_EXTRACT_TIMEOUT.as_secs()
                    ),
                ))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread crashed on '{}'", filename);
                Err(Error::file_parse(filename, "PDF extraction crashed"))
            }
        }
    }

    /// Per-page extraction with lopdf, falling back to whole-document pdf-extract
    fn extract_pdf_pages(data: &[u8]) -> std::result::Result<PdfText, String> {
        let mut known_pages = None;
        match lopdf::Document::load_mem(data) {
            Ok(doc) => {
                let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
                let pages: Vec<String> = page_numbers
                    .iter()
                    .map(|n| {
                        doc.extract_text(&[*n]).unwrap_or_else(|e| {
                            tracing::debug!("lopdf could not extract page {}: {}", n, e);
                            String::new()
                        })
                    })
                    .collect();

                if pages.iter().any(|p| !p.trim().is_empty()) {
                    return Ok(PdfText {
                        page_count: pages.len(),
                        pages,
                    });
                }
                known_pages = Some(page_numbers.len());
                tracing::warn!("lopdf produced no text, trying pdf-extract");
            }
            Err(e) => {
                tracing::warn!("lopdf failed to load PDF: {}, trying pdf-extract", e);
            }
        }

        pdf_extract::extract_text_from_mem(data)
            .map(|text| PdfText::split(&text, known_pages))
            .map_err(|e| format!("Failed to extract PDF text: {}", e))
    }
}

/// Raw text pulled out of a PDF
#[derive(Debug)]
struct PdfText {
    pages: Vec<String>,
    /// Pages in the document, which can exceed `pages.len()` when the
    /// extractor could not tell page boundaries apart
    page_count: usize,
}

impl PdfText {
    /// Split whole-document text on form feeds, keeping a page count from
    /// the document structure when one is known
    fn split(text: &str, known_pages: Option<usize>) -> Self {
        let pages: Vec<String> = text.trim_end().split('\u{000C}').map(str::to_string).collect();
        let page_count = known_pages.unwrap_or(pages.len()).max(pages.len());
        Self { pages, page_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_single_page() {
        let doc = FileParser::parse("notes.txt", b"Paris is the capital of France.").unwrap();
        assert_eq!(doc.file_type, FileType::Txt);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].page_number, None);
        assert_eq!(doc.content(), "Paris is the capital of France.");
        assert_eq!(doc.total_pages, None);
        assert_eq!(doc.content_hash.len(), 64);
    }

    #[test]
    fn test_parse_text_strips_bom() {
        let doc = FileParser::parse("bom.txt", "\u{FEFF}hello".as_bytes()).unwrap();
        assert_eq!(doc.content(), "hello");
    }

    #[test]
    fn test_empty_and_blank_files_rejected() {
        assert!(matches!(
            FileParser::parse("empty.txt", b""),
            Err(Error::FileParse { .. })
        ));
        assert!(matches!(
            FileParser::parse("blank.txt", b"  \n\t "),
            Err(Error::FileParse { .. })
        ));
        assert!(matches!(
            FileParser::parse("binary.txt", &[0xff, 0xfe, 0xfd]),
            Err(Error::FileParse { .. })
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(
            FileParser::parse("slides.pptx", b"data"),
            Err(Error::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_garbage_pdf_is_parse_error() {
        let result = FileParser::parse("broken.pdf", b"%PDF-1.4 this is not really a pdf");
        assert!(matches!(result, Err(Error::FileParse { .. })));
    }

    #[test]
    fn test_cleanup_pdf_text() {
        let cleaned = cleanup_pdf_text("  e\u{FB03}cient \u{2014} test\0  \n\n   next line  ");
        assert_eq!(cleaned, "efficient -- test\nnext line");

        assert_eq!(cleanup_pdf_text("a docu-\nment here\nWell-\nKnown"), "a document here\nWell-\nKnown");
    }

    #[test]
    fn test_fallback_text_splits_on_form_feeds() {
        let text = PdfText::split("Intro\u{000C}Methods\u{000C}Results\n\u{000C}\n", None);
        assert_eq!(text.pages, vec!["Intro", "Methods", "Results"]);
        assert_eq!(text.page_count, 3);

        let text = PdfText::split("Intro\u{000C}Methods", Some(2));
        assert_eq!(text.page_count, 2);
    }

    #[test]
    fn test_unsplit_fallback_keeps_real_page_count() {
        // Five pages according to the page tree, but the text came back as one blob
        let text = PdfText::split("all pages run together", Some(5));
        assert_eq!(text.pages.len(), 1);
        assert_eq!(text.page_count, 5);
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
    }
}
