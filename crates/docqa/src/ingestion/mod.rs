//! Document ingestion: staging, parsing and chunking

mod chunker;
mod loader;
mod parser;

pub use chunker::TextChunker;
pub use loader::DocumentLoader;
pub use parser::{FileParser, PageContent, ParsedDocument};
