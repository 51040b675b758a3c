//! Prompt templates for question answering

use crate::index::ScoredChunk;
use crate::types::ChunkSource;

/// Prompt builder for document questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from search hits, each labelled with where it came from
    pub fn build_context(hits: &[ScoredChunk<'_>]) -> String {
        let mut context = String::new();

        for (i, hit) in hits.iter().enumerate() {
            if i > 0 {
                context.push_str("\n\n");
            }
            context.push_str(&format!(
                "[{}] {}\n{}",
                i + 1,
                Self::format_source_ref(&hit.chunk.source),
                hit.chunk.content
            ));
        }

        context
    }

    fn format_source_ref(source: &ChunkSource) -> String {
        match (source.page_number, source.total_pages) {
            (Some(page), Some(total)) => {
                format!("file_name: {}, page_label: {} of {}", source.filename, page, total)
            }
            (Some(page), None) => format!("file_name: {}, page_label: {}", source.filename, page),
            _ => format!("file_name: {}", source.filename),
        }
    }

    /// Question-answering prompt: answer from the context, not prior knowledge
    pub fn build_qa_prompt(question: &str, context: &str) -> String {
        format!(
            "Context information is below.\n\
             ---------------------\n\
             {context}\n\
             ---------------------\n\
             Given the context information and not prior knowledge, answer the query.\n\
             Query: {question}\n\
             Answer: ",
            context = context,
            question = question
        )
    }
}
