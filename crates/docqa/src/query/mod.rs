//! Question answering over a built index

mod engine;
mod prompt;

pub use engine::QueryEngine;
pub use prompt::PromptBuilder;
