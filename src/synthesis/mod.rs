//! Answer synthesis
//!
//! Turns a question and the passages retrieved for it into a single prompt,
//! asks the generation backend once, and packages the reply.

#[cfg(test)]
mod tests;

use tracing::{debug, warn};

use crate::database::lancedb::vector_store::SearchResult;
use crate::{RagError, Result};

/// Produces free text from a prompt.
///
/// Implementations report failures as [`RagError::GenerationBackend`].
pub trait GenerationBackend: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// The generated answer and how many passages backed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub answer: String,
    pub sources_used: usize,
}

pub struct AnswerSynthesizer {
    generator: Box<dyn GenerationBackend>,
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(generator: Box<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Generate an answer to `question` grounded in `passages`
    #[inline]
    pub fn synthesize(&self, question: &str, passages: &[SearchResult]) -> Result<Synthesis> {
        let prompt = build_prompt(question, passages);
        debug!(
            "Synthesizing answer from {} passages (prompt length: {})",
            passages.len(),
            prompt.len()
        );

        let answer = self.generator.generate(&prompt)?;
        let answer = answer.trim();
        if answer.is_empty() {
            warn!("Generation backend returned an empty answer");
            return Err(RagError::GenerationBackend(
                "Model returned an empty response".to_string(),
            ));
        }

        Ok(Synthesis {
            answer: answer.to_string(),
            sources_used: passages.len(),
        })
    }
}

/// Build the generation prompt for a question and its supporting passages
#[inline]
pub fn build_prompt(question: &str, passages: &[SearchResult]) -> String {
    let mut prompt = String::from(
        "You answer questions about a document using only the context passages below.\n\
         Provide a clear, concise answer to the question based on the document content.\n\
         Avoid repeating the same information multiple times.\n\
         If the context does not contain the answer, say that the document does not cover it.\n\n\
         Context:\n",
    );

    if passages.is_empty() {
        prompt.push_str("(no relevant passages were found in the document)\n");
    }

    for (i, passage) in passages.iter().enumerate() {
        prompt.push('[');
        prompt.push_str(&(i + 1).to_string());
        prompt.push(']');
        if let Some(page) = passage.chunk.metadata.get("page") {
            prompt.push_str(" (page ");
            prompt.push_str(page);
            prompt.push(')');
        }
        prompt.push('\n');
        prompt.push_str(passage.chunk.text.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(question.trim());
    prompt.push_str("\nAnswer:");
    prompt
}
