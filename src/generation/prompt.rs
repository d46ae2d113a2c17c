//! Prompt templates for grounded generation

use crate::retrieval::RetrievedChunk;

/// Prompt builder for grounded answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context block from packed chunks
    pub fn build_context(chunks: &[&RetrievedChunk]) -> String {
        let mut context = String::new();

        for (i, retrieved) in chunks.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}\n\nContent:\n{}\n\n---\n\n",
                i + 1,
                Self::format_source_ref(retrieved),
                retrieved.chunk.text
            ));
        }

        context
    }

    /// Human-readable source reference for one chunk
    fn format_source_ref(retrieved: &RetrievedChunk) -> String {
        format!(
            "{}, section {}",
            retrieved.chunk.filename,
            retrieved.chunk.ordinal + 1
        )
    }

    /// Build the full prompt with strict grounding rules
    pub fn build_rag_prompt(question: &str, context: &str, sources: &[&RetrievedChunk]) -> String {
        format!(
            r#"You are a document-grounded assistant that ONLY uses information from provided documents.

GROUNDING RULES - FOLLOW THESE EXACTLY:
1. ONLY use information that is EXPLICITLY stated in the CONTEXT below
2. If the answer is not in the context, respond with "This information is not available in the provided documents."
3. NEVER use external knowledge, general knowledge, or training data
4. NEVER make inferences or educated guesses beyond what is explicitly stated
5. Cite sources inline with each claim, in this format: [Source: filename, section N]

CONTEXT FROM DOCUMENTS:
{context}

AVAILABLE SOURCES:
{sources}

QUESTION: {question}

Provide a grounded answer using ONLY the document content above:"#,
            context = context,
            sources = Self::format_sources_list(sources),
            question = question
        )
    }

    /// Numbered list of sources for the prompt
    fn format_sources_list(sources: &[&RetrievedChunk]) -> String {
        sources
            .iter()
            .enumerate()
            .map(|(i, retrieved)| format!("[{}] {}", i + 1, Self::format_source_ref(retrieved)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Document, MediaType};

    fn retrieved(filename: &str, ordinal: u32, text: &str) -> RetrievedChunk {
        let doc = Document::new("alice", filename, MediaType::Text);
        RetrievedChunk {
            chunk: Chunk::new(&doc, ordinal, text.to_string(), 0, text.len()),
            score: 0.9,
            rank: 0,
        }
    }

    #[test]
    fn test_context_numbers_sources_and_includes_text() {
        let a = retrieved("report.pdf", 0, "first passage");
        let b = retrieved("notes.txt", 4, "second passage");
        let context = PromptBuilder::build_context(&[&a, &b]);

        assert!(context.contains("[1] report.pdf, section 1"));
        assert!(context.contains("[2] notes.txt, section 5"));
        assert!(context.contains("first passage"));
        assert!(context.contains("second passage"));
    }

    #[test]
    fn test_prompt_carries_question_and_context() {
        let a = retrieved("report.pdf", 0, "the relevant passage");
        let context = PromptBuilder::build_context(&[&a]);
        let prompt = PromptBuilder::build_rag_prompt("What does it say?", &context, &[&a]);

        assert!(prompt.contains("QUESTION: What does it say?"));
        assert!(prompt.contains("the relevant passage"));
        assert!(prompt.contains("[1] report.pdf, section 1"));
    }
}
