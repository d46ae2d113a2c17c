//! Answer composition from retrieved chunks

use std::sync::Arc;

use super::prompt::PromptBuilder;
use crate::error::Result;
use crate::providers::LlmProvider;
use crate::retrieval::RetrievedChunk;
use crate::types::CitedChunk;

/// Fixed answer when nothing relevant was retrieved. Returned without
/// calling the language model, so an ungrounded response can never look
/// like a cited one.
pub const NO_GROUNDING_ANSWER: &str =
    "I couldn't find relevant information in your documents to answer this question.";

/// Per-chunk prompt framing overhead (source header and separators)
const CHUNK_FRAMING_CHARS: usize = 64;

/// A composed answer with its citations
#[derive(Debug, Clone)]
pub struct Answer {
    /// Generated text, or the fixed no-grounding answer
    pub answer: String,
    /// Exactly the chunks whose text was packed into the prompt
    pub citations: Vec<CitedChunk>,
    /// Whether the answer is constrained to retrieved content
    pub grounded: bool,
}

/// Packs retrieved chunks into a bounded prompt and invokes the LLM
pub struct AnswerComposer {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerComposer {
    /// Create a new composer
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Compose an answer from ranked retrieved chunks.
    ///
    /// Chunks are packed greedily in rank order (descending score) into
    /// the context budget. A chunk that would overflow is dropped whole;
    /// chunk text is never truncated mid-passage. When nothing packs,
    /// the fixed no-grounding answer comes back with `grounded` false.
    pub async fn compose(
        &self,
        question: &str,
        retrieved: &[RetrievedChunk],
        max_context_chars: usize,
    ) -> Result<Answer> {
        let mut packed: Vec<&RetrievedChunk> = Vec::new();
        let mut used = 0usize;

        for candidate in retrieved {
            let cost = candidate.chunk.text.len() + CHUNK_FRAMING_CHARS;
            if used + cost > max_context_chars {
                tracing::debug!(
                    "dropping chunk {} whole ({} chars would overflow the context budget)",
                    candidate.chunk.id,
                    cost
                );
                continue;
            }
            used += cost;
            packed.push(candidate);
        }

        if packed.is_empty() {
            return Ok(Answer {
                answer: NO_GROUNDING_ANSWER.to_string(),
                citations: Vec::new(),
                grounded: false,
            });
        }

        let context = PromptBuilder::build_context(&packed);
        let prompt = PromptBuilder::build_rag_prompt(question, &context, &packed);

        tracing::info!(
            "generating answer with {} of {} retrieved chunks ({} context chars)",
            packed.len(),
            retrieved.len(),
            used
        );
        let answer = self.llm.generate(&prompt).await?;

        let citations = packed
            .iter()
            .map(|r| CitedChunk {
                document_id: r.chunk.document_id,
                chunk_id: r.chunk.id,
                ordinal: r.chunk.ordinal,
                char_start: r.chunk.char_start,
                char_end: r.chunk.char_end,
                score: r.score,
                filename: r.chunk.filename.clone(),
            })
            .collect();

        Ok(Answer {
            answer,
            citations,
            grounded: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::Error;
    use crate::types::{Chunk, Document, MediaType};

    struct MockLlm {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::generation("model refused"));
            }
            Ok("a grounded answer".to_string())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock"
        }
    }

    fn composer(fail: bool) -> (AnswerComposer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            AnswerComposer::new(Arc::new(MockLlm {
                calls: Arc::clone(&calls),
                fail,
            })),
            calls,
        )
    }

    fn retrieved(text: &str, score: f32, rank: usize) -> RetrievedChunk {
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        RetrievedChunk {
            chunk: Chunk::new(&doc, rank as u32, text.to_string(), 0, text.len()),
            score,
            rank,
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_skips_the_model() {
        let (composer, calls) = composer(false);
        let answer = composer.compose("question?", &[], 8000).await.unwrap();

        assert!(!answer.grounded);
        assert!(answer.citations.is_empty());
        assert_eq!(answer.answer, NO_GROUNDING_ANSWER);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_citations_record_exactly_the_packed_chunks() {
        let (composer, _) = composer(false);
        let chunks = vec![
            retrieved("short", 0.9, 0),
            retrieved(&"x".repeat(5000), 0.8, 1), // too big for the budget
            retrieved("also short", 0.7, 2),
        ];

        let answer = composer.compose("question?", &chunks, 400).await.unwrap();
        assert!(answer.grounded);
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[0].chunk_id, chunks[0].chunk.id);
        assert_eq!(answer.citations[1].chunk_id, chunks[2].chunk.id);
    }

    #[tokio::test]
    async fn test_oversized_everything_means_ungrounded() {
        let (composer, calls) = composer(false);
        let chunks = vec![retrieved(&"x".repeat(5000), 0.9, 0)];

        let answer = composer.compose("question?", &chunks, 400).await.unwrap();
        assert!(!answer.grounded);
        assert!(answer.citations.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces_as_error() {
        let (composer, _) = composer(true);
        let chunks = vec![retrieved("some context", 0.9, 0)];

        let err = composer.compose("question?", &chunks, 8000).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
