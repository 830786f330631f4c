//! Prompt templates for grounded answer generation

use crate::retrieval::SearchHit;

/// Prompt builder for context-grounded questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved chunks, closest first, into the context block
    pub fn build_context(hits: &[SearchHit]) -> String {
        hits.iter()
            .map(|hit| hit.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the context-QA prompt.
    ///
    /// The model is told to answer only from the context and to reply
    /// "I don't know." when the context does not contain the answer.
    pub fn build_context_qa_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are an assistant that answers questions strictly using the provided context.

Rules:
- Use ONLY the information in the context.
- If the answer is not present, say: "I don't know."
- Keep the answer concise (maximum 3 sentences).

Context:
{context}

Question:
{question}

Answer:"#,
            context = context,
            question = question
        )
    }
}
