//! Retrieval-augmented question answering.
//!
//! Fetches the most relevant chunks for a question, assembles a grounded
//! prompt that restricts the model to the supplied context, invokes the
//! generation service once, and returns the answer with deduplicated
//! `(document, page)` citations.
//!
//! `query` never fails: any retrieval or generation fault is absorbed and
//! the caller receives a well-formed [`QueryResult`] carrying a fixed
//! fallback answer and empty sources.

use tracing::{debug, error};

use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::models::{Chunk, QueryResult, SourceRef};

/// Answer returned whenever retrieval or generation fails.
pub const FALLBACK_ANSWER: &str = "Sorry, I encountered an error while processing your query.";

const PROMPT_TEMPLATE: &str = "You are a contract management assistant. Use the following context to answer the question.
Always cite your sources by mentioning the document name and page number when available.

Context: {context}

Question: {question}

Answer:";

pub struct QaEngine<'a> {
    index: &'a dyn VectorIndex,
    generator: &'a dyn Generator,
    top_k: usize,
}

impl<'a> QaEngine<'a> {
    pub fn new(index: &'a dyn VectorIndex, generator: &'a dyn Generator, top_k: usize) -> Self {
        Self {
            index,
            generator,
            top_k,
        }
    }

    /// Answer a question from the indexed corpus. Always returns a result;
    /// see [`FALLBACK_ANSWER`].
    pub async fn query(&self, question: &str) -> QueryResult {
        match self.try_query(question).await {
            Ok(result) => result,
            Err(e) => {
                error!("query failed: {}", e);
                QueryResult {
                    answer: FALLBACK_ANSWER.to_string(),
                    sources: Vec::new(),
                    relevant_documents: Vec::new(),
                }
            }
        }
    }

    async fn try_query(&self, question: &str) -> anyhow::Result<QueryResult> {
        let relevant = self.index.similarity_search(question, self.top_k).await?;
        debug!("retrieved {} chunks for question", relevant.len());

        let context = build_context(&relevant);
        let prompt = PROMPT_TEMPLATE
            .replace("{context}", &context)
            .replace("{question}", question);

        let answer = self.generator.complete(&prompt).await?;

        Ok(QueryResult {
            answer,
            sources: dedup_sources(&relevant),
            relevant_documents: relevant,
        })
    }
}

/// Context block: one labeled section per retrieved chunk, so the model can
/// cite document and page.
fn build_context(chunks: &[Chunk]) -> String {
    let mut context = String::new();
    for chunk in chunks {
        match chunk.page {
            Some(p) => context.push_str(&format!("From {} (Page {}):\n", chunk.source, p)),
            None => context.push_str(&format!("From {}:\n", chunk.source)),
        }
        context.push_str(&chunk.text);
        context.push_str("\n\n");
    }
    context
}

/// Deduplicate citations by `(document, page)`, preserving first-seen order.
fn dedup_sources(chunks: &[Chunk]) -> Vec<SourceRef> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for chunk in chunks {
        let source = SourceRef {
            document: chunk.source.clone(),
            page: chunk.page,
        };
        if seen.insert(source.clone()) {
            sources.push(source);
        }
    }
    sources
}
