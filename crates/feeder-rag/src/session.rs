use anyhow::Result;
use tracing::info;

use feeder_core::types::RetrievedChunk;
use feeder_llm::{combine_prompt, Generator};

use crate::history::ConversationState;
use crate::retrieve::{build_context, Retriever};

/// One question and what came back for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn { pub results: Vec<RetrievedChunk>, pub answer: String }

impl Turn {
    /// False when nothing was retrieved and the model was asked without context.
    pub fn has_context(&self) -> bool { !self.results.is_empty() }
}

pub struct RagSession<'a, G: Generator> { retriever: Retriever<'a>, generator: G, top_k: usize }

impl<'a, G: Generator> RagSession<'a, G> {
    pub fn new(retriever: Retriever<'a>, generator: G, top_k: usize) -> Self { Self { retriever, generator, top_k } }

    pub fn generator(&self) -> &G { &self.generator }

    /// Retrieve, extend `state` with context and the question, generate, then
    /// record the answer in `state`.
    pub async fn ask(&self, state: &mut ConversationState, query: &str) -> Result<Turn> {
        let results = self.retriever.retrieve(query, self.top_k).await?;
        if results.is_empty() {
            info!("No relevant results for query; sending it without context");
        } else {
            state.push_context(&build_context(&results));
        }
        state.push_user(query);
        let answer = self.generator.generate(&combine_prompt(Some(state.as_str()), query)).await;
        state.push_assistant(&answer);
        Ok(Turn { results, answer })
    }
}
