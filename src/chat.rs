//! Response orchestration.
//!
//! [`Advisor`] wires retrieval, prompt assembly, and generation into the
//! single deployed contract: a query in, a lazy sequence of sanitized text
//! fragments out. Each call is independent; there is no caching, retry, or
//! conversation state. The index is populated by the ingestion path before
//! the advisor serves any query.

use std::sync::Arc;

use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::config::RetrievalConfig;
use crate::generation::{sanitize, CompletionClient};
use crate::index::VectorIndex;
use crate::prompt;

/// Stateless per-call orchestrator over a read-only index and a hosted
/// chat model.
pub struct Advisor {
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn CompletionClient>,
    namespace: String,
    top_k: usize,
}

impl Advisor {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn CompletionClient>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            llm,
            namespace: retrieval.namespace.clone(),
            top_k: retrieval.top_k,
        }
    }

    /// Answer a query as a stream of text fragments.
    ///
    /// Retrieves the top-k documents scoped to the configured namespace,
    /// assembles the advisor prompt, and opens the generation stream.
    /// Failures before the first fragment surface as the returned error;
    /// once the stream is live, a failure arrives as an `Err` item and the
    /// stream ends (the response is truncated, not rolled back).
    pub async fn respond(&self, query: &str) -> Result<BoxStream<'static, Result<String>>> {
        let docs = self
            .index
            .query(query, self.top_k, Some(&self.namespace))
            .await?;

        let prompt = prompt::assemble(&docs, query);
        let stream = self.llm.stream(&prompt).await?;

        Ok(stream
            .map(|fragment| fragment.map(|f| sanitize(&f)))
            .boxed())
    }

    /// Blocking variant: drains the stream and returns the concatenated
    /// response text.
    pub async fn respond_blocking(&self, query: &str) -> Result<String> {
        let mut stream = self.respond(query).await?;
        let mut out = String::new();
        while let Some(fragment) = stream.next().await {
            out.push_str(&fragment?);
        }
        Ok(out)
    }
}
