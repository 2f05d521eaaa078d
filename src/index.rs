//! Vector index abstraction and backends.
//!
//! The [`VectorIndex`] trait stores `(vector, document, namespace)` entries
//! and answers top-k nearest-neighbor queries. Similarity is cosine for
//! both backends. Embedding happens inside the index: `upsert` embeds each
//! document's body and `query` embeds the query text through the same
//! provider, so callers never touch vectors directly.
//!
//! Two implementations:
//! - [`MemoryIndex`]: in-process, brute-force, ephemeral. Read access is
//!   safe concurrently; upserts belong to the ingestion phase, which
//!   completes before serving starts.
//! - [`QdrantIndex`]: remote namespaced vector database over HTTP.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::embedding::{cosine_similarity, embed_one, EmbeddingProvider};
use crate::models::{Attributes, Document};

/// Namespaced top-k retrieval over embedded documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and store documents under a namespace.
    ///
    /// Re-upserting a document with the same id in the same namespace
    /// overwrites the stored entry (idempotent).
    async fn upsert(&self, docs: &[Document], namespace: &str) -> Result<()>;

    /// Return up to `k` stored documents most similar to `text`, most
    /// similar first, restricted to `namespace` when given. Ties break by
    /// insertion order. An empty index or `k = 0` yields an empty result.
    async fn query(&self, text: &str, k: usize, namespace: Option<&str>) -> Result<Vec<Document>>;
}

// ============ In-memory index ============

struct Entry {
    id: String,
    namespace: String,
    vector: Vec<f32>,
    doc: Document,
    seq: u64,
}

struct Entries {
    items: Vec<Entry>,
    next_seq: u64,
}

/// Brute-force cosine index held in process memory. Lost on restart.
pub struct MemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Entries>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Entries {
                items: Vec::new(),
                next_seq: 0,
            }),
        }
    }

    /// Number of stored entries, optionally restricted to a namespace.
    pub fn len(&self, namespace: Option<&str>) -> usize {
        let entries = self.entries.read().unwrap();
        match namespace {
            Some(ns) => entries.items.iter().filter(|e| e.namespace == ns).count(),
            None => entries.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len(None) == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, docs: &[Document], namespace: &str) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let bodies: Vec<String> = docs.iter().map(|d| d.body.clone()).collect();
        let vectors = self.embedder.embed(&bodies).await?;

        let mut entries = self.entries.write().unwrap();
        for (doc, vector) in docs.iter().zip(vectors) {
            let id = entry_id(doc);

            let existing = entries
                .items
                .iter()
                .position(|e| e.namespace == namespace && e.id == id);
            match existing {
                Some(i) => {
                    entries.items[i].vector = vector;
                    entries.items[i].doc = doc.clone();
                }
                None => {
                    let seq = entries.next_seq;
                    entries.next_seq += 1;
                    entries.items.push(Entry {
                        id,
                        namespace: namespace.to_string(),
                        vector,
                        doc: doc.clone(),
                        seq,
                    });
                }
            }
        }

        Ok(())
    }

    async fn query(&self, text: &str, k: usize, namespace: Option<&str>) -> Result<Vec<Document>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Skip the embedding round-trip when nothing can match.
        {
            let entries = self.entries.read().unwrap();
            let any = entries
                .items
                .iter()
                .any(|e| namespace.is_none_or(|ns| e.namespace == ns));
            if !any {
                return Ok(Vec::new());
            }
        }

        let query_vec = embed_one(self.embedder.as_ref(), text).await?;

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(f32, u64, &Entry)> = entries
            .items
            .iter()
            .filter(|e| namespace.is_none_or(|ns| e.namespace == ns))
            .map(|e| (cosine_similarity(&query_vec, &e.vector), e.seq, e))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, _, e)| e.doc.clone()).collect())
    }
}

/// Stable entry id: the document's own id, or a hash of its body.
fn entry_id(doc: &Document) -> String {
    match &doc.id {
        Some(id) => id.clone(),
        None => {
            let mut hasher = Sha256::new();
            hasher.update(doc.body.as_bytes());
            format!("{:x}", hasher.finalize())[..16].to_string()
        }
    }
}

// ============ Qdrant index ============

/// Remote vector store backed by a Qdrant instance.
///
/// Points carry the document body and attributes as payload, plus a
/// `namespace` field used as a query filter. Point ids derive from
/// `(namespace, document id)` so re-upserts overwrite in place. The
/// collection is created on first use with cosine distance.
pub struct QdrantIndex {
    url: String,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    client: reqwest::Client,
    ready: OnceCell<()>,
}

impl QdrantIndex {
    pub fn new(url: &str, collection: &str, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            embedder,
            client: reqwest::Client::new(),
            ready: OnceCell::new(),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                let info_url = format!("{}/collections/{}", self.url, self.collection);
                let resp = self
                    .client
                    .get(&info_url)
                    .send()
                    .await
                    .with_context(|| format!("qdrant unreachable at {}", self.url))?;

                if resp.status().is_success() {
                    return Ok(());
                }

                let body = serde_json::json!({
                    "vectors": { "size": self.embedder.dims(), "distance": "Cosine" }
                });
                let resp = self
                    .client
                    .put(&info_url)
                    .json(&body)
                    .send()
                    .await
                    .with_context(|| format!("qdrant unreachable at {}", self.url))?;

                if !resp.status().is_success() {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    anyhow::bail!("qdrant create collection failed {}: {}", status, text);
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, docs: &[Document], namespace: &str) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;

        let bodies: Vec<String> = docs.iter().map(|d| d.body.clone()).collect();
        let vectors = self.embedder.embed(&bodies).await?;

        let points: Vec<serde_json::Value> = docs
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                let id = entry_id(doc);
                serde_json::json!({
                    "id": point_id(namespace, &id),
                    "vector": vector,
                    "payload": {
                        "namespace": namespace,
                        "doc_id": id,
                        "body": doc.body,
                        "attributes": doc.attributes,
                    }
                })
            })
            .collect();

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.url, self.collection
        );
        let resp = self
            .client
            .put(&url)
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await
            .with_context(|| format!("qdrant unreachable at {}", self.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("qdrant upsert failed {}: {}", status, text);
        }
        Ok(())
    }

    async fn query(&self, text: &str, k: usize, namespace: Option<&str>) -> Result<Vec<Document>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_collection().await?;

        let query_vec = embed_one(self.embedder.as_ref(), text).await?;

        let mut body = serde_json::json!({
            "query": query_vec,
            "limit": k,
            "with_payload": true,
        });
        if let Some(ns) = namespace {
            body["filter"] = serde_json::json!({
                "must": [{ "key": "namespace", "match": { "value": ns } }]
            });
        }

        let url = format!("{}/collections/{}/points/query", self.url, self.collection);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("qdrant unreachable at {}", self.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("qdrant query failed {}: {}", status, text);
        }

        let json: serde_json::Value = resp.json().await.context("qdrant query response")?;
        let points = json
            .pointer("/result/points")
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();

        let docs = points
            .iter()
            .filter_map(|point| {
                let payload = point.get("payload")?;
                let body = payload.get("body")?.as_str()?.to_string();
                let id = payload
                    .get("doc_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                let attributes: Attributes = payload
                    .get("attributes")
                    .and_then(|a| serde_json::from_value(a.clone()).ok())
                    .unwrap_or_default();
                Some(Document {
                    id,
                    body,
                    attributes,
                })
            })
            .collect();

        Ok(docs)
    }
}

/// Deterministic unsigned point id from the namespaced document id.
fn point_id(namespace: &str, id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().expect("digest is at least 8 bytes"))
}
