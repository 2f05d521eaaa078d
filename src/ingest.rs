//! One-time ingestion of configured catalogs into the vector index.
//!
//! Runs before the service accepts traffic. A catalog that fails to load
//! is skipped with a warning so one bad file cannot take down the others;
//! the run only fails outright when nothing loads at all or the index
//! itself rejects an upsert.

use anyhow::Result;

use crate::catalog::load_catalog;
use crate::chunk::chunk_documents;
use crate::config::Config;
use crate::error::AdvisorError;
use crate::index::VectorIndex;

/// Counters reported after an ingestion run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub catalogs_loaded: usize,
    pub catalogs_failed: usize,
    pub documents: usize,
}

/// Load every configured catalog and upsert its documents under the
/// catalog's name as namespace. With `dry_run`, counts are reported but
/// the index is not touched.
pub async fn run_ingest(
    config: &Config,
    index: &dyn VectorIndex,
    dry_run: bool,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for catalog in &config.catalogs {
        let docs = match load_catalog(&catalog.path) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(catalog = %catalog.name, error = %e, "catalog failed to load, skipping");
                summary.catalogs_failed += 1;
                continue;
            }
        };

        let docs = if config.chunking.enabled {
            chunk_documents(docs, &config.chunking)
        } else {
            docs
        };

        if dry_run {
            println!("ingest {} (dry-run)", catalog.name);
            println!("  documents: {}", docs.len());
        } else {
            index.upsert(&docs, &catalog.name).await?;
            println!("ingest {}", catalog.name);
            println!("  documents indexed: {}", docs.len());
        }

        summary.catalogs_loaded += 1;
        summary.documents += docs.len();
    }

    if summary.catalogs_loaded == 0 && summary.catalogs_failed > 0 {
        return Err(AdvisorError::DataSource("no catalog could be loaded".to_string()).into());
    }

    Ok(summary)
}
