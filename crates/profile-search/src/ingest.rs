use indicatif::{ProgressBar, ProgressStyle};
use profile_search_data_processing::ProfileRecord;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::engine::{BulkOutcome, SearchBackend};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub indexed: usize,
    pub failed: usize,
}

/// Recreate the index and load `records` into it in batches of `batch_size`.
///
/// Rejected documents are counted in the report; transport and engine errors
/// abort the run. The index is refreshed at the end so the records are
/// searchable as soon as this returns.
#[instrument(name = "Ingest profiles", skip_all, level = "info", fields(backend = %backend.kind(), records = records.len(), batch_size = batch_size))]
pub async fn ingest(
    backend: &SearchBackend,
    records: &[ProfileRecord],
    batch_size: usize,
) -> Result<IngestReport> {
    let t_ingest = std::time::Instant::now();
    backend.recreate_index().await?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta})")
            .map_err(anyhow::Error::from)?
            .progress_chars("█░"),
    );
    pb.set_message("Indexing profiles");

    let mut report = IngestReport::default();
    for batch in records.chunks(batch_size.max(1)) {
        let BulkOutcome { indexed, failed } = backend.index_documents(batch).await?;
        report.indexed += indexed;
        report.failed += failed;
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    backend.refresh().await?;
    if report.failed > 0 {
        warn!(failed = report.failed, "Some documents were rejected");
    }
    info!(
        indexed = report.indexed,
        failed = report.failed,
        elapsed = ?t_ingest.elapsed(),
        "Ingestion complete"
    );
    Ok(report)
}
