use studio_core::{map_rows, parse_delimited, ColumnMap, JobRow, PendingRow, ReferenceAsset};
use studio_logging::{studio_info, studio_warn};

use crate::fetch::Fetcher;
use crate::resolve::AssetResolver;
use crate::source::{SheetSource, SourceError};

/// Resolve reference slots row by row, slot by slot, in column order.
///
/// An unreachable reference keeps its URL but carries no encoded data.
pub async fn resolve_rows(rows: Vec<PendingRow>, resolver: &dyn AssetResolver) -> Vec<JobRow> {
    let mut resolved_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut references: studio_core::ReferenceSlots = Default::default();
        for (slot, url) in row.reference_urls.iter().enumerate() {
            let Some(url) = url else { continue };
            references[slot] = Some(match resolver.resolve(url.as_str()).await {
                Some(encoded) => ReferenceAsset::resolved(url.as_str(), encoded),
                None => {
                    studio_warn!(
                        "Batch '{}' slot {}: reference left unresolved",
                        row.name,
                        slot + 1
                    );
                    ReferenceAsset::unresolved(url.as_str())
                }
            });
        }
        resolved_rows.push(JobRow {
            name: row.name,
            custom_prompt: row.custom_prompt,
            references,
        });
    }
    resolved_rows
}

/// Turn raw delimited text into ingested job rows.
pub async fn ingest_text(
    text: &str,
    columns: &ColumnMap,
    resolver: &dyn AssetResolver,
) -> Vec<JobRow> {
    let rows = parse_delimited(text);
    let pending = map_rows(&rows, columns);
    let skipped = rows.len().saturating_sub(1) - pending.len();
    let jobs = resolve_rows(pending, resolver).await;
    let unresolved: usize = jobs
        .iter()
        .flat_map(|job| job.references.iter().flatten())
        .filter(|reference| !reference.is_resolved())
        .count();
    studio_info!(
        "Ingested {} jobs ({} rows skipped, {} references unresolved)",
        jobs.len(),
        skipped,
        unresolved
    );
    jobs
}

/// Load a sheet from `identifier` and ingest it.
///
/// A malformed identifier fails before anything is fetched.
pub async fn sync_source(
    identifier: &str,
    columns: &ColumnMap,
    fetcher: &dyn Fetcher,
    resolver: &dyn AssetResolver,
) -> Result<Vec<JobRow>, SourceError> {
    let source = SheetSource::parse(identifier)?;
    let text = source.load_text(fetcher).await?;
    Ok(ingest_text(&text, columns, resolver).await)
}
