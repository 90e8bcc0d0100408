use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::json;
use studio_core::{Batch, Tier};
use studio_logging::{studio_debug, studio_info};

use crate::filename::batch_dir_name;
use crate::persist::{ensure_output_dir, reset_dir, AtomicFileWriter, PersistError};
use crate::resolve::decode_asset;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub manifest_filename: Option<String>,
    /// RFC 3339 timestamp recorded in the manifest.
    pub exported_utc: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            manifest_filename: Some("manifest.json".to_string()),
            exported_utc: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub batch_count: usize,
    pub file_count: usize,
    pub output_dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("batch {batch}: result {index} has an undecodable payload: {source}")]
    Asset {
        batch: String,
        index: usize,
        #[source]
        source: base64::DecodeError,
    },
}

/// Write every batch that has results into `output_dir`.
///
/// Layout: `{batch}/{Standard|Pro}/{n}.{ext}` with `n` starting at 1, plus an
/// optional manifest at the root. Batches without results are left out. Each
/// exported batch directory is emptied first, so it holds exactly the current results.
pub fn export_batches(
    batches: &[Batch],
    output_dir: &Path,
    options: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    ensure_output_dir(output_dir)?;

    let mut used = HashSet::new();
    let mut entries = Vec::new();
    let mut file_count = 0;
    for batch in batches.iter().filter(|batch| batch.has_results()) {
        let dir_name = batch_dir_name(batch.name(), batch.id(), &mut used);
        let batch_dir = output_dir.join(&dir_name);
        reset_dir(&batch_dir)?;
        let mut tiers = serde_json::Map::new();
        for tier in Tier::ALL {
            let results = batch.results(tier);
            if results.is_empty() {
                continue;
            }
            let writer = AtomicFileWriter::new(batch_dir.join(tier.export_label()));
            let mut files = Vec::with_capacity(results.len());
            for (index, asset) in results.iter().enumerate() {
                let bytes = decode_asset(asset).map_err(|source| ExportError::Asset {
                    batch: batch.name().to_string(),
                    index: index + 1,
                    source,
                })?;
                let filename = format!("{}.{}", index + 1, asset.file_extension());
                writer.write(&filename, &bytes)?;
                files.push(json!({
                    "filename": format!("{}/{}", tier.export_label(), filename),
                    "mime": asset.mime(),
                    "bytes": bytes.len(),
                }));
                file_count += 1;
            }
            tiers.insert(tier.export_label().to_string(), json!(files));
        }
        studio_debug!("Exported batch '{}' into {}", batch.name(), dir_name);
        entries.push(json!({
            "batch_id": batch.id(),
            "name": batch.name(),
            "directory": dir_name,
            "tiers": tiers,
        }));
    }

    let manifest_path = if let Some(name) = options.manifest_filename {
        let manifest = json!({
            "exported_utc": options.exported_utc,
            "batch_count": entries.len(),
            "file_count": file_count,
            "batches": entries,
        });
        let writer = AtomicFileWriter::new(output_dir.to_path_buf());
        let path = writer.write(&name, &manifest.to_string())?;
        Some(path)
    } else {
        None
    };

    studio_info!(
        "Exported {} batches ({} files) to {}",
        entries.len(),
        file_count,
        output_dir.display()
    );
    Ok(ExportSummary {
        batch_count: entries.len(),
        file_count,
        output_dir: output_dir.to_path_buf(),
        manifest_path,
    })
}
