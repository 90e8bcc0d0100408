use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of reference-image slots carried by every batch.
pub const REFERENCE_SLOTS: usize = 5;

pub type BatchId = u64;

/// Generation tier. The enhanced tier is labelled "Pro" in exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Enhanced,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Standard, Tier::Enhanced];

    /// Name of the per-tier container in an export.
    pub fn export_label(self) -> &'static str {
        match self {
            Tier::Standard => "Standard",
            Tier::Enhanced => "Pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::Enhanced => write!(f, "enhanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier `{0}` (expected `standard` or `enhanced`)")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Tier::Standard),
            "enhanced" | "pro" => Ok(Tier::Enhanced),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStatus {
    #[default]
    Idle,
    Processing,
    Stopping,
    Completed,
    Error,
}

impl BatchStatus {
    /// True while a run owns the batch.
    pub fn is_running(self) -> bool {
        matches!(self, BatchStatus::Processing | BatchStatus::Stopping)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchStatus::Idle => "idle",
            BatchStatus::Processing => "processing",
            BatchStatus::Stopping => "stopping",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetFormatError {
    #[error("asset is not a data url")]
    NotDataUrl,
    #[error("data url is not base64 encoded")]
    NotBase64,
    #[error("data url has an empty payload")]
    EmptyPayload,
}

/// A self-contained `data:<mime>;base64,<payload>` image encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedAsset {
    data_url: String,
    // Byte offset of the payload within `data_url`.
    payload_start: usize,
}

impl EncodedAsset {
    /// Build an asset from a MIME type and an already base64-encoded payload.
    pub fn from_parts(mime: &str, base64_payload: &str) -> Self {
        let prefix = format!("data:{mime};base64,");
        let payload_start = prefix.len();
        Self {
            data_url: format!("{prefix}{base64_payload}"),
            payload_start,
        }
    }

    pub fn parse(data_url: impl Into<String>) -> Result<Self, AssetFormatError> {
        let data_url = data_url.into();
        let rest = data_url
            .strip_prefix("data:")
            .ok_or(AssetFormatError::NotDataUrl)?;
        let comma = rest.find(',').ok_or(AssetFormatError::NotDataUrl)?;
        if !rest[..comma].ends_with(";base64") {
            return Err(AssetFormatError::NotBase64);
        }
        let payload_start = "data:".len() + comma + 1;
        if payload_start >= data_url.len() {
            return Err(AssetFormatError::EmptyPayload);
        }
        Ok(Self {
            data_url,
            payload_start,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.data_url
    }

    pub fn mime(&self) -> &str {
        let header = &self.data_url["data:".len()..self.payload_start - 1];
        header.strip_suffix(";base64").unwrap_or(header)
    }

    /// The base64 payload without the data-url header.
    pub fn payload(&self) -> &str {
        &self.data_url[self.payload_start..]
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/png" => "png",
            _ => "bin",
        }
    }
}

impl fmt::Debug for EncodedAsset {
    // Payloads run to megabytes; show a fingerprint instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedAsset")
            .field("mime", &self.mime())
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

/// A reference image named by a source cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAsset {
    source_url: String,
    encoded: Option<EncodedAsset>,
}

impl ReferenceAsset {
    pub fn resolved(source_url: impl Into<String>, encoded: EncodedAsset) -> Self {
        Self {
            source_url: source_url.into(),
            encoded: Some(encoded),
        }
    }

    /// A reference whose URL was well formed but could not be fetched or decoded.
    pub fn unresolved(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            encoded: None,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn encoded(&self) -> Option<&EncodedAsset> {
        self.encoded.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.encoded.is_some()
    }
}

/// Fixed-position reference slots; slot `k` maps to the `k`-th reference column.
pub type ReferenceSlots = [Option<ReferenceAsset>; REFERENCE_SLOTS];

/// Generated outputs for both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TierResults {
    standard: Vec<EncodedAsset>,
    enhanced: Vec<EncodedAsset>,
    // Bumped each time a run replaces the tier's sequence; indexed like `Tier::ALL`.
    revisions: [u64; 2],
}

impl TierResults {
    pub fn get(&self, tier: Tier) -> &[EncodedAsset] {
        match tier {
            Tier::Standard => &self.standard,
            Tier::Enhanced => &self.enhanced,
        }
    }

    pub(crate) fn get_mut(&mut self, tier: Tier) -> &mut Vec<EncodedAsset> {
        match tier {
            Tier::Standard => &mut self.standard,
            Tier::Enhanced => &mut self.enhanced,
        }
    }

    /// Replace the tier's sequence wholesale and advance its revision.
    pub(crate) fn replace(&mut self, tier: Tier, results: Vec<EncodedAsset>) {
        *self.get_mut(tier) = results;
        self.revisions[tier_slot(tier)] += 1;
    }

    /// How many times a run has replaced the tier's sequence.
    pub fn revision(&self, tier: Tier) -> u64 {
        self.revisions[tier_slot(tier)]
    }

    pub fn total(&self) -> usize {
        self.standard.len() + self.enhanced.len()
    }
}

fn tier_slot(tier: Tier) -> usize {
    match tier {
        Tier::Standard => 0,
        Tier::Enhanced => 1,
    }
}

/// One design job.
///
/// Batches are created by [`crate::JobRegistry::ingest`] and only mutated
/// through the registry, which enforces the run lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub(crate) id: BatchId,
    pub(crate) name: String,
    pub(crate) custom_prompt: Option<String>,
    pub(crate) references: ReferenceSlots,
    pub(crate) status: BatchStatus,
    pub(crate) active_mode: Option<Tier>,
    pub(crate) results: TierResults,
    pub(crate) last_error: Option<String>,
}

impl Batch {
    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn custom_prompt(&self) -> Option<&str> {
        self.custom_prompt.as_deref()
    }

    pub fn references(&self) -> &ReferenceSlots {
        &self.references
    }

    /// Encoded references in slot order, skipping absent and unresolved slots.
    pub fn resolved_references(&self) -> Vec<EncodedAsset> {
        self.references
            .iter()
            .flatten()
            .filter_map(|reference| reference.encoded().cloned())
            .collect()
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn active_mode(&self) -> Option<Tier> {
        self.active_mode
    }

    pub fn results(&self, tier: Tier) -> &[EncodedAsset] {
        self.results.get(tier)
    }

    /// Run revision of the tier's results; single-slot edits leave it unchanged.
    pub fn results_revision(&self, tier: Tier) -> u64 {
        self.results.revision(tier)
    }

    pub fn has_results(&self) -> bool {
        self.results.total() > 0
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_asset_splits_header_and_payload() {
        let asset = EncodedAsset::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(asset.mime(), "image/png");
        assert_eq!(asset.payload(), "iVBORw0KGgo=");
        assert_eq!(asset.file_extension(), "png");
        assert_eq!(asset, EncodedAsset::from_parts("image/png", "iVBORw0KGgo="));
    }

    #[test]
    fn encoded_asset_rejects_non_base64_urls() {
        assert_eq!(
            EncodedAsset::parse("https://example.com/a.png"),
            Err(AssetFormatError::NotDataUrl)
        );
        assert_eq!(
            EncodedAsset::parse("data:text/plain,hello"),
            Err(AssetFormatError::NotBase64)
        );
        assert_eq!(
            EncodedAsset::parse("data:image/png;base64,"),
            Err(AssetFormatError::EmptyPayload)
        );
    }

    #[test]
    fn tier_parses_pro_alias() {
        assert_eq!("Pro".parse::<Tier>(), Ok(Tier::Enhanced));
        assert_eq!(" standard ".parse::<Tier>(), Ok(Tier::Standard));
        assert!("ultra".parse::<Tier>().is_err());
    }
}
