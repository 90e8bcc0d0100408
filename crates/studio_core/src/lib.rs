//! Studio core: batch model, lifecycle state machine, tabular mapping and edit history.
mod adjust;
mod batch;
mod history;
mod registry;
mod tabular;
mod view_model;

pub use adjust::{AdjustmentError, Adjustments, Rotation, MAX_PERCENT, NEUTRAL_PERCENT};
pub use batch::{
    AssetFormatError, Batch, BatchId, BatchStatus, EncodedAsset, ReferenceAsset, ReferenceSlots,
    Tier, TierResults, UnknownTier, REFERENCE_SLOTS,
};
pub use history::EditHistory;
pub use registry::{JobRegistry, RegistryError};
pub use tabular::{map_rows, parse_delimited, parse_reference_url, ColumnMap, JobRow, PendingRow};
pub use view_model::{BatchRowView, RegistryView};
