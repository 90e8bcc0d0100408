//! Studio engine: source loading, reference resolution, generation runs, edit sessions and export.
mod decode;
mod edit;
mod export;
mod fetch;
mod filename;
mod generation;
mod ingest;
mod persist;
mod resolve;
mod scheduler;
mod source;
mod types;

pub use decode::{decode_text, DecodeError, DecodedText, EncodingSource};
pub use edit::{EditError, EditSession, RenderError, RenderSurface};
pub use export::{export_batches, ExportError, ExportOptions, ExportSummary};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::batch_dir_name;
pub use generation::{
    AccessGate, GenerationError, GenerationRequest, GenerationService, GenerationSettings,
    HttpGenerationService,
};
pub use ingest::{ingest_text, resolve_rows, sync_source};
pub use persist::{ensure_output_dir, reset_dir, AtomicFileWriter, PersistError};
pub use resolve::{decode_asset, encode_asset, sniff_image_mime, AssetResolver, HttpAssetResolver};
pub use scheduler::{
    ChannelProgressSink, GenerationScheduler, NoopProgressSink, ProgressSink, RunAllSummary,
    RunOutcome, SchedulerConfig, SchedulerError, SharedRegistry,
};
pub use source::{SheetSource, SourceError};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, SchedulerEvent};
