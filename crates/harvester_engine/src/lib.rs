//! Harvester engine: transport, page fetching, normalization and the
//! concurrent harvest loop around the core state machine.
mod client;
mod decode;
mod detail;
mod engine;
mod export;
mod fetch;
mod filename;
mod gate;
mod harvester;
mod normalize;
mod page;
mod persist;
mod query;
mod retry;
mod settings;
mod types;

pub use client::{classify_profile, GraphClient, ProfileError};
pub use decode::{decode_body, response_json, response_text, DecodeError, DecodedBody};
pub use detail::{DetailPage, DetailPageDecoder, DetailSource, HttpDetailSource, ScriptJsonDecoder};
pub use engine::{EngineError, EngineHandle};
pub use export::{export_collection, export_document, ExportError, ExportSummary};
pub use fetch::{ReqwestTransport, Transport, TransportResponse, TransportSettings};
pub use filename::deterministic_filename;
pub use gate::RateGate;
pub use harvester::{HarvestOptions, Harvester};
pub use normalize::{EdgeNormalizer, ItemNormalizer, MediaNormalizer, OwnerContext};
pub use page::{classify_page, classify_status, GraphPageFetcher, PageFetcher};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use query::{GraphQueryEncoder, OperationHashes, OperationKind, QueryEncoder, QueryParams};
pub use retry::retry_with;
pub use settings::{HarvestSettings, RetryPolicy};
pub use types::{
    CollectionKind, FailureKind, FetchError, HarvestEvent, HarvestRequest, HarvestTarget,
    NullSink, ProgressSink, RawPage, EXPLORE_PAGE_SIZE, EXPLORE_START_CURSOR,
};
