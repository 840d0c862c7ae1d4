pub mod ingest;

pub use ingest::{AbandonReason, Disposal, IngestPhase, IngestPolicy, ParseFailureAction};
