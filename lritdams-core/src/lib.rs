//! # lritdams-core
//!
//! Core library for the LRIT-to-DAMS-NT relay gateway.
//!
//! This crate contains:
//! - **Message model**: `DcpMessage`, the DOMSAT header, carrier times and baud codes
//! - **Broadcast files**: `HritFileReader` for HRIT/LRIT DCS files behind the `BroadcastParser` seam
//! - **Framing**: `DamsNtFrame`, `MessageTranslator` and the `DamsNtCodec` stream codec
//! - **Network**: `ClientSession`, `Registry`, `Server` and the fault-isolating `Distributor`
//! - **State**: the ingest-file lifecycle (`IngestPhase`) and its age policy
//! - **Error**: `GatewayError`, `SessionError`, `HritError`, all `thiserror`-based

pub mod codec;
pub mod error;
pub mod flags;
pub mod frame;
pub mod hrit;
pub mod message;
pub mod network;
pub mod state;
pub mod translate;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{DamsNtCodec, MAX_FRAME_SIZE};
pub use error::{GatewayError, HritError, HritErrorCode, SessionError};
pub use flags::{ArmFlags, HritMsgFlags, LritMsgFlags};
pub use frame::{DamsNtFrame, FRAME_HEADER_LEN, HEARTBEAT, StartPattern};
pub use hrit::{BroadcastParser, DcsFormat, HritFileBuilder, HritFileReader, HritMessageSpec, HritParser};
pub use message::{Baud, DcpMessage};
pub use network::{
    ClientSession, DistributeReport, Distributor, Registry, Server, SessionFactory,
    tcp_session_factory,
};
pub use state::{AbandonReason, Disposal, IngestPhase, IngestPolicy, ParseFailureAction};
pub use translate::MessageTranslator;
