//! # Platform Trust Services Attestation Responder
//!
//! Endpoint-side state machine answering remote-attestation queries from an
//! integrity verifier over the TCG PTS protocol: capability and
//! measurement-algorithm negotiation, DH nonce exchange, TPM identity,
//! functional-component measurement, file metadata and measurement
//! requests, and signed TPM quotes over the accumulated PCR set.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): typed attributes, bitsets, negotiation
//!   policies, session state, and the byte codec — no I/O
//! - **Ports Layer** (`ports/`): the [`AttestationResponder`] driving port
//!   and the [`PtsCapability`]/[`Clock`] driven ports
//! - **Service Layer** (`service.rs`): the attribute dispatcher and
//!   per-type handlers
//! - **Adapters** (`adapters/`): TOML configuration loading and the system
//!   clock
//!
//! The TPM, DH backend, and measured filesystem are *consumed* through
//! [`PtsCapability`], never implemented here; the transport framing
//! (PA-TNC attribute headers, message batching) is equally out of scope.
//!
//! ## Protocol flow
//!
//! ```text
//! [verifier]                               [responder session]
//!   Request Protocol Capabilities  ──→  intersect, reply
//!   Measurement Algorithm offer    ──→  select strongest, reply
//!   DH Nonce Parameters Request    ──→  pick group, create nonce, reply
//!   DH Nonce Finish                ──→  derive shared secret
//!   Request Component Evidence     ──→  measure, extend PCR, buffer
//!   Generate Attestation Evidence  ──→  flush evidence + signed quote
//! ```
//!
//! ## Error channels
//!
//! Recoverable protocol violations become PA-TNC error attributes on the
//! output list; failures of the platform primitives abort the session with
//! a [`SessionError`]. Silent skips (unknown attributes, absent AIK,
//! foreign vendor ids) produce neither.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export public API
pub use adapters::{ConfigError, SystemClock};
pub use domain::{
    Aik, AikKind, AttestationConfig, Attribute, ComponentEvidence, ComponentQualifier,
    ComponentType, DhGroup, DhGroupSet, ErrorInfo, EvidenceFinalFlags, EvidenceRequestFlags,
    EvidenceValidation, FileMeasurements, FileMetadata, FunctionalComponentName, MeasAlgorithmSet,
    MeasurementAlgorithm, PcrTransform, ProtoCaps, PtsErrorCode, Session, SessionError, TpmQuote,
    WireError,
};
pub use ports::{AttestationResponder, CapabilityError, Clock, PathValidation, PtsCapability};
pub use service::AttestationService;
