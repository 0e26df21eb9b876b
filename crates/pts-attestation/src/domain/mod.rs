//! Domain layer: pure protocol logic, no I/O.
//!
//! Everything under this module operates on typed values; the byte codec in
//! [`wire`] is the only place that touches the encoded form, and the driven
//! ports in `crate::ports` are the only route to hardware or files.

pub mod attributes;
pub mod config;
pub mod entities;
pub mod errors;
pub mod negotiation;
pub mod session;
pub mod wire;

pub use attributes::{Attribute, ErrorInfo};
pub use config::AttestationConfig;
pub use entities::{
    Aik, AikKind, ComponentEvidence, ComponentQualifier, ComponentType, DhGroup, DhGroupSet,
    EvidenceFinalFlags, EvidenceRequestFlags, EvidenceValidation, FileMeasurementEntry,
    FileMeasurements, FileMetadata, FileMetadataEntry, FileType, FunctionalComponentName,
    MeasAlgorithmSet, MeasurementAlgorithm, PcrTransform, ProtoCaps, TpmQuote,
};
pub use errors::{PtsErrorCode, SessionError, WireError};
pub use session::Session;
