//! Outbound ports: capabilities the host must provide.
//!
//! The responder consumes the Platform Trust Services primitives through
//! [`PtsCapability`] and never implements TPM, crypto, or filesystem access
//! itself. Each session owns its capability exclusively; nothing here is
//! shared across sessions.

use chrono::{DateTime, Utc};
use digest::DynDigest;
use thiserror::Error;

use crate::domain::{
    Aik, DhGroup, FileMeasurements, FileMetadata, MeasurementAlgorithm, PtsErrorCode, TpmQuote,
};

/// Error from a PTS capability operation.
///
/// The dispatcher maps these onto the fatal session-error channel; the
/// reason string ends up in the diagnostic log, never on the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// DH key pair or nonce generation failed.
    #[error("DH material: {0}")]
    DhMaterial(String),

    /// Shared-secret derivation failed.
    #[error("shared secret: {0}")]
    SharedSecret(String),

    /// TPM version information is not available.
    #[error("TPM version info: {0}")]
    TpmVersion(String),

    /// Reading or hashing a file failed.
    #[error("file access: {0}")]
    FileAccess(String),

    /// A PCR operation failed.
    #[error("PCR operation: {0}")]
    Pcr(String),

    /// The TPM quote operation failed.
    #[error("TPM quote: {0}")]
    Quote(String),
}

/// Outcome of PTS path validation.
///
/// The three-way split is deliberate: a validation *error* is reported to
/// the verifier in-band, while an *invalid* path is skipped silently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathValidation {
    /// The path is well-formed and measurable.
    Valid,
    /// The path is not acceptable; the request is ignored without reply.
    Invalid,
    /// The path triggered a PTS error the verifier must hear about.
    Error(PtsErrorCode),
}

/// Platform Trust Services primitives (driven port).
///
/// Implementations wrap the TPM, the DH backend, and the measured
/// filesystem. All calls are synchronous; blocking on hardware is expected
/// and the caller schedules accordingly.
pub trait PtsCapability {
    /// Generates the responder's DH key pair and a fresh nonce of
    /// `nonce_len` octets for the selected group.
    fn create_dh_nonce(
        &mut self,
        group: DhGroup,
        nonce_len: usize,
    ) -> Result<(), CapabilityError>;

    /// Returns the responder's public DH value and nonce created by
    /// [`create_dh_nonce`](PtsCapability::create_dh_nonce).
    fn my_public_value(&self) -> Result<(Vec<u8>, Vec<u8>), CapabilityError>;

    /// Stores the initiator's public DH value and nonce.
    fn set_peer_public_value(&mut self, value: &[u8], nonce: &[u8]);

    /// Records the hash algorithm used for secret derivation.
    fn set_dh_hash_algorithm(&mut self, algorithm: MeasurementAlgorithm);

    /// Derives the shared secret from both key halves and nonces, then
    /// clears the responder's ephemeral DH material.
    fn calculate_secret(&mut self) -> Result<(), CapabilityError>;

    /// Opaque TPM version information blob.
    fn tpm_version_info(&self) -> Result<Vec<u8>, CapabilityError>;

    /// The Attestation Identity Key, if one is provisioned. Absence is not
    /// an error; the responder skips the reply silently.
    fn aik(&self) -> Option<Aik>;

    /// Streams the file at `path` through `hasher` and returns the digest.
    fn hash_file(
        &self,
        hasher: &mut dyn DynDigest,
        path: &str,
    ) -> Result<Vec<u8>, CapabilityError>;

    /// Current value of a PCR.
    fn read_pcr(&self, index: u32) -> Result<Vec<u8>, CapabilityError>;

    /// Extends a PCR by `measurement` and returns the new PCR value.
    fn extend_pcr(&mut self, index: u32, measurement: &[u8]) -> Result<Vec<u8>, CapabilityError>;

    /// Produces a signed TPM quote over the given PCRs. Duplicate indices
    /// are acceptable; the TPM composite deduplicates them.
    fn quote_tpm(&mut self, pcr_indices: &[u32]) -> Result<TpmQuote, CapabilityError>;

    /// Validates a pathname before any filesystem access.
    fn is_path_valid(&self, path: &str) -> PathValidation;

    /// Metadata for a file, or for every file of a directory.
    fn get_metadata(&self, path: &str, is_directory: bool)
        -> Result<FileMetadata, CapabilityError>;

    /// Hashes a file, or every file of a directory tree, under the session's
    /// measurement algorithm; tagged with the verifier's request id.
    fn do_measurements(
        &self,
        request_id: u16,
        path: &str,
        is_directory: bool,
    ) -> Result<FileMeasurements, CapabilityError>;
}

/// Wall-clock source (driven port).
///
/// Returns `None` when no trustworthy wall clock is available, which makes
/// the responder stamp evidence with the zero timestamp.
pub trait Clock {
    fn now(&self) -> Option<DateTime<Utc>>;
}
