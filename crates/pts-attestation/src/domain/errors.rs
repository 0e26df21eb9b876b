//! Error types of the attestation responder.
//!
//! Three disjoint channels:
//! - [`PtsErrorCode`]: numeric codes carried inside PA-TNC error attributes
//!   (in-band, recoverable — the dispatcher still returns success);
//! - [`SessionError`]: fatal conditions that abort the attestation session;
//! - [`WireError`]: attribute codec failures at the transport boundary.

use thiserror::Error;

use super::entities::MeasurementAlgorithm;

/// Numeric PTS error codes carried in PA-TNC error attributes.
///
/// The verifier interprets these under the TCG vendor namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PtsErrorCode {
    Reserved = 0,
    /// None of the offered hash algorithms is supported.
    HashAlgorithmNotSupported = 1,
    /// A pathname failed PTS validation.
    InvalidPath = 2,
    /// The path delimiter is neither solidus nor reverse solidus.
    InvalidDelimiter = 3,
    /// The functional-component naming family is not the TCG family.
    InvalidNameFamily = 4,
    /// TPM version information cannot be provided.
    TpmVersionNotSupported = 5,
    /// None of the offered DH groups is supported.
    DhGroupNotSupported = 6,
    /// The responder cannot satisfy the nonce-length constraints.
    DhNonceLengthInvalid = 7,
    /// Transitive trust chain evidence cannot be determined.
    UnableToDetermineTtc = 8,
    /// Local validation against reference manifests is not available.
    UnableToPerformLocalValidation = 9,
    /// Current evidence retrieval is not available.
    UnableToRetrieveCurrentEvidence = 10,
    /// PCR information cannot be determined.
    UnableToDeterminePcr = 11,
    /// The named file does not exist on the endpoint.
    FileNotFound = 12,
}

impl PtsErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<PtsErrorCode> {
        Some(match code {
            0 => PtsErrorCode::Reserved,
            1 => PtsErrorCode::HashAlgorithmNotSupported,
            2 => PtsErrorCode::InvalidPath,
            3 => PtsErrorCode::InvalidDelimiter,
            4 => PtsErrorCode::InvalidNameFamily,
            5 => PtsErrorCode::TpmVersionNotSupported,
            6 => PtsErrorCode::DhGroupNotSupported,
            7 => PtsErrorCode::DhNonceLengthInvalid,
            8 => PtsErrorCode::UnableToDetermineTtc,
            9 => PtsErrorCode::UnableToPerformLocalValidation,
            10 => PtsErrorCode::UnableToRetrieveCurrentEvidence,
            11 => PtsErrorCode::UnableToDeterminePcr,
            12 => PtsErrorCode::FileNotFound,
            _ => return None,
        })
    }
}

/// Fatal session errors.
///
/// Any of these aborts the attestation session; partially negotiated state
/// and buffered evidence are released with the session value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("DH nonce generation failed: {0}")]
    DhNonceGeneration(String),

    #[error("DH shared-secret computation failed: {0}")]
    SecretComputation(String),

    #[error("verifier selected DH hash algorithm outside the supported set ({0:#06x})")]
    UnsupportedDhHash(u16),

    #[error("initiator nonce length {initiator} differs from responder nonce length {responder}")]
    NonceLengthMismatch { initiator: usize, responder: usize },

    #[error("no measurement algorithm negotiated")]
    AlgorithmNotNegotiated,

    #[error("no hasher available for {0}")]
    HasherUnavailable(MeasurementAlgorithm),

    #[error("file hashing failed: {0}")]
    FileHash(String),

    #[error("reading PCR {0} failed: {1}")]
    PcrRead(u32, String),

    #[error("extending PCR {0} failed: {1}")]
    PcrExtend(u32, String),

    #[error("TPM quote operation failed: {0}")]
    TpmQuote(String),

    #[error("file metadata retrieval failed: {0}")]
    Metadata(String),

    #[error("file measurement failed: {0}")]
    FileMeasurement(String),
}

/// Attribute codec errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("attribute value truncated: needed {needed} more octet(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("{0} trailing octet(s) after attribute value")]
    TrailingBytes(usize),

    #[error("string field is not valid UTF-8")]
    InvalidString,

    #[error("unknown PA-TNC error code {0}")]
    UnknownErrorCode(u32),

    #[error("algorithm field {0:#06x} does not name a single known algorithm")]
    InvalidAlgorithm(u16),

    #[error("DH group field {0:#06x} does not name a single known group")]
    InvalidDhGroup(u16),
}
