//! Typed attestation-protocol attributes.
//!
//! Every attribute the responder sends or receives is one arm of the
//! [`Attribute`] union; dispatch happens by matching on the arm, never on
//! raw bytes. The byte codec lives in `domain/wire.rs`.
//!
//! Attribute types are namespaced by vendor: the PTS types live under the
//! TCG Private Enterprise Number, the PA-TNC error attribute under the IETF
//! namespace.

use super::entities::{
    Aik, ComponentEvidence, ComponentQualifier, DhGroup, DhGroupSet, EvidenceFinalFlags,
    EvidenceRequestFlags, FileMeasurements, FileMetadata, FunctionalComponentName,
    MeasAlgorithmSet, MeasurementAlgorithm, ProtoCaps, PEN_IETF, PEN_TCG, PTS_MAX_NONCE_LEN,
};
use super::errors::PtsErrorCode;

// =============================================================================
// ATTRIBUTE TYPE TAGS
// =============================================================================

/// TCG PTS attribute type numbers (TCG namespace).
pub mod tcg {
    pub const REQ_PROTO_CAPS: u32 = 1;
    pub const PROTO_CAPS: u32 = 2;
    pub const DH_NONCE_PARAMS_REQ: u32 = 3;
    pub const DH_NONCE_PARAMS_RESP: u32 = 4;
    pub const DH_NONCE_FINISH: u32 = 5;
    pub const MEAS_ALGO: u32 = 6;
    pub const MEAS_ALGO_SELECTION: u32 = 7;
    pub const GET_TPM_VERSION_INFO: u32 = 8;
    pub const TPM_VERSION_INFO: u32 = 9;
    pub const REQ_TEMPL_REF_MANI_SET_META: u32 = 10;
    pub const TEMPL_REF_MANI_SET_META: u32 = 11;
    pub const UPDATE_TEMPL_REF_MANI: u32 = 12;
    pub const GET_AIK: u32 = 13;
    pub const AIK: u32 = 14;
    pub const REQ_FUNCT_COMP_EVID: u32 = 15;
    pub const GEN_ATTEST_EVID: u32 = 16;
    pub const SIMPLE_COMP_EVID: u32 = 17;
    pub const SIMPLE_EVID_FINAL: u32 = 18;
    pub const VERIFICATION_RESULT: u32 = 19;
    pub const INTEG_REPORT: u32 = 20;
    pub const REQ_FILE_META: u32 = 21;
    pub const UNIX_FILE_META: u32 = 22;
    pub const REQ_REGISTRY_VALUE: u32 = 23;
    pub const REGISTRY_VALUE: u32 = 24;
    pub const REQ_FILE_MEAS: u32 = 25;
    pub const FILE_MEAS: u32 = 26;
    pub const REQ_INTEG_MEAS_LOG: u32 = 27;
    pub const INTEG_MEAS_LOG: u32 = 28;
}

/// IETF PA-TNC attribute type numbers (IETF namespace).
pub mod ietf {
    pub const PA_TNC_ERROR: u32 = 8;
}

// =============================================================================
// ERROR INFORMATION
// =============================================================================

/// Typed error-information payload of a PA-TNC error attribute.
///
/// The layout written to the wire depends on the error code; unknown
/// combinations carry the raw value of the offending attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorInfo {
    /// The responder's supported measurement algorithms.
    HashAlgorithms(MeasAlgorithmSet),
    /// The responder's supported DH groups.
    DhGroups(DhGroupSet),
    /// The nonce length the responder is configured for, and the protocol
    /// maximum it could accept.
    NonceLimits { min: u16, max: u16 },
    /// Raw value of the attribute that triggered the error.
    Attribute(Vec<u8>),
}

// =============================================================================
// THE ATTRIBUTE UNION
// =============================================================================

/// A decoded attestation-protocol attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribute {
    /// PTS protocol capabilities; `request` selects the request attribute
    /// type, the reply carries the negotiated intersection.
    ProtoCaps { flags: ProtoCaps, request: bool },

    /// Measurement algorithm offer (`selection = false`) or the responder's
    /// selection (`selection = true`, exactly one bit set).
    MeasurementAlgorithms {
        set: MeasAlgorithmSet,
        selection: bool,
    },

    /// Verifier opens the DH nonce exchange.
    DhNonceParamsReq {
        min_nonce_len: u16,
        dh_groups: DhGroupSet,
    },

    /// Responder's half of the DH nonce exchange.
    DhNonceParamsResp {
        selected_group: DhGroup,
        hash_algorithms: MeasAlgorithmSet,
        responder_nonce: Vec<u8>,
        responder_value: Vec<u8>,
    },

    /// Verifier completes the DH nonce exchange.
    DhNonceFinish {
        hash_algorithm: MeasurementAlgorithm,
        initiator_value: Vec<u8>,
        initiator_nonce: Vec<u8>,
    },

    GetTpmVersionInfo,

    TpmVersionInfo { version_info: Vec<u8> },

    GetAik,

    Aik { aik: Aik },

    /// Request for evidence of a named functional component.
    ReqFunctCompEvid {
        flags: EvidenceRequestFlags,
        sub_component_depth: u32,
        vendor_id: u32,
        family: u8,
        qualifier: ComponentQualifier,
        name: FunctionalComponentName,
    },

    /// Request to flush buffered evidence and produce a signed quote.
    GenAttestEvid,

    SimpleCompEvid { evidence: ComponentEvidence },

    SimpleEvidFinal {
        flags: EvidenceFinalFlags,
        pcr_composite: Vec<u8>,
        quote_signature: Vec<u8>,
        version_info: Vec<u8>,
    },

    ReqFileMeta {
        directory: bool,
        delimiter: u8,
        path: String,
    },

    UnixFileMeta { metadata: FileMetadata },

    ReqFileMeas {
        directory: bool,
        request_id: u16,
        delimiter: u8,
        path: String,
    },

    FileMeas { measurements: FileMeasurements },

    /// IETF PA-TNC error attribute.
    PaTncError {
        vendor_id: u32,
        code: PtsErrorCode,
        info: ErrorInfo,
    },

    /// Any attribute type this responder does not model; preserved raw so
    /// the dispatcher can log and skip it.
    Unknown {
        vendor_id: u32,
        tag: u32,
        value: Vec<u8>,
    },
}

impl Attribute {
    /// Vendor namespace of the attribute type.
    pub fn vendor_id(&self) -> u32 {
        match self {
            Attribute::PaTncError { .. } => PEN_IETF,
            Attribute::Unknown { vendor_id, .. } => *vendor_id,
            _ => PEN_TCG,
        }
    }

    /// Attribute type number within its vendor namespace.
    pub fn tag(&self) -> u32 {
        match self {
            Attribute::ProtoCaps { request: true, .. } => tcg::REQ_PROTO_CAPS,
            Attribute::ProtoCaps { request: false, .. } => tcg::PROTO_CAPS,
            Attribute::MeasurementAlgorithms {
                selection: false, ..
            } => tcg::MEAS_ALGO,
            Attribute::MeasurementAlgorithms {
                selection: true, ..
            } => tcg::MEAS_ALGO_SELECTION,
            Attribute::DhNonceParamsReq { .. } => tcg::DH_NONCE_PARAMS_REQ,
            Attribute::DhNonceParamsResp { .. } => tcg::DH_NONCE_PARAMS_RESP,
            Attribute::DhNonceFinish { .. } => tcg::DH_NONCE_FINISH,
            Attribute::GetTpmVersionInfo => tcg::GET_TPM_VERSION_INFO,
            Attribute::TpmVersionInfo { .. } => tcg::TPM_VERSION_INFO,
            Attribute::GetAik => tcg::GET_AIK,
            Attribute::Aik { .. } => tcg::AIK,
            Attribute::ReqFunctCompEvid { .. } => tcg::REQ_FUNCT_COMP_EVID,
            Attribute::GenAttestEvid => tcg::GEN_ATTEST_EVID,
            Attribute::SimpleCompEvid { .. } => tcg::SIMPLE_COMP_EVID,
            Attribute::SimpleEvidFinal { .. } => tcg::SIMPLE_EVID_FINAL,
            Attribute::ReqFileMeta { .. } => tcg::REQ_FILE_META,
            Attribute::UnixFileMeta { .. } => tcg::UNIX_FILE_META,
            Attribute::ReqFileMeas { .. } => tcg::REQ_FILE_MEAS,
            Attribute::FileMeas { .. } => tcg::FILE_MEAS,
            Attribute::PaTncError { .. } => ietf::PA_TNC_ERROR,
            Attribute::Unknown { tag, .. } => *tag,
        }
    }

    /// Human-readable attribute name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::ProtoCaps { request: true, .. } => "Request PTS Protocol Capabilities",
            Attribute::ProtoCaps { request: false, .. } => "PTS Protocol Capabilities",
            Attribute::MeasurementAlgorithms {
                selection: false, ..
            } => "PTS Measurement Algorithm",
            Attribute::MeasurementAlgorithms {
                selection: true, ..
            } => "PTS Measurement Algorithm Selection",
            Attribute::DhNonceParamsReq { .. } => "DH Nonce Parameters Request",
            Attribute::DhNonceParamsResp { .. } => "DH Nonce Parameters Response",
            Attribute::DhNonceFinish { .. } => "DH Nonce Finish",
            Attribute::GetTpmVersionInfo => "Get TPM Version Information",
            Attribute::TpmVersionInfo { .. } => "TPM Version Information",
            Attribute::GetAik => "Get Attestation Identity Key",
            Attribute::Aik { .. } => "Attestation Identity Key",
            Attribute::ReqFunctCompEvid { .. } => "Request Functional Component Evidence",
            Attribute::GenAttestEvid => "Generate Attestation Evidence",
            Attribute::SimpleCompEvid { .. } => "Simple Component Evidence",
            Attribute::SimpleEvidFinal { .. } => "Simple Evidence Final",
            Attribute::ReqFileMeta { .. } => "Request File Metadata",
            Attribute::UnixFileMeta { .. } => "Unix-Style File Metadata",
            Attribute::ReqFileMeas { .. } => "Request File Measurement",
            Attribute::FileMeas { .. } => "File Measurement",
            Attribute::PaTncError { .. } => "PA-TNC Error",
            Attribute::Unknown { .. } => "Unknown",
        }
    }

    /// Whether the recipient must not skip this attribute even when it does
    /// not understand the type (the PA-TNC no-skip flag of the outer
    /// framing). Set on measurement responses the verifier asked for.
    pub fn noskip(&self) -> bool {
        matches!(
            self,
            Attribute::UnixFileMeta { .. } | Attribute::FileMeas { .. }
        )
    }
}

// =============================================================================
// ERROR-ATTRIBUTE FACTORY
// =============================================================================

impl Attribute {
    /// PA-TNC error: none of the offered hash algorithms is supported.
    /// Carries the responder's supported set so the verifier can re-offer.
    pub fn hash_algorithm_error(supported: MeasAlgorithmSet) -> Attribute {
        Attribute::PaTncError {
            vendor_id: PEN_TCG,
            code: PtsErrorCode::HashAlgorithmNotSupported,
            info: ErrorInfo::HashAlgorithms(supported),
        }
    }

    /// PA-TNC error: none of the offered DH groups is supported.
    pub fn dh_group_error(supported: DhGroupSet) -> Attribute {
        Attribute::PaTncError {
            vendor_id: PEN_TCG,
            code: PtsErrorCode::DhGroupNotSupported,
            info: ErrorInfo::DhGroups(supported),
        }
    }

    /// PA-TNC error: the configured nonce length cannot satisfy the
    /// verifier's constraints. Carries the configured length and the
    /// protocol maximum.
    pub fn dh_nonce_error(configured_len: u16) -> Attribute {
        Attribute::PaTncError {
            vendor_id: PEN_TCG,
            code: PtsErrorCode::DhNonceLengthInvalid,
            info: ErrorInfo::NonceLimits {
                min: configured_len,
                max: PTS_MAX_NONCE_LEN as u16,
            },
        }
    }

    /// Generic PA-TNC error carrying the raw value of the offending
    /// attribute.
    pub fn pts_error(code: PtsErrorCode, offending_value: Vec<u8>) -> Attribute {
        Attribute::PaTncError {
            vendor_id: PEN_TCG,
            code,
            info: ErrorInfo::Attribute(offending_value),
        }
    }
}
