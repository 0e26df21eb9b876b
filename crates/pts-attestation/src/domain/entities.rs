//! Core domain entities for the attestation responder.
//!
//! Defines the protocol capability flags, measurement-algorithm and
//! Diffie-Hellman group sets, functional-component naming, and the evidence
//! payload types exchanged with the integrity verifier.
//!
//! All bitsets use the wire bit positions of the TCG PTS binding; the byte
//! codec in `domain/wire.rs` writes them verbatim.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use digest::DynDigest;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

// =============================================================================
// PROTOCOL CONSTANTS
// =============================================================================

/// IANA Private Enterprise Number of the Trusted Computing Group.
pub const PEN_TCG: u32 = 0x00_5597;

/// IANA Private Enterprise Number of the IETF (PA-TNC attribute namespace).
pub const PEN_IETF: u32 = 0;

/// Smallest DH nonce length the responder will agree to (octets).
pub const PTS_MIN_NONCE_LEN: usize = 17;

/// Largest DH nonce length representable on the wire (octets).
pub const PTS_MAX_NONCE_LEN: usize = 0xFFFF;

/// Exact length of the measurement timestamp string (octets).
pub const MEASUREMENT_TIME_LEN: usize = 20;

/// Timestamp emitted when no wall clock is available.
pub const MEASUREMENT_TIME_ZERO: &str = "0000-00-00T00:00:00Z";

// =============================================================================
// PROTOCOL CAPABILITIES
// =============================================================================

/// PTS protocol capability flags.
///
/// A bitset over {T, D, V, C}:
/// - **T**: a TPM is present and PCR-backed evidence can be produced
/// - **D**: DH nonce negotiation is supported
/// - **V**: local verification against reference manifests is supported
/// - **C**: current (as opposed to logged) evidence can be retrieved
///
/// INVARIANT: after capability negotiation the session value is a subset of
/// both the locally supported set and the verifier's offer, and is set once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtoCaps(u16);

impl ProtoCaps {
    /// No capabilities.
    pub const NONE: ProtoCaps = ProtoCaps(0);
    /// TPM present.
    pub const TPM: ProtoCaps = ProtoCaps(1 << 0);
    /// DH nonce negotiation.
    pub const DH_NONCE: ProtoCaps = ProtoCaps(1 << 1);
    /// Local verification.
    pub const VERIFICATION: ProtoCaps = ProtoCaps(1 << 2);
    /// Current evidence retrieval.
    pub const CURRENT_EVIDENCE: ProtoCaps = ProtoCaps(1 << 3);

    /// Mask of all defined capability bits.
    const MASK: u16 = 0x000F;

    /// Every capability this implementation knows about.
    pub fn all() -> ProtoCaps {
        ProtoCaps(Self::MASK)
    }

    /// Reconstructs a set from wire bits; undefined bits are discarded.
    pub fn from_bits(bits: u16) -> ProtoCaps {
        ProtoCaps(bits & Self::MASK)
    }

    /// Raw wire bits.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// True if every flag in `other` is also set in `self`.
    pub fn contains(self, other: ProtoCaps) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitAnd for ProtoCaps {
    type Output = ProtoCaps;

    fn bitand(self, rhs: ProtoCaps) -> ProtoCaps {
        ProtoCaps(self.0 & rhs.0)
    }
}

impl BitOr for ProtoCaps {
    type Output = ProtoCaps;

    fn bitor(self, rhs: ProtoCaps) -> ProtoCaps {
        ProtoCaps(self.0 | rhs.0)
    }
}

// =============================================================================
// MEASUREMENT ALGORITHMS
// =============================================================================

/// A single negotiated measurement hash algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasurementAlgorithm {
    Sha1,
    Sha256,
    Sha384,
}

impl MeasurementAlgorithm {
    /// Algorithms ordered strongest first; negotiation walks this slice.
    pub const STRONGEST_FIRST: [MeasurementAlgorithm; 3] = [
        MeasurementAlgorithm::Sha384,
        MeasurementAlgorithm::Sha256,
        MeasurementAlgorithm::Sha1,
    ];

    /// Wire bit of this algorithm inside a [`MeasAlgorithmSet`].
    pub fn bit(self) -> u16 {
        match self {
            MeasurementAlgorithm::Sha1 => 1 << 15,
            MeasurementAlgorithm::Sha256 => 1 << 14,
            MeasurementAlgorithm::Sha384 => 1 << 13,
        }
    }

    /// Digest size in octets.
    pub fn digest_size(self) -> usize {
        match self {
            MeasurementAlgorithm::Sha1 => 20,
            MeasurementAlgorithm::Sha256 => 32,
            MeasurementAlgorithm::Sha384 => 48,
        }
    }

    /// Instantiates a streaming hasher for this algorithm.
    ///
    /// Returns `None` when no digest implementation is linked for the
    /// algorithm; callers treat that as a fatal session error.
    pub fn hasher(self) -> Option<Box<dyn DynDigest>> {
        match self {
            MeasurementAlgorithm::Sha1 => Some(Box::new(Sha1::default())),
            MeasurementAlgorithm::Sha256 => Some(Box::new(Sha256::default())),
            MeasurementAlgorithm::Sha384 => Some(Box::new(Sha384::default())),
        }
    }
}

impl fmt::Display for MeasurementAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementAlgorithm::Sha1 => write!(f, "SHA1"),
            MeasurementAlgorithm::Sha256 => write!(f, "SHA256"),
            MeasurementAlgorithm::Sha384 => write!(f, "SHA384"),
        }
    }
}

/// Wire bitset of measurement hash algorithms.
///
/// Bit positions follow the TCG PTS binding: SHA1 = `1<<15`,
/// SHA256 = `1<<14`, SHA384 = `1<<13`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeasAlgorithmSet(u16);

impl MeasAlgorithmSet {
    pub const EMPTY: MeasAlgorithmSet = MeasAlgorithmSet(0);

    pub fn from_bits(bits: u16) -> MeasAlgorithmSet {
        MeasAlgorithmSet(bits)
    }

    /// A set holding exactly one algorithm.
    pub fn only(algorithm: MeasurementAlgorithm) -> MeasAlgorithmSet {
        MeasAlgorithmSet(algorithm.bit())
    }

    /// Builds a set from a list of algorithms.
    pub fn of(algorithms: &[MeasurementAlgorithm]) -> MeasAlgorithmSet {
        MeasAlgorithmSet(algorithms.iter().fold(0, |bits, a| bits | a.bit()))
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, algorithm: MeasurementAlgorithm) -> bool {
        self.0 & algorithm.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// If the set holds exactly one known algorithm, returns it.
    pub fn single(self) -> Option<MeasurementAlgorithm> {
        let mut found = None;
        for algorithm in MeasurementAlgorithm::STRONGEST_FIRST {
            if self.contains(algorithm) {
                if found.is_some() {
                    return None;
                }
                found = Some(algorithm);
            }
        }
        found
    }
}

// =============================================================================
// DIFFIE-HELLMAN GROUPS
// =============================================================================

/// A single DH group from the PTS binding (IKE group numbering).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DhGroup {
    /// MODP 1024 (IKE group 2).
    Ike2,
    /// MODP 1536 (IKE group 5).
    Ike5,
    /// MODP 2048 (IKE group 14).
    Ike14,
    /// ECP 256 (IKE group 19).
    Ike19,
    /// ECP 384 (IKE group 20).
    Ike20,
}

impl DhGroup {
    /// Groups ordered strongest first; negotiation walks this slice.
    pub const STRONGEST_FIRST: [DhGroup; 5] = [
        DhGroup::Ike20,
        DhGroup::Ike19,
        DhGroup::Ike14,
        DhGroup::Ike5,
        DhGroup::Ike2,
    ];

    /// Wire bit of this group inside a [`DhGroupSet`].
    pub fn bit(self) -> u16 {
        match self {
            DhGroup::Ike2 => 1 << 15,
            DhGroup::Ike5 => 1 << 14,
            DhGroup::Ike14 => 1 << 13,
            DhGroup::Ike19 => 1 << 12,
            DhGroup::Ike20 => 1 << 11,
        }
    }
}

impl fmt::Display for DhGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhGroup::Ike2 => write!(f, "IKE2"),
            DhGroup::Ike5 => write!(f, "IKE5"),
            DhGroup::Ike14 => write!(f, "IKE14"),
            DhGroup::Ike19 => write!(f, "IKE19"),
            DhGroup::Ike20 => write!(f, "IKE20"),
        }
    }
}

/// Wire bitset of DH groups (IKE2 = `1<<15` down to IKE20 = `1<<11`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DhGroupSet(u16);

impl DhGroupSet {
    pub const EMPTY: DhGroupSet = DhGroupSet(0);

    pub fn from_bits(bits: u16) -> DhGroupSet {
        DhGroupSet(bits)
    }

    pub fn only(group: DhGroup) -> DhGroupSet {
        DhGroupSet(group.bit())
    }

    pub fn of(groups: &[DhGroup]) -> DhGroupSet {
        DhGroupSet(groups.iter().fold(0, |bits, g| bits | g.bit()))
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, group: DhGroup) -> bool {
        self.0 & group.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn single(self) -> Option<DhGroup> {
        let mut found = None;
        for group in DhGroup::STRONGEST_FIRST {
            if self.contains(group) {
                if found.is_some() {
                    return None;
                }
                found = Some(group);
            }
        }
        found
    }
}

// =============================================================================
// FUNCTIONAL COMPONENT NAMING
// =============================================================================

/// TCG functional component names (the TCG naming family, family 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionalComponentName {
    Ignore,
    Crtm,
    Bios,
    PlatformExtension,
    Motherboard,
    InitLoader,
    OptionRoms,
    /// A name this implementation does not know; kept for diagnostics.
    Other(u32),
}

impl FunctionalComponentName {
    pub fn from_code(code: u32) -> FunctionalComponentName {
        match code {
            0 => FunctionalComponentName::Ignore,
            1 => FunctionalComponentName::Crtm,
            2 => FunctionalComponentName::Bios,
            3 => FunctionalComponentName::PlatformExtension,
            4 => FunctionalComponentName::Motherboard,
            5 => FunctionalComponentName::InitLoader,
            6 => FunctionalComponentName::OptionRoms,
            other => FunctionalComponentName::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            FunctionalComponentName::Ignore => 0,
            FunctionalComponentName::Crtm => 1,
            FunctionalComponentName::Bios => 2,
            FunctionalComponentName::PlatformExtension => 3,
            FunctionalComponentName::Motherboard => 4,
            FunctionalComponentName::InitLoader => 5,
            FunctionalComponentName::OptionRoms => 6,
            FunctionalComponentName::Other(code) => code,
        }
    }
}

impl fmt::Display for FunctionalComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionalComponentName::Ignore => write!(f, "Ignore"),
            FunctionalComponentName::Crtm => write!(f, "CRTM"),
            FunctionalComponentName::Bios => write!(f, "BIOS"),
            FunctionalComponentName::PlatformExtension => write!(f, "Platform Extension"),
            FunctionalComponentName::Motherboard => write!(f, "Motherboard"),
            FunctionalComponentName::InitLoader => write!(f, "Initial Loader"),
            FunctionalComponentName::OptionRoms => write!(f, "Option ROMs"),
            FunctionalComponentName::Other(code) => write!(f, "Unknown({code})"),
        }
    }
}

/// Component type nibble of the qualifier octet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    Unknown,
    Trusted,
    OperatingSystem,
    GraphicalUserInterface,
    Application,
    Networking,
    Library,
    Tnc,
    /// Wildcard matching every component type.
    All,
    /// An unassigned nibble value, preserved for round-tripping.
    Other(u8),
}

impl ComponentType {
    pub fn from_nibble(nibble: u8) -> ComponentType {
        match nibble & 0x0F {
            0x0 => ComponentType::Unknown,
            0x1 => ComponentType::Trusted,
            0x2 => ComponentType::OperatingSystem,
            0x3 => ComponentType::GraphicalUserInterface,
            0x4 => ComponentType::Application,
            0x5 => ComponentType::Networking,
            0x6 => ComponentType::Library,
            0x7 => ComponentType::Tnc,
            0xF => ComponentType::All,
            other => ComponentType::Other(other),
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            ComponentType::Unknown => 0x0,
            ComponentType::Trusted => 0x1,
            ComponentType::OperatingSystem => 0x2,
            ComponentType::GraphicalUserInterface => 0x3,
            ComponentType::Application => 0x4,
            ComponentType::Networking => 0x5,
            ComponentType::Library => 0x6,
            ComponentType::Tnc => 0x7,
            ComponentType::All => 0xF,
            ComponentType::Other(nibble) => nibble & 0x0F,
        }
    }
}

/// Qualifier of a functional component name (kernel / sub-component bits
/// plus the component type nibble).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentQualifier {
    pub kernel: bool,
    pub sub_component: bool,
    pub component_type: ComponentType,
}

impl ComponentQualifier {
    /// Kernel + sub-component + type ALL: matches any component.
    pub fn is_wildcard(self) -> bool {
        self.kernel && self.sub_component && self.component_type == ComponentType::All
    }

    /// Neither bit set and type UNKNOWN: the verifier did not qualify.
    pub fn is_unknown(self) -> bool {
        !self.kernel && !self.sub_component && self.component_type == ComponentType::Unknown
    }
}

// =============================================================================
// EVIDENCE PAYLOADS
// =============================================================================

/// Flags octet of a functional-component evidence request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvidenceRequestFlags(u8);

impl EvidenceRequestFlags {
    pub const NONE: EvidenceRequestFlags = EvidenceRequestFlags(0);
    /// Transitive Trust Chain evidence requested.
    pub const TTC: EvidenceRequestFlags = EvidenceRequestFlags(1 << 7);
    /// Verification against reference manifests requested.
    pub const VER: EvidenceRequestFlags = EvidenceRequestFlags(1 << 6);
    /// Current evidence (not logged evidence) requested.
    pub const CURR: EvidenceRequestFlags = EvidenceRequestFlags(1 << 5);
    /// PCR information requested.
    pub const PCR: EvidenceRequestFlags = EvidenceRequestFlags(1 << 4);

    pub fn from_bits(bits: u8) -> EvidenceRequestFlags {
        EvidenceRequestFlags(bits & 0xF0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: EvidenceRequestFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EvidenceRequestFlags {
    type Output = EvidenceRequestFlags;

    fn bitor(self, rhs: EvidenceRequestFlags) -> EvidenceRequestFlags {
        EvidenceRequestFlags(self.0 | rhs.0)
    }
}

/// Validation verdict carried in a simple-component-evidence attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvidenceValidation {
    /// No validation was attempted.
    None,
    /// Validation was attempted; the component did not match its reference.
    NotValid,
    /// Validation was attempted and the component matched.
    Valid,
}

impl EvidenceValidation {
    pub fn from_bits(bits: u8) -> EvidenceValidation {
        match bits & 0b11 {
            0b01 => EvidenceValidation::NotValid,
            0b10 => EvidenceValidation::Valid,
            _ => EvidenceValidation::None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            EvidenceValidation::None => 0b00,
            EvidenceValidation::NotValid => 0b01,
            EvidenceValidation::Valid => 0b10,
        }
    }
}

/// How a measurement digest was transformed before extension into a PCR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcrTransform {
    /// No PCR information included, nothing transformed.
    No,
    /// Digest width matches the PCR width.
    Match,
    /// Digest is shorter than the PCR.
    Short,
    /// Digest is longer than the PCR.
    Long,
}

impl PcrTransform {
    /// Derives the transformation from the evidence shape.
    ///
    /// Without PCR information the transformation is always `No`; with it,
    /// SHA1 matches the PCR width and the wider digests are `Long`.
    pub fn derive(pcr_info_included: bool, algorithm: MeasurementAlgorithm) -> PcrTransform {
        if !pcr_info_included {
            return PcrTransform::No;
        }
        match algorithm {
            MeasurementAlgorithm::Sha1 => PcrTransform::Match,
            MeasurementAlgorithm::Sha256 | MeasurementAlgorithm::Sha384 => PcrTransform::Long,
        }
    }

    pub fn from_code(code: u8) -> PcrTransform {
        match code & 0b11 {
            1 => PcrTransform::Match,
            2 => PcrTransform::Short,
            3 => PcrTransform::Long,
            _ => PcrTransform::No,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PcrTransform::No => 0,
            PcrTransform::Match => 1,
            PcrTransform::Short => 2,
            PcrTransform::Long => 3,
        }
    }
}

/// A buffered simple-component-evidence payload.
///
/// INVARIANT: `measurement.len() == hash_algorithm.digest_size()` and
/// `measurement_time.len() == MEASUREMENT_TIME_LEN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentEvidence {
    pub pcr_info_included: bool,
    pub validation: EvidenceValidation,
    pub sub_component_depth: u32,
    pub vendor_id: u32,
    pub qualifier: ComponentQualifier,
    pub name: FunctionalComponentName,
    pub extended_pcr: u32,
    pub hash_algorithm: MeasurementAlgorithm,
    pub transformation: PcrTransform,
    /// UTC timestamp, exactly 20 octets, `YYYY-MM-DDTHH:MM:SSZ`.
    pub measurement_time: String,
    pub measurement: Vec<u8>,
    pub policy_uri: String,
    pub pcr_before: Vec<u8>,
    pub pcr_after: Vec<u8>,
}

/// Flags octet of the simple-evidence-final attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvidenceFinalFlags(u8);

impl EvidenceFinalFlags {
    pub const NONE: EvidenceFinalFlags = EvidenceFinalFlags(0);
    /// The attribute carries a TPM quote over the extended PCRs.
    pub const TPM_QUOTE_INFO: EvidenceFinalFlags = EvidenceFinalFlags(1 << 6);

    pub fn from_bits(bits: u8) -> EvidenceFinalFlags {
        EvidenceFinalFlags(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: EvidenceFinalFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

// =============================================================================
// TPM IDENTITY
// =============================================================================

/// Shape of the Attestation Identity Key handed to the verifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AikKind {
    /// An X.509 AIK certificate.
    Certificate,
    /// A naked AIK public key without certification.
    PublicKey,
}

impl AikKind {
    pub fn from_code(code: u8) -> AikKind {
        if code == 1 {
            AikKind::PublicKey
        } else {
            AikKind::Certificate
        }
    }

    pub fn code(self) -> u8 {
        match self {
            AikKind::Certificate => 0,
            AikKind::PublicKey => 1,
        }
    }
}

/// An opaque AIK certificate or public-key blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aik {
    pub kind: AikKind,
    pub blob: Vec<u8>,
}

/// Result of a TPM quote over a set of PCRs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TpmQuote {
    /// The PCR composite structure covered by the signature.
    pub pcr_composite: Vec<u8>,
    /// AIK signature over the composite.
    pub signature: Vec<u8>,
}

// =============================================================================
// FILE METADATA AND MEASUREMENTS
// =============================================================================

/// POSIX file type as reported in Unix file metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Other,
    Fifo,
    CharacterDevice,
    Directory,
    BlockDevice,
    Regular,
    SymbolicLink,
    Socket,
}

impl FileType {
    pub fn from_code(code: u8) -> FileType {
        match code {
            1 => FileType::Fifo,
            2 => FileType::CharacterDevice,
            3 => FileType::Directory,
            4 => FileType::BlockDevice,
            5 => FileType::Regular,
            6 => FileType::SymbolicLink,
            7 => FileType::Socket,
            _ => FileType::Other,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            FileType::Other => 0,
            FileType::Fifo => 1,
            FileType::CharacterDevice => 2,
            FileType::Directory => 3,
            FileType::BlockDevice => 4,
            FileType::Regular => 5,
            FileType::SymbolicLink => 6,
            FileType::Socket => 7,
        }
    }
}

/// Metadata of a single file, as carried in a unix-file-metadata attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadataEntry {
    pub filename: String,
    pub kind: FileType,
    pub size: u64,
    pub created: u64,
    pub modified: u64,
    pub accessed: u64,
    pub owner: u64,
    pub group: u64,
}

/// Metadata for a file or every file of a directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub entries: Vec<FileMetadataEntry>,
}

/// Digest of a single file within a file-measurement response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMeasurementEntry {
    pub filename: String,
    pub measurement: Vec<u8>,
}

/// File measurements tagged with the verifier's request id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileMeasurements {
    pub request_id: u16,
    pub entries: Vec<FileMeasurementEntry>,
}

// =============================================================================
// TESTS
// =============================================================================
