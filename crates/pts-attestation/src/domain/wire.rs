//! Byte codec for attestation-protocol attributes.
//!
//! Encodes and decodes the *value* portion of each attribute; the outer
//! PA-TNC attribute header (flags, vendor id, type, length) is the
//! transport's concern. All integers are big-endian. Variable-length fields
//! are length-prefixed (`chunk16`/`chunk32`) unless they are the final
//! field of an attribute, in which case they run to the end of the value.
//!
//! Value layouts:
//!
//! ```text
//! ProtoCaps (TCG 1/2)        reserved u16 | flags u16
//! DhNonceParamsReq (TCG 3)   reserved u8 | min_nonce_len u16 | dh_groups u16
//! DhNonceParamsResp (TCG 4)  reserved u8 | selected_group u16
//!                            | hash_algorithms u16 | nonce chunk16
//!                            | responder_value ..end
//! DhNonceFinish (TCG 5)      reserved u8 | hash_algorithm u16
//!                            | initiator_value chunk16 | initiator_nonce ..end
//! MeasAlgo (TCG 6/7)         reserved u16 | algorithm_set u16
//! GetTpmVersionInfo (TCG 8)  (empty)
//! TpmVersionInfo (TCG 9)     version_info ..end
//! GetAik (TCG 13)            (empty)
//! Aik (TCG 14)               kind u8 | blob ..end
//! ReqFunctCompEvid (TCG 15)  flags u8 | depth u32 | vendor u24
//!                            | family/qualifier u8 | name u32
//! GenAttestEvid (TCG 16)     (empty)
//! SimpleCompEvid (TCG 17)    flags u8 | depth u32 | vendor u24
//!                            | qualifier u8 | name u32 | extended_pcr u32
//!                            | hash_algorithm u16 | transformation u8
//!                            | measurement_time 20 octets
//!                            | policy_uri chunk16 | measurement chunk16
//!                            [| pcr_before chunk16 | pcr_after chunk16]
//! SimpleEvidFinal (TCG 18)   flags u8 | reserved u8 | composite chunk32
//!                            | signature chunk32 | version_info chunk16
//! ReqFileMeta (TCG 21)       flags u8 | delimiter u8 | reserved u16
//!                            | pathname ..end
//! UnixFileMeta (TCG 22)      count u64 | { filename chunk16 | type u8
//!                            | size u64 | created u64 | modified u64
//!                            | accessed u64 | owner u64 | group u64 }*
//! ReqFileMeas (TCG 25)       flags u8 | delimiter u8 | request_id u16
//!                            | pathname ..end
//! FileMeas (TCG 26)          count u64 | request_id u16 | meas_len u16
//!                            | { measurement meas_len | filename chunk16 }*
//! PaTncError (IETF 8)        reserved u8 | vendor u24 | code u32 | info ..end
//! ```
//!
//! The error-information layout depends on the error code: the hash and
//! DH-group errors carry `reserved u16 | set u16`, the nonce-length error
//! carries `min u16 | max u16`, every other code carries the raw value of
//! the offending attribute.
//!
//! The family/qualifier octet packs the naming family into bits 7-6, the
//! kernel and sub-component bits into bits 5 and 4, and the component type
//! nibble into bits 3-0.

use super::attributes::{ietf, tcg, Attribute, ErrorInfo};
use super::entities::{
    Aik, AikKind, ComponentEvidence, ComponentQualifier, ComponentType, DhGroupSet,
    EvidenceFinalFlags, EvidenceRequestFlags, EvidenceValidation, FileMeasurementEntry,
    FileMeasurements, FileMetadata, FileMetadataEntry, FileType, FunctionalComponentName,
    MeasAlgorithmSet, PcrTransform, ProtoCaps, MEASUREMENT_TIME_LEN, PEN_IETF, PEN_TCG,
};
use super::errors::{PtsErrorCode, WireError};

const FLAG_DIRECTORY: u8 = 1 << 7;
const FLAG_PCR_INFO: u8 = 1 << 7;
const QUAL_KERNEL: u8 = 1 << 5;
const QUAL_SUB_COMPONENT: u8 = 1 << 4;

// =============================================================================
// WRITER
// =============================================================================

/// Growable big-endian byte writer.
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Writer {
        Writer { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Low 24 bits, big-endian.
    fn u24(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn chunk16(&mut self, v: &[u8]) {
        debug_assert!(v.len() <= usize::from(u16::MAX));
        self.u16(v.len() as u16);
        self.bytes(v);
    }

    fn chunk32(&mut self, v: &[u8]) {
        debug_assert!(v.len() <= u32::MAX as usize);
        self.u32(v.len() as u32);
        self.bytes(v);
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// =============================================================================
// READER
// =============================================================================

/// Cursor over an attribute value.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<u32, WireError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, WireError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn chunk16(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.u16()?;
        self.take(usize::from(len))
    }

    fn chunk32(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.u32()?;
        self.take(len as usize)
    }

    /// Consumes everything up to the end of the value.
    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    fn utf8(bytes: &[u8]) -> Result<String, WireError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidString)
    }

    fn expect_end(&self) -> Result<(), WireError> {
        if self.remaining() != 0 {
            return Err(WireError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}

// =============================================================================
// QUALIFIER OCTET
// =============================================================================

fn pack_qualifier(family: u8, qualifier: &ComponentQualifier) -> u8 {
    let mut octet = (family & 0b11) << 6;
    if qualifier.kernel {
        octet |= QUAL_KERNEL;
    }
    if qualifier.sub_component {
        octet |= QUAL_SUB_COMPONENT;
    }
    octet | qualifier.component_type.nibble()
}

fn unpack_qualifier(octet: u8) -> (u8, ComponentQualifier) {
    let family = (octet >> 6) & 0b11;
    let qualifier = ComponentQualifier {
        kernel: octet & QUAL_KERNEL != 0,
        sub_component: octet & QUAL_SUB_COMPONENT != 0,
        component_type: ComponentType::from_nibble(octet & 0x0F),
    };
    (family, qualifier)
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes the value portion of an attribute.
pub fn encode(attr: &Attribute) -> Vec<u8> {
    let mut w = Writer::new();
    match attr {
        Attribute::ProtoCaps { flags, .. } => {
            w.u16(0);
            w.u16(flags.bits());
        }
        Attribute::MeasurementAlgorithms { set, .. } => {
            w.u16(0);
            w.u16(set.bits());
        }
        Attribute::DhNonceParamsReq {
            min_nonce_len,
            dh_groups,
        } => {
            w.u8(0);
            w.u16(*min_nonce_len);
            w.u16(dh_groups.bits());
        }
        Attribute::DhNonceParamsResp {
            selected_group,
            hash_algorithms,
            responder_nonce,
            responder_value,
        } => {
            w.u8(0);
            w.u16(selected_group.bit());
            w.u16(hash_algorithms.bits());
            w.chunk16(responder_nonce);
            w.bytes(responder_value);
        }
        Attribute::DhNonceFinish {
            hash_algorithm,
            initiator_value,
            initiator_nonce,
        } => {
            w.u8(0);
            w.u16(hash_algorithm.bit());
            w.chunk16(initiator_value);
            w.bytes(initiator_nonce);
        }
        Attribute::GetTpmVersionInfo | Attribute::GetAik | Attribute::GenAttestEvid => {}
        Attribute::TpmVersionInfo { version_info } => {
            w.bytes(version_info);
        }
        Attribute::Aik { aik } => {
            w.u8(aik.kind.code());
            w.bytes(&aik.blob);
        }
        Attribute::ReqFunctCompEvid {
            flags,
            sub_component_depth,
            vendor_id,
            family,
            qualifier,
            name,
        } => {
            w.u8(flags.bits());
            w.u32(*sub_component_depth);
            w.u24(*vendor_id);
            w.u8(pack_qualifier(*family, qualifier));
            w.u32(name.code());
        }
        Attribute::SimpleCompEvid { evidence } => {
            let mut flags = evidence.validation.bits();
            if evidence.pcr_info_included {
                flags |= FLAG_PCR_INFO;
            }
            w.u8(flags);
            w.u32(evidence.sub_component_depth);
            w.u24(evidence.vendor_id);
            w.u8(pack_qualifier(0, &evidence.qualifier));
            w.u32(evidence.name.code());
            w.u32(evidence.extended_pcr);
            w.u16(evidence.hash_algorithm.bit());
            w.u8(evidence.transformation.code());
            debug_assert_eq!(evidence.measurement_time.len(), MEASUREMENT_TIME_LEN);
            w.bytes(evidence.measurement_time.as_bytes());
            w.chunk16(evidence.policy_uri.as_bytes());
            w.chunk16(&evidence.measurement);
            if evidence.pcr_info_included {
                w.chunk16(&evidence.pcr_before);
                w.chunk16(&evidence.pcr_after);
            }
        }
        Attribute::SimpleEvidFinal {
            flags,
            pcr_composite,
            quote_signature,
            version_info,
        } => {
            w.u8(flags.bits());
            w.u8(0);
            w.chunk32(pcr_composite);
            w.chunk32(quote_signature);
            w.chunk16(version_info);
        }
        Attribute::ReqFileMeta {
            directory,
            delimiter,
            path,
        } => {
            w.u8(if *directory { FLAG_DIRECTORY } else { 0 });
            w.u8(*delimiter);
            w.u16(0);
            w.bytes(path.as_bytes());
        }
        Attribute::UnixFileMeta { metadata } => {
            w.u64(metadata.entries.len() as u64);
            for entry in &metadata.entries {
                w.chunk16(entry.filename.as_bytes());
                w.u8(entry.kind.code());
                w.u64(entry.size);
                w.u64(entry.created);
                w.u64(entry.modified);
                w.u64(entry.accessed);
                w.u64(entry.owner);
                w.u64(entry.group);
            }
        }
        Attribute::ReqFileMeas {
            directory,
            request_id,
            delimiter,
            path,
        } => {
            w.u8(if *directory { FLAG_DIRECTORY } else { 0 });
            w.u8(*delimiter);
            w.u16(*request_id);
            w.bytes(path.as_bytes());
        }
        Attribute::FileMeas { measurements } => {
            let meas_len = measurements
                .entries
                .first()
                .map(|e| e.measurement.len())
                .unwrap_or(0);
            w.u64(measurements.entries.len() as u64);
            w.u16(measurements.request_id);
            w.u16(meas_len as u16);
            for entry in &measurements.entries {
                w.bytes(&entry.measurement);
                w.chunk16(entry.filename.as_bytes());
            }
        }
        Attribute::PaTncError {
            vendor_id,
            code,
            info,
        } => {
            w.u8(0);
            w.u24(*vendor_id);
            w.u32(code.code());
            match info {
                ErrorInfo::HashAlgorithms(set) => {
                    w.u16(0);
                    w.u16(set.bits());
                }
                ErrorInfo::DhGroups(set) => {
                    w.u16(0);
                    w.u16(set.bits());
                }
                ErrorInfo::NonceLimits { min, max } => {
                    w.u16(*min);
                    w.u16(*max);
                }
                ErrorInfo::Attribute(value) => {
                    w.bytes(value);
                }
            }
        }
        Attribute::Unknown { value, .. } => {
            w.bytes(value);
        }
    }
    w.finish()
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes the value portion of an attribute identified by vendor and type.
///
/// Types this responder does not model decode into [`Attribute::Unknown`]
/// so the dispatcher can log and skip them without failing the transport.
pub fn decode(vendor_id: u32, tag: u32, value: &[u8]) -> Result<Attribute, WireError> {
    let mut r = Reader::new(value);
    let attr = match (vendor_id, tag) {
        (PEN_TCG, tcg::REQ_PROTO_CAPS) | (PEN_TCG, tcg::PROTO_CAPS) => {
            r.u16()?;
            let flags = ProtoCaps::from_bits(r.u16()?);
            r.expect_end()?;
            Attribute::ProtoCaps {
                flags,
                request: tag == tcg::REQ_PROTO_CAPS,
            }
        }
        (PEN_TCG, tcg::MEAS_ALGO) | (PEN_TCG, tcg::MEAS_ALGO_SELECTION) => {
            r.u16()?;
            let set = MeasAlgorithmSet::from_bits(r.u16()?);
            r.expect_end()?;
            Attribute::MeasurementAlgorithms {
                set,
                selection: tag == tcg::MEAS_ALGO_SELECTION,
            }
        }
        (PEN_TCG, tcg::DH_NONCE_PARAMS_REQ) => {
            r.u8()?;
            let min_nonce_len = r.u16()?;
            let dh_groups = DhGroupSet::from_bits(r.u16()?);
            r.expect_end()?;
            Attribute::DhNonceParamsReq {
                min_nonce_len,
                dh_groups,
            }
        }
        (PEN_TCG, tcg::DH_NONCE_PARAMS_RESP) => {
            r.u8()?;
            let group_bits = r.u16()?;
            let selected_group = DhGroupSet::from_bits(group_bits)
                .single()
                .ok_or(WireError::InvalidDhGroup(group_bits))?;
            let hash_algorithms = MeasAlgorithmSet::from_bits(r.u16()?);
            let responder_nonce = r.chunk16()?.to_vec();
            let responder_value = r.rest().to_vec();
            Attribute::DhNonceParamsResp {
                selected_group,
                hash_algorithms,
                responder_nonce,
                responder_value,
            }
        }
        (PEN_TCG, tcg::DH_NONCE_FINISH) => {
            r.u8()?;
            let algo_bits = r.u16()?;
            let hash_algorithm = MeasAlgorithmSet::from_bits(algo_bits)
                .single()
                .ok_or(WireError::InvalidAlgorithm(algo_bits))?;
            let initiator_value = r.chunk16()?.to_vec();
            let initiator_nonce = r.rest().to_vec();
            Attribute::DhNonceFinish {
                hash_algorithm,
                initiator_value,
                initiator_nonce,
            }
        }
        (PEN_TCG, tcg::GET_TPM_VERSION_INFO) => {
            r.expect_end()?;
            Attribute::GetTpmVersionInfo
        }
        (PEN_TCG, tcg::TPM_VERSION_INFO) => Attribute::TpmVersionInfo {
            version_info: r.rest().to_vec(),
        },
        (PEN_TCG, tcg::GET_AIK) => {
            r.expect_end()?;
            Attribute::GetAik
        }
        (PEN_TCG, tcg::AIK) => {
            let kind = AikKind::from_code(r.u8()?);
            let blob = r.rest().to_vec();
            Attribute::Aik {
                aik: Aik { kind, blob },
            }
        }
        (PEN_TCG, tcg::REQ_FUNCT_COMP_EVID) => {
            let flags = EvidenceRequestFlags::from_bits(r.u8()?);
            let sub_component_depth = r.u32()?;
            let vendor = r.u24()?;
            let (family, qualifier) = unpack_qualifier(r.u8()?);
            let name = FunctionalComponentName::from_code(r.u32()?);
            r.expect_end()?;
            Attribute::ReqFunctCompEvid {
                flags,
                sub_component_depth,
                vendor_id: vendor,
                family,
                qualifier,
                name,
            }
        }
        (PEN_TCG, tcg::GEN_ATTEST_EVID) => {
            r.expect_end()?;
            Attribute::GenAttestEvid
        }
        (PEN_TCG, tcg::SIMPLE_COMP_EVID) => {
            let flags = r.u8()?;
            let pcr_info_included = flags & FLAG_PCR_INFO != 0;
            let validation = EvidenceValidation::from_bits(flags);
            let sub_component_depth = r.u32()?;
            let vendor = r.u24()?;
            let (_, qualifier) = unpack_qualifier(r.u8()?);
            let name = FunctionalComponentName::from_code(r.u32()?);
            let extended_pcr = r.u32()?;
            let algo_bits = r.u16()?;
            let hash_algorithm = MeasAlgorithmSet::from_bits(algo_bits)
                .single()
                .ok_or(WireError::InvalidAlgorithm(algo_bits))?;
            let transformation = PcrTransform::from_code(r.u8()?);
            let time_bytes = r.take(MEASUREMENT_TIME_LEN)?;
            let measurement_time = Reader::utf8(time_bytes)?;
            let policy_uri = Reader::utf8(r.chunk16()?)?;
            let measurement = r.chunk16()?.to_vec();
            let (pcr_before, pcr_after) = if pcr_info_included {
                (r.chunk16()?.to_vec(), r.chunk16()?.to_vec())
            } else {
                (Vec::new(), Vec::new())
            };
            r.expect_end()?;
            Attribute::SimpleCompEvid {
                evidence: ComponentEvidence {
                    pcr_info_included,
                    validation,
                    sub_component_depth,
                    vendor_id: vendor,
                    qualifier,
                    name,
                    extended_pcr,
                    hash_algorithm,
                    transformation,
                    measurement_time,
                    measurement,
                    policy_uri,
                    pcr_before,
                    pcr_after,
                },
            }
        }
        (PEN_TCG, tcg::SIMPLE_EVID_FINAL) => {
            let flags = EvidenceFinalFlags::from_bits(r.u8()?);
            r.u8()?;
            let pcr_composite = r.chunk32()?.to_vec();
            let quote_signature = r.chunk32()?.to_vec();
            let version_info = r.chunk16()?.to_vec();
            r.expect_end()?;
            Attribute::SimpleEvidFinal {
                flags,
                pcr_composite,
                quote_signature,
                version_info,
            }
        }
        (PEN_TCG, tcg::REQ_FILE_META) => {
            let flags = r.u8()?;
            let delimiter = r.u8()?;
            r.u16()?;
            let path = Reader::utf8(r.rest())?;
            Attribute::ReqFileMeta {
                directory: flags & FLAG_DIRECTORY != 0,
                delimiter,
                path,
            }
        }
        (PEN_TCG, tcg::UNIX_FILE_META) => {
            let count = r.u64()?;
            let mut entries = Vec::new();
            for _ in 0..count {
                let filename = Reader::utf8(r.chunk16()?)?;
                let kind = FileType::from_code(r.u8()?);
                entries.push(FileMetadataEntry {
                    filename,
                    kind,
                    size: r.u64()?,
                    created: r.u64()?,
                    modified: r.u64()?,
                    accessed: r.u64()?,
                    owner: r.u64()?,
                    group: r.u64()?,
                });
            }
            r.expect_end()?;
            Attribute::UnixFileMeta {
                metadata: FileMetadata { entries },
            }
        }
        (PEN_TCG, tcg::REQ_FILE_MEAS) => {
            let flags = r.u8()?;
            let delimiter = r.u8()?;
            let request_id = r.u16()?;
            let path = Reader::utf8(r.rest())?;
            Attribute::ReqFileMeas {
                directory: flags & FLAG_DIRECTORY != 0,
                request_id,
                delimiter,
                path,
            }
        }
        (PEN_TCG, tcg::FILE_MEAS) => {
            let count = r.u64()?;
            let request_id = r.u16()?;
            let meas_len = usize::from(r.u16()?);
            let mut entries = Vec::new();
            for _ in 0..count {
                let measurement = r.take(meas_len)?.to_vec();
                let filename = Reader::utf8(r.chunk16()?)?;
                entries.push(FileMeasurementEntry {
                    filename,
                    measurement,
                });
            }
            r.expect_end()?;
            Attribute::FileMeas {
                measurements: FileMeasurements {
                    request_id,
                    entries,
                },
            }
        }
        (PEN_IETF, ietf::PA_TNC_ERROR) => {
            r.u8()?;
            let error_vendor = r.u24()?;
            let raw_code = r.u32()?;
            let code =
                PtsErrorCode::from_code(raw_code).ok_or(WireError::UnknownErrorCode(raw_code))?;
            let info = match code {
                PtsErrorCode::HashAlgorithmNotSupported => {
                    r.u16()?;
                    ErrorInfo::HashAlgorithms(MeasAlgorithmSet::from_bits(r.u16()?))
                }
                PtsErrorCode::DhGroupNotSupported => {
                    r.u16()?;
                    ErrorInfo::DhGroups(DhGroupSet::from_bits(r.u16()?))
                }
                PtsErrorCode::DhNonceLengthInvalid => ErrorInfo::NonceLimits {
                    min: r.u16()?,
                    max: r.u16()?,
                },
                _ => ErrorInfo::Attribute(r.rest().to_vec()),
            };
            r.expect_end()?;
            Attribute::PaTncError {
                vendor_id: error_vendor,
                code,
                info,
            }
        }
        _ => Attribute::Unknown {
            vendor_id,
            tag,
            value: value.to_vec(),
        },
    };
    Ok(attr)
}

// =============================================================================
// TESTS
// =============================================================================
