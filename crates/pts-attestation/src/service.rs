//! Attestation responder service.
//!
//! Application service that implements the [`AttestationResponder`] inbound
//! port: one call per inbound attribute, dispatched by attribute type to a
//! handler that reads the session, drives the PTS capability, and appends
//! outbound attributes.
//!
//! Two error channels leave this module (never mixed):
//! - recoverable protocol violations are answered with a PA-TNC error
//!   attribute on the output list and `Ok(())`;
//! - fatal conditions (failed crypto, failed TPM or file access) abort the
//!   session through `Err(SessionError)`.
//!
//! Attribute types the responder never handles — verifier-side attributes,
//! measurement logs, reference manifests, registry values — are logged and
//! skipped without output.

use tracing::{debug, info, warn};

use crate::domain::entities::{
    ComponentQualifier, ComponentType, EvidenceFinalFlags, EvidenceRequestFlags,
    EvidenceValidation, MEASUREMENT_TIME_ZERO, PEN_TCG, PTS_MIN_NONCE_LEN,
};
use crate::domain::{negotiation, wire};
use crate::domain::{
    AttestationConfig, Attribute, ComponentEvidence, DhGroupSet, FunctionalComponentName,
    MeasAlgorithmSet, MeasurementAlgorithm, PcrTransform, ProtoCaps, PtsErrorCode, Session,
    SessionError,
};
use crate::ports::inbound::AttestationResponder;
use crate::ports::outbound::{Clock, PathValidation, PtsCapability};

/// The attestation responder state machine.
///
/// Generic over the driven ports; one instance serves one session at a
/// time, synchronously. The supported algorithm and DH-group sets are the
/// responder's negotiation policy and never change at run time.
pub struct AttestationService<P, C> {
    pts: P,
    clock: C,
    config: AttestationConfig,
    supported_algorithms: MeasAlgorithmSet,
    supported_dh_groups: DhGroupSet,
}

impl<P: PtsCapability, C: Clock> AttestationService<P, C> {
    pub fn new(
        pts: P,
        clock: C,
        config: AttestationConfig,
        supported_algorithms: MeasAlgorithmSet,
        supported_dh_groups: DhGroupSet,
    ) -> AttestationService<P, C> {
        AttestationService {
            pts,
            clock,
            config,
            supported_algorithms,
            supported_dh_groups,
        }
    }

    /// The underlying PTS capability.
    pub fn pts(&self) -> &P {
        &self.pts
    }

    // =========================================================================
    // CAPABILITY AND ALGORITHM NEGOTIATION
    // =========================================================================

    fn handle_proto_caps_request(
        &mut self,
        session: &mut Session,
        verifier_caps: ProtoCaps,
        output: &mut Vec<Attribute>,
    ) {
        let negotiated = session.negotiate_caps(verifier_caps);
        debug!(
            "negotiated protocol capabilities {:#06x}",
            negotiated.bits()
        );
        output.push(Attribute::ProtoCaps {
            flags: negotiated,
            request: false,
        });
    }

    fn handle_meas_algo_offer(
        &mut self,
        session: &mut Session,
        offered: MeasAlgorithmSet,
        output: &mut Vec<Attribute>,
    ) {
        match negotiation::select_measurement_algorithm(self.supported_algorithms, offered) {
            Some(algorithm) => {
                debug!("selected measurement algorithm {algorithm}");
                session.set_meas_algorithm(algorithm);
                output.push(Attribute::MeasurementAlgorithms {
                    set: MeasAlgorithmSet::only(algorithm),
                    selection: true,
                });
            }
            None => {
                warn!(
                    "no measurement algorithm in common with the verifier (offered {:#06x})",
                    offered.bits()
                );
                output.push(Attribute::hash_algorithm_error(self.supported_algorithms));
            }
        }
    }

    // =========================================================================
    // DH NONCE EXCHANGE
    // =========================================================================

    fn handle_dh_nonce_params_req(
        &mut self,
        min_nonce_len: u16,
        offered_groups: DhGroupSet,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError> {
        let nonce_len = self.config.nonce_len;
        if nonce_len < PTS_MIN_NONCE_LEN
            || (min_nonce_len > 0 && nonce_len < usize::from(min_nonce_len))
        {
            warn!(
                "configured nonce length {nonce_len} cannot satisfy the verifier \
                 minimum of {min_nonce_len}"
            );
            output.push(Attribute::dh_nonce_error(nonce_len as u16));
            return Ok(());
        }

        let Some(group) = negotiation::select_dh_group(self.supported_dh_groups, offered_groups)
        else {
            warn!(
                "no DH group in common with the verifier (offered {:#06x})",
                offered_groups.bits()
            );
            output.push(Attribute::dh_group_error(self.supported_dh_groups));
            return Ok(());
        };

        debug!("selected DH group {group}, nonce length {nonce_len}");
        self.pts
            .create_dh_nonce(group, nonce_len)
            .map_err(|e| SessionError::DhNonceGeneration(e.to_string()))?;
        let (responder_value, responder_nonce) = self
            .pts
            .my_public_value()
            .map_err(|e| SessionError::DhNonceGeneration(e.to_string()))?;

        output.push(Attribute::DhNonceParamsResp {
            selected_group: group,
            hash_algorithms: self.supported_algorithms,
            responder_nonce,
            responder_value,
        });
        Ok(())
    }

    fn handle_dh_nonce_finish(
        &mut self,
        session: &mut Session,
        hash_algorithm: MeasurementAlgorithm,
        initiator_value: &[u8],
        initiator_nonce: &[u8],
    ) -> Result<(), SessionError> {
        if !self.supported_algorithms.contains(hash_algorithm) {
            warn!("verifier selected unsupported DH hash algorithm {hash_algorithm}");
            return Err(SessionError::UnsupportedDhHash(hash_algorithm.bit()));
        }
        session.set_dh_hash_algorithm(hash_algorithm);
        self.pts.set_dh_hash_algorithm(hash_algorithm);

        if initiator_nonce.len() != self.config.nonce_len {
            warn!("initiator and responder DH nonces have differing lengths");
            return Err(SessionError::NonceLengthMismatch {
                initiator: initiator_nonce.len(),
                responder: self.config.nonce_len,
            });
        }

        self.pts.set_peer_public_value(initiator_value, initiator_nonce);
        self.pts
            .calculate_secret()
            .map_err(|e| SessionError::SecretComputation(e.to_string()))?;
        Ok(())
    }

    // =========================================================================
    // TPM IDENTITY
    // =========================================================================

    fn handle_get_tpm_version_info(&mut self, attribute: &Attribute, output: &mut Vec<Attribute>) {
        match self.pts.tpm_version_info() {
            Ok(version_info) => output.push(Attribute::TpmVersionInfo { version_info }),
            Err(e) => {
                warn!("TPM version information unavailable: {e}");
                output.push(Attribute::pts_error(
                    PtsErrorCode::TpmVersionNotSupported,
                    wire::encode(attribute),
                ));
            }
        }
    }

    fn handle_get_aik(&mut self, output: &mut Vec<Attribute>) {
        match self.pts.aik() {
            Some(aik) => output.push(Attribute::Aik { aik }),
            None => warn!("no AIK certificate or public key available"),
        }
    }

    // =========================================================================
    // COMPONENT EVIDENCE
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    fn handle_req_funct_comp_evid(
        &mut self,
        session: &mut Session,
        attribute: &Attribute,
        flags: EvidenceRequestFlags,
        sub_component_depth: u32,
        vendor_id: u32,
        family: u8,
        qualifier: ComponentQualifier,
        name: FunctionalComponentName,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError> {
        let caps = session.proto_caps();

        if flags.contains(EvidenceRequestFlags::TTC) {
            output.push(Attribute::pts_error(
                PtsErrorCode::UnableToDetermineTtc,
                wire::encode(attribute),
            ));
            return Ok(());
        }
        if flags.contains(EvidenceRequestFlags::VER)
            && !caps.contains(ProtoCaps::VERIFICATION)
        {
            output.push(Attribute::pts_error(
                PtsErrorCode::UnableToPerformLocalValidation,
                wire::encode(attribute),
            ));
            return Ok(());
        }
        if flags.contains(EvidenceRequestFlags::CURR)
            && !caps.contains(ProtoCaps::CURRENT_EVIDENCE)
        {
            output.push(Attribute::pts_error(
                PtsErrorCode::UnableToRetrieveCurrentEvidence,
                wire::encode(attribute),
            ));
            return Ok(());
        }
        if flags.contains(EvidenceRequestFlags::PCR) && !caps.contains(ProtoCaps::TPM) {
            output.push(Attribute::pts_error(
                PtsErrorCode::UnableToDeterminePcr,
                wire::encode(attribute),
            ));
            return Ok(());
        }

        if sub_component_depth != 0 {
            warn!(
                "sub-component measurements deeper than zero are not supported \
                 (requested depth {sub_component_depth}), measuring the top-level \
                 component only"
            );
        }

        if vendor_id != PEN_TCG {
            debug!(
                "only functional component namings by TCG are supported, \
                 ignoring vendor {vendor_id}"
            );
            return Ok(());
        }

        if family != 0 {
            output.push(Attribute::pts_error(
                PtsErrorCode::InvalidNameFamily,
                wire::encode(attribute),
            ));
            return Ok(());
        }

        if qualifier.is_wildcard() {
            debug!("wildcard qualifier set, identifying the component by name");
        } else if qualifier.is_unknown() {
            debug!("unknown qualifier set, identifying the component by name");
        }

        match name {
            FunctionalComponentName::Bios => self.measure_reference_component(session),
            other => {
                debug!("unsupported functional component name: {other}");
                Ok(())
            }
        }
    }

    /// Measures the configured reference file and extends it into the
    /// configured PCR, buffering the evidence for the next quote turn.
    ///
    /// Stands in for true BIOS measurement, which needs firmware support.
    fn measure_reference_component(
        &mut self,
        session: &mut Session,
    ) -> Result<(), SessionError> {
        let algorithm = session
            .meas_algorithm()
            .ok_or(SessionError::AlgorithmNotNegotiated)?;
        let pcr = self.config.extend_pcr;
        info!(
            "extending PCR {pcr} with {} ({algorithm})",
            self.config.measurement_path
        );

        let pcr_info_included = true;
        let transformation = PcrTransform::derive(pcr_info_included, algorithm);

        let mut hasher = algorithm
            .hasher()
            .ok_or(SessionError::HasherUnavailable(algorithm))?;
        let measurement = self
            .pts
            .hash_file(hasher.as_mut(), &self.config.measurement_path)
            .map_err(|e| SessionError::FileHash(e.to_string()))?;

        let measurement_time = self.measurement_timestamp();

        let pcr_before = self
            .pts
            .read_pcr(pcr)
            .map_err(|e| SessionError::PcrRead(pcr, e.to_string()))?;
        let pcr_after = self
            .pts
            .extend_pcr(pcr, &measurement)
            .map_err(|e| SessionError::PcrExtend(pcr, e.to_string()))?;

        session.buffer_evidence(ComponentEvidence {
            pcr_info_included,
            validation: EvidenceValidation::NotValid,
            sub_component_depth: 0,
            vendor_id: PEN_TCG,
            qualifier: ComponentQualifier {
                kernel: false,
                sub_component: false,
                component_type: ComponentType::Tnc,
            },
            name: FunctionalComponentName::Bios,
            extended_pcr: pcr,
            hash_algorithm: algorithm,
            transformation,
            measurement_time,
            measurement,
            policy_uri: String::new(),
            pcr_before,
            pcr_after,
        });
        Ok(())
    }

    /// UTC timestamp of exactly 20 octets; the zero timestamp when no wall
    /// clock is available.
    fn measurement_timestamp(&self) -> String {
        match self.clock.now() {
            Some(now) => now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            None => MEASUREMENT_TIME_ZERO.to_string(),
        }
    }

    // =========================================================================
    // QUOTE GENERATION
    // =========================================================================

    fn handle_gen_attest_evid(
        &mut self,
        session: &mut Session,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError> {
        let evidences = session.drain_evidence();
        debug!("flushing {} buffered evidence attribute(s)", evidences.len());

        // Duplicated PCR numbers are harmless, the quote deduplicates them.
        let mut pcrs = Vec::with_capacity(evidences.len());
        for evidence in evidences {
            pcrs.push(evidence.extended_pcr);
            output.push(Attribute::SimpleCompEvid { evidence });
        }

        let quote = self
            .pts
            .quote_tpm(&pcrs)
            .map_err(|e| SessionError::TpmQuote(e.to_string()))?;

        output.push(Attribute::SimpleEvidFinal {
            flags: EvidenceFinalFlags::TPM_QUOTE_INFO,
            pcr_composite: quote.pcr_composite,
            quote_signature: quote.signature,
            version_info: Vec::new(),
        });
        Ok(())
    }

    // =========================================================================
    // FILE METADATA AND MEASUREMENTS
    // =========================================================================

    /// Shared path and delimiter validation for the file request handlers.
    /// Returns `false` when the request was already answered (with an error
    /// attribute or silence) and the handler must stop.
    fn check_path(
        &mut self,
        attribute: &Attribute,
        path: &str,
        delimiter: u8,
        output: &mut Vec<Attribute>,
    ) -> bool {
        match self.pts.is_path_valid(path) {
            PathValidation::Error(code) => {
                output.push(Attribute::pts_error(code, wire::encode(attribute)));
                return false;
            }
            PathValidation::Invalid => {
                debug!("path '{path}' rejected by PTS validation, ignoring request");
                return false;
            }
            PathValidation::Valid => {}
        }
        if delimiter != b'/' && delimiter != b'\\' {
            output.push(Attribute::pts_error(
                PtsErrorCode::InvalidDelimiter,
                wire::encode(attribute),
            ));
            return false;
        }
        true
    }

    fn handle_req_file_meta(
        &mut self,
        attribute: &Attribute,
        directory: bool,
        delimiter: u8,
        path: &str,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError> {
        if !self.check_path(attribute, path, delimiter, output) {
            return Ok(());
        }
        debug!(
            "metadata request for {} '{path}'",
            if directory { "directory" } else { "file" }
        );
        let metadata = self
            .pts
            .get_metadata(path, directory)
            .map_err(|e| SessionError::Metadata(e.to_string()))?;
        output.push(Attribute::UnixFileMeta { metadata });
        Ok(())
    }

    fn handle_req_file_meas(
        &mut self,
        attribute: &Attribute,
        directory: bool,
        request_id: u16,
        delimiter: u8,
        path: &str,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError> {
        if !self.check_path(attribute, path, delimiter, output) {
            return Ok(());
        }
        debug!(
            "measurement request {request_id} for {} '{path}'",
            if directory { "directory" } else { "file" }
        );
        let measurements = self
            .pts
            .do_measurements(request_id, path, directory)
            .map_err(|e| SessionError::FileMeasurement(e.to_string()))?;
        output.push(Attribute::FileMeas { measurements });
        Ok(())
    }
}

impl<P: PtsCapability, C: Clock> AttestationResponder for AttestationService<P, C> {
    fn process(
        &mut self,
        session: &mut Session,
        attribute: &Attribute,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError> {
        match attribute {
            Attribute::ProtoCaps {
                flags,
                request: true,
            } => {
                self.handle_proto_caps_request(session, *flags, output);
                Ok(())
            }
            Attribute::MeasurementAlgorithms {
                set,
                selection: false,
            } => {
                self.handle_meas_algo_offer(session, *set, output);
                Ok(())
            }
            Attribute::DhNonceParamsReq {
                min_nonce_len,
                dh_groups,
            } => self.handle_dh_nonce_params_req(*min_nonce_len, *dh_groups, output),
            Attribute::DhNonceFinish {
                hash_algorithm,
                initiator_value,
                initiator_nonce,
            } => self.handle_dh_nonce_finish(
                session,
                *hash_algorithm,
                initiator_value,
                initiator_nonce,
            ),
            Attribute::GetTpmVersionInfo => {
                self.handle_get_tpm_version_info(attribute, output);
                Ok(())
            }
            Attribute::GetAik => {
                self.handle_get_aik(output);
                Ok(())
            }
            Attribute::ReqFunctCompEvid {
                flags,
                sub_component_depth,
                vendor_id,
                family,
                qualifier,
                name,
            } => self.handle_req_funct_comp_evid(
                session,
                attribute,
                *flags,
                *sub_component_depth,
                *vendor_id,
                *family,
                *qualifier,
                *name,
                output,
            ),
            Attribute::GenAttestEvid => self.handle_gen_attest_evid(session, output),
            Attribute::ReqFileMeta {
                directory,
                delimiter,
                path,
            } => self.handle_req_file_meta(attribute, *directory, *delimiter, path, output),
            Attribute::ReqFileMeas {
                directory,
                request_id,
                delimiter,
                path,
            } => self.handle_req_file_meas(
                attribute,
                *directory,
                *request_id,
                *delimiter,
                path,
                output,
            ),
            other => {
                // Verifier-side attributes, measurement logs, reference
                // manifests, registry values, and anything unknown.
                debug!("received unsupported attribute '{}'", other.name());
                Ok(())
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
