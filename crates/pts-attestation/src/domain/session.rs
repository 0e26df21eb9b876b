//! Per-session attestation state.
//!
//! One [`Session`] exists per verifier conversation and is threaded
//! explicitly through the dispatcher. It holds the negotiated protocol
//! state and the evidence buffered between protocol turns.
//!
//! State machine:
//!
//! ```text
//! [caps: supported] ──capability exchange──→ [caps: intersection]
//! [algorithm: unset] ──algorithm offer──→ [algorithm: selected]
//! [evidence: empty] ──component requests──→ [evidence: buffered]
//!                                     └──quote──→ [evidence: empty]
//! ```
//!
//! INVARIANT-1: the negotiated capability set is always a subset of the
//! locally supported set the session started with.
//! INVARIANT-2: buffered evidence leaves the session only by move, either
//! into the output list at quote time or by dropping the session.

use super::entities::{ComponentEvidence, MeasurementAlgorithm, ProtoCaps};

/// State of a single attestation session.
#[derive(Clone, Debug)]
pub struct Session {
    proto_caps: ProtoCaps,
    meas_algorithm: Option<MeasurementAlgorithm>,
    dh_hash_algorithm: Option<MeasurementAlgorithm>,
    evidence: Vec<ComponentEvidence>,
}

impl Session {
    /// Creates a session advertising the locally supported capabilities.
    pub fn new(supported_caps: ProtoCaps) -> Session {
        Session {
            proto_caps: supported_caps,
            meas_algorithm: None,
            dh_hash_algorithm: None,
            evidence: Vec::new(),
        }
    }

    /// Capabilities: the supported set before negotiation, the negotiated
    /// intersection afterwards.
    pub fn proto_caps(&self) -> ProtoCaps {
        self.proto_caps
    }

    /// Intersects the verifier's offer with the current capability set and
    /// stores the result. Returns the negotiated set.
    pub fn negotiate_caps(&mut self, verifier_caps: ProtoCaps) -> ProtoCaps {
        self.proto_caps = self.proto_caps & verifier_caps;
        self.proto_caps
    }

    pub fn meas_algorithm(&self) -> Option<MeasurementAlgorithm> {
        self.meas_algorithm
    }

    pub fn set_meas_algorithm(&mut self, algorithm: MeasurementAlgorithm) {
        self.meas_algorithm = Some(algorithm);
    }

    pub fn dh_hash_algorithm(&self) -> Option<MeasurementAlgorithm> {
        self.dh_hash_algorithm
    }

    pub fn set_dh_hash_algorithm(&mut self, algorithm: MeasurementAlgorithm) {
        self.dh_hash_algorithm = Some(algorithm);
    }

    /// Appends component evidence awaiting the next quote turn.
    pub fn buffer_evidence(&mut self, evidence: ComponentEvidence) {
        self.evidence.push(evidence);
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }

    /// Moves all buffered evidence out of the session, in insertion order.
    pub fn drain_evidence(&mut self) -> Vec<ComponentEvidence> {
        std::mem::take(&mut self.evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        ComponentQualifier, ComponentType, EvidenceValidation, FunctionalComponentName,
        PcrTransform, PEN_TCG,
    };

    fn sample_evidence(pcr: u32) -> ComponentEvidence {
        ComponentEvidence {
            pcr_info_included: true,
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
            hash_algorithm: MeasurementAlgorithm::Sha256,
            transformation: PcrTransform::Long,
            measurement_time: "2011-09-14T08:03:21Z".to_string(),
            measurement: vec![0xAB; 32],
            policy_uri: String::new(),
            pcr_before: vec![0x00; 32],
            pcr_after: vec![0x11; 32],
        }
    }

    #[test]
    fn test_negotiation_intersects_with_supported_set() {
        let mut session = Session::new(ProtoCaps::TPM | ProtoCaps::DH_NONCE);

        let negotiated = session.negotiate_caps(ProtoCaps::TPM | ProtoCaps::VERIFICATION);

        assert_eq!(negotiated, ProtoCaps::TPM);
        assert_eq!(session.proto_caps(), ProtoCaps::TPM);
    }

    #[test]
    fn test_repeated_negotiation_can_only_shrink() {
        let mut session = Session::new(ProtoCaps::all());
        session.negotiate_caps(ProtoCaps::TPM | ProtoCaps::CURRENT_EVIDENCE);
        session.negotiate_caps(ProtoCaps::all());

        assert_eq!(
            session.proto_caps(),
            ProtoCaps::TPM | ProtoCaps::CURRENT_EVIDENCE
        );
    }

    #[test]
    fn test_evidence_drains_in_insertion_order() {
        let mut session = Session::new(ProtoCaps::all());
        session.buffer_evidence(sample_evidence(16));
        session.buffer_evidence(sample_evidence(17));
        assert_eq!(session.evidence_count(), 2);

        let drained = session.drain_evidence();

        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].extended_pcr, 16);
        assert_eq!(drained[1].extended_pcr, 17);
        assert_eq!(session.evidence_count(), 0);
    }

    #[test]
    fn test_new_session_has_no_negotiated_algorithms() {
        let session = Session::new(ProtoCaps::all());
        assert_eq!(session.meas_algorithm(), None);
        assert_eq!(session.dh_hash_algorithm(), None);
    }
}
