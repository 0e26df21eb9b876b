//! # Full Attestation Conversations
//!
//! Drives the responder through complete verifier conversations:
//!
//! ```text
//! [verifier]                          [responder]
//!   Request Protocol Capabilities ──→   capability intersection
//!   Measurement Algorithm offer   ──→   strongest common algorithm
//!   DH Nonce Parameters Request   ──→   group + nonce + public value
//!   DH Nonce Finish               ──→   shared secret (no reply)
//!   Get TPM Version Info / AIK    ──→   identity material
//!   Request Component Evidence    ──→   measure + extend PCR (buffered)
//!   Generate Attestation Evidence ──→   evidence flush + signed quote
//! ```
//!
//! The conversations run over the byte codec where noted, so the wire
//! layout is exercised along with the handlers.

#[cfg(test)]
mod tests {
    use pts_attestation::domain::wire;
    use pts_attestation::testing::{FixedClock, MockPts};
    use pts_attestation::{
        Aik, AikKind, AttestationConfig, AttestationResponder, AttestationService, Attribute,
        ComponentQualifier, ComponentType, DhGroup, DhGroupSet, EvidenceFinalFlags,
        EvidenceRequestFlags, EvidenceValidation, FunctionalComponentName, MeasAlgorithmSet,
        MeasurementAlgorithm, PcrTransform, ProtoCaps, Session,
    };

    const MEASURED_FILE: &str = "/etc/tnc_config";

    fn supported_algorithms() -> MeasAlgorithmSet {
        MeasAlgorithmSet::of(&[MeasurementAlgorithm::Sha1, MeasurementAlgorithm::Sha256])
    }

    fn supported_groups() -> DhGroupSet {
        DhGroupSet::of(&[DhGroup::Ike2, DhGroup::Ike14, DhGroup::Ike19])
    }

    fn responder(pts: MockPts) -> AttestationService<MockPts, FixedClock> {
        AttestationService::new(
            pts,
            FixedClock::at_unix(1_315_987_401),
            AttestationConfig::default(),
            supported_algorithms(),
            supported_groups(),
        )
    }

    fn bios_request() -> Attribute {
        Attribute::ReqFunctCompEvid {
            flags: EvidenceRequestFlags::NONE,
            sub_component_depth: 0,
            vendor_id: 0x00_5597,
            family: 0,
            qualifier: ComponentQualifier {
                kernel: false,
                sub_component: false,
                component_type: ComponentType::Tnc,
            },
            name: FunctionalComponentName::Bios,
        }
    }

    /// Encodes an attribute, decodes it again, and hands the decoded value
    /// to the responder — one verifier turn over the wire.
    fn turn(
        responder: &mut AttestationService<MockPts, FixedClock>,
        session: &mut Session,
        inbound: &Attribute,
    ) -> Vec<Attribute> {
        let decoded =
            wire::decode(inbound.vendor_id(), inbound.tag(), &wire::encode(inbound)).unwrap();
        assert_eq!(&decoded, inbound);

        let mut output = Vec::new();
        responder.process(session, &decoded, &mut output).unwrap();

        // Every outbound attribute must survive its own codec.
        for attr in &output {
            let round = wire::decode(attr.vendor_id(), attr.tag(), &wire::encode(attr)).unwrap();
            assert_eq!(&round, attr);
        }
        output
    }

    #[test]
    fn test_capability_negotiation() {
        let mut responder = responder(MockPts::new());
        let mut session = Session::new(ProtoCaps::all());

        let output = turn(
            &mut responder,
            &mut session,
            &Attribute::ProtoCaps {
                flags: ProtoCaps::TPM | ProtoCaps::DH_NONCE,
                request: true,
            },
        );

        assert_eq!(session.proto_caps(), ProtoCaps::TPM | ProtoCaps::DH_NONCE);
        assert_eq!(
            output,
            vec![Attribute::ProtoCaps {
                flags: ProtoCaps::TPM | ProtoCaps::DH_NONCE,
                request: false,
            }]
        );
    }

    #[test]
    fn test_algorithm_negotiation_selects_sha256() {
        let mut responder = responder(MockPts::new());
        let mut session = Session::new(ProtoCaps::all());

        let output = turn(
            &mut responder,
            &mut session,
            &Attribute::MeasurementAlgorithms {
                set: MeasAlgorithmSet::of(&[
                    MeasurementAlgorithm::Sha1,
                    MeasurementAlgorithm::Sha256,
                    MeasurementAlgorithm::Sha384,
                ]),
                selection: false,
            },
        );

        assert_eq!(session.meas_algorithm(), Some(MeasurementAlgorithm::Sha256));
        assert_eq!(
            output,
            vec![Attribute::MeasurementAlgorithms {
                set: MeasAlgorithmSet::only(MeasurementAlgorithm::Sha256),
                selection: true,
            }]
        );
    }

    #[test]
    fn test_full_conversation_through_quote() {
        crate::init_tracing();

        let pts = MockPts::new()
            .with_file(MEASURED_FILE, b"tnc_config contents")
            .with_aik(Aik {
                kind: AikKind::PublicKey,
                blob: vec![0x30, 0x59, 0x30, 0x13],
            });
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());

        // Capability and algorithm negotiation.
        turn(
            &mut responder,
            &mut session,
            &Attribute::ProtoCaps {
                flags: ProtoCaps::all(),
                request: true,
            },
        );
        turn(
            &mut responder,
            &mut session,
            &Attribute::MeasurementAlgorithms {
                set: supported_algorithms(),
                selection: false,
            },
        );

        // DH nonce exchange.
        let output = turn(
            &mut responder,
            &mut session,
            &Attribute::DhNonceParamsReq {
                min_nonce_len: 17,
                dh_groups: DhGroupSet::of(&[DhGroup::Ike14, DhGroup::Ike19, DhGroup::Ike20]),
            },
        );
        let responder_nonce = match &output[0] {
            Attribute::DhNonceParamsResp {
                selected_group,
                hash_algorithms,
                responder_nonce,
                responder_value,
            } => {
                assert_eq!(*selected_group, DhGroup::Ike19);
                assert_eq!(*hash_algorithms, supported_algorithms());
                assert!(!responder_value.is_empty());
                responder_nonce.clone()
            }
            other => panic!("unexpected attribute: {other:?}"),
        };
        assert_eq!(responder_nonce.len(), 20);

        let output = turn(
            &mut responder,
            &mut session,
            &Attribute::DhNonceFinish {
                hash_algorithm: MeasurementAlgorithm::Sha256,
                initiator_value: vec![0x42; 64],
                initiator_nonce: vec![0x24; 20],
            },
        );
        assert!(output.is_empty());
        assert!(responder.pts().secret_computed);

        // TPM identity.
        let output = turn(&mut responder, &mut session, &Attribute::GetTpmVersionInfo);
        assert!(matches!(output[0], Attribute::TpmVersionInfo { .. }));
        let output = turn(&mut responder, &mut session, &Attribute::GetAik);
        assert!(matches!(output[0], Attribute::Aik { .. }));

        // Component evidence is buffered, not sent.
        let output = turn(&mut responder, &mut session, &bios_request());
        assert!(output.is_empty());
        assert_eq!(session.evidence_count(), 1);

        // Quote turn flushes the evidence followed by the final attribute.
        let output = turn(&mut responder, &mut session, &Attribute::GenAttestEvid);
        assert_eq!(output.len(), 2);
        match &output[0] {
            Attribute::SimpleCompEvid { evidence } => {
                assert_eq!(evidence.extended_pcr, 16);
                assert_eq!(evidence.hash_algorithm, MeasurementAlgorithm::Sha256);
                assert_eq!(evidence.transformation, PcrTransform::Long);
                assert_eq!(evidence.validation, EvidenceValidation::NotValid);
                assert_eq!(evidence.measurement.len(), 32);
                assert_eq!(evidence.measurement_time.len(), 20);
            }
            other => panic!("unexpected attribute: {other:?}"),
        }
        match &output[1] {
            Attribute::SimpleEvidFinal { flags, .. } => {
                assert_eq!(*flags, EvidenceFinalFlags::TPM_QUOTE_INFO);
            }
            other => panic!("unexpected attribute: {other:?}"),
        }
        assert_eq!(session.evidence_count(), 0);
        assert_eq!(responder.pts().quoted_pcrs, Some(vec![16]));
    }

    #[test]
    fn test_quote_preserves_evidence_insertion_order() {
        let pts = MockPts::new().with_file(MEASURED_FILE, b"tnc_config contents");
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());
        session.set_meas_algorithm(MeasurementAlgorithm::Sha1);

        turn(&mut responder, &mut session, &bios_request());
        turn(&mut responder, &mut session, &bios_request());
        turn(&mut responder, &mut session, &bios_request());
        let output = turn(&mut responder, &mut session, &Attribute::GenAttestEvid);

        // All evidence first, in order, then exactly one final attribute.
        assert_eq!(output.len(), 4);
        let mut previous_after: Option<Vec<u8>> = None;
        for attr in &output[..3] {
            match attr {
                Attribute::SimpleCompEvid { evidence } => {
                    if let Some(prev) = previous_after.take() {
                        // Each extend starts from the PCR the previous one left.
                        assert_eq!(evidence.pcr_before, prev);
                    }
                    previous_after = Some(evidence.pcr_after.clone());
                }
                other => panic!("unexpected attribute: {other:?}"),
            }
        }
        assert!(matches!(output[3], Attribute::SimpleEvidFinal { .. }));
        // Duplicate PCR indices are forwarded untouched.
        assert_eq!(responder.pts().quoted_pcrs, Some(vec![16, 16, 16]));
        assert_eq!(session.evidence_count(), 0);
    }

    #[test]
    fn test_file_requests_over_the_wire() {
        let pts = MockPts::new().with_file("/etc/hostname", b"gateway\n");
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());

        let output = turn(
            &mut responder,
            &mut session,
            &Attribute::ReqFileMeas {
                directory: false,
                request_id: 811,
                delimiter: b'/',
                path: "/etc/hostname".to_string(),
            },
        );

        match &output[0] {
            Attribute::FileMeas { measurements } => {
                assert_eq!(measurements.request_id, 811);
                assert_eq!(measurements.entries.len(), 1);
                assert_eq!(measurements.entries[0].filename, "/etc/hostname");
            }
            other => panic!("unexpected attribute: {other:?}"),
        }
        assert!(output[0].noskip());
    }
}
