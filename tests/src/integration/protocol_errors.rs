//! # Protocol Errors and Skips
//!
//! Exercises the three responder outcomes that are not a normal reply:
//!
//! 1. **In-band errors**: one PA-TNC error attribute, no session change,
//!    the dispatcher still reports success
//! 2. **Silent skips**: no output and no session change
//! 3. **Fatal aborts**: `Err(SessionError)` terminating the session

#[cfg(test)]
mod tests {
    use pts_attestation::domain::wire;
    use pts_attestation::testing::{FixedClock, MockPts};
    use pts_attestation::{
        AttestationConfig, AttestationResponder, AttestationService, Attribute,
        ComponentQualifier, ComponentType, DhGroup, DhGroupSet, ErrorInfo, EvidenceRequestFlags,
        FunctionalComponentName, MeasAlgorithmSet, MeasurementAlgorithm, ProtoCaps, PtsErrorCode,
        Session, SessionError,
    };

    fn responder_with(
        pts: MockPts,
        config: AttestationConfig,
        algorithms: MeasAlgorithmSet,
    ) -> AttestationService<MockPts, FixedClock> {
        AttestationService::new(
            pts,
            FixedClock::at_unix(0),
            config,
            algorithms,
            DhGroupSet::of(&[DhGroup::Ike2, DhGroup::Ike14, DhGroup::Ike19]),
        )
    }

    fn responder(pts: MockPts) -> AttestationService<MockPts, FixedClock> {
        responder_with(
            pts,
            AttestationConfig::default(),
            MeasAlgorithmSet::of(&[MeasurementAlgorithm::Sha1, MeasurementAlgorithm::Sha256]),
        )
    }

    #[test]
    fn test_algorithm_mismatch_reports_supported_set() {
        let mut responder = responder_with(
            MockPts::new(),
            AttestationConfig::default(),
            MeasAlgorithmSet::only(MeasurementAlgorithm::Sha256),
        );
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        responder
            .process(
                &mut session,
                &Attribute::MeasurementAlgorithms {
                    set: MeasAlgorithmSet::only(MeasurementAlgorithm::Sha1),
                    selection: false,
                },
                &mut output,
            )
            .unwrap();

        assert_eq!(
            output,
            vec![Attribute::PaTncError {
                vendor_id: 0x00_5597,
                code: PtsErrorCode::HashAlgorithmNotSupported,
                info: ErrorInfo::HashAlgorithms(MeasAlgorithmSet::only(
                    MeasurementAlgorithm::Sha256
                )),
            }]
        );
        // The failed offer leaves the session untouched.
        assert_eq!(session.meas_algorithm(), None);
    }

    #[test]
    fn test_short_configured_nonce_reports_limits() {
        let mut responder = responder_with(
            MockPts::new(),
            AttestationConfig {
                nonce_len: 8,
                ..Default::default()
            },
            MeasAlgorithmSet::only(MeasurementAlgorithm::Sha256),
        );
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        responder
            .process(
                &mut session,
                &Attribute::DhNonceParamsReq {
                    min_nonce_len: 16,
                    dh_groups: DhGroupSet::only(DhGroup::Ike14),
                },
                &mut output,
            )
            .unwrap();

        match &output[0] {
            Attribute::PaTncError { code, info, .. } => {
                assert_eq!(*code, PtsErrorCode::DhNonceLengthInvalid);
                assert_eq!(
                    *info,
                    ErrorInfo::NonceLimits {
                        min: 8,
                        max: 0xFFFF
                    }
                );
            }
            other => panic!("unexpected attribute: {other:?}"),
        }
        // No DH material was generated for the refused exchange.
        assert_eq!(responder.pts().dh_group(), None);
    }

    #[test]
    fn test_bad_delimiter_answers_before_any_file_access() {
        // No metadata is canned: touching the filesystem would abort the
        // session, so a clean in-band error proves the ordering.
        let mut responder = responder(MockPts::new());
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        let request = Attribute::ReqFileMeta {
            directory: false,
            delimiter: b',',
            path: "/etc/hostname".to_string(),
        };
        responder.process(&mut session, &request, &mut output).unwrap();

        assert_eq!(
            output,
            vec![Attribute::pts_error(
                PtsErrorCode::InvalidDelimiter,
                wire::encode(&request),
            )]
        );
    }

    #[test]
    fn test_backslash_delimiter_is_accepted() {
        let mut pts = MockPts::new();
        pts.metadata.insert(
            "/etc/hostname".to_string(),
            pts_attestation::FileMetadata::default(),
        );
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        responder
            .process(
                &mut session,
                &Attribute::ReqFileMeta {
                    directory: false,
                    delimiter: b'\\',
                    path: "/etc/hostname".to_string(),
                },
                &mut output,
            )
            .unwrap();

        assert!(matches!(output[0], Attribute::UnixFileMeta { .. }));
    }

    #[test]
    fn test_evidence_preconditions_are_localized() {
        // Every refused precondition appends exactly one error attribute,
        // changes nothing, and still reports success.
        let cases = [
            (EvidenceRequestFlags::TTC, PtsErrorCode::UnableToDetermineTtc),
            (
                EvidenceRequestFlags::VER,
                PtsErrorCode::UnableToPerformLocalValidation,
            ),
            (
                EvidenceRequestFlags::CURR,
                PtsErrorCode::UnableToRetrieveCurrentEvidence,
            ),
            (EvidenceRequestFlags::PCR, PtsErrorCode::UnableToDeterminePcr),
        ];

        for (flags, expected_code) in cases {
            let mut responder = responder(MockPts::new());
            // Nothing was negotiated, so every capability gate refuses.
            let mut session = Session::new(ProtoCaps::NONE);
            let mut output = Vec::new();

            responder
                .process(
                    &mut session,
                    &Attribute::ReqFunctCompEvid {
                        flags,
                        sub_component_depth: 0,
                        vendor_id: 0x00_5597,
                        family: 0,
                        qualifier: ComponentQualifier {
                            kernel: false,
                            sub_component: false,
                            component_type: ComponentType::Tnc,
                        },
                        name: FunctionalComponentName::Bios,
                    },
                    &mut output,
                )
                .unwrap();

            assert_eq!(output.len(), 1, "flags {flags:?}");
            match &output[0] {
                Attribute::PaTncError { code, .. } => assert_eq!(*code, expected_code),
                other => panic!("unexpected attribute: {other:?}"),
            }
            assert_eq!(session.evidence_count(), 0);
            assert_eq!(session.meas_algorithm(), None);
        }
    }

    #[test]
    fn test_silent_skips_leave_session_unchanged() {
        let mut responder = responder(MockPts::new());
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        let skipped = [
            // Verifier-side attributes the responder never receives.
            Attribute::TpmVersionInfo {
                version_info: vec![0x01, 0x02],
            },
            Attribute::MeasurementAlgorithms {
                set: MeasAlgorithmSet::only(MeasurementAlgorithm::Sha1),
                selection: true,
            },
            Attribute::ProtoCaps {
                flags: ProtoCaps::TPM,
                request: false,
            },
            // Not-yet-implemented attribute types arrive as raw values.
            Attribute::Unknown {
                vendor_id: 0x00_5597,
                tag: 27,
                value: vec![0xDE, 0xAD],
            },
            // AIK request without a provisioned AIK.
            Attribute::GetAik,
            // Functional component evidence for a foreign vendor.
            Attribute::ReqFunctCompEvid {
                flags: EvidenceRequestFlags::NONE,
                sub_component_depth: 0,
                vendor_id: 0x00_0BAD,
                family: 0,
                qualifier: ComponentQualifier {
                    kernel: true,
                    sub_component: true,
                    component_type: ComponentType::All,
                },
                name: FunctionalComponentName::Bios,
            },
            // Unsupported functional component names.
            Attribute::ReqFunctCompEvid {
                flags: EvidenceRequestFlags::NONE,
                sub_component_depth: 0,
                vendor_id: 0x00_5597,
                family: 0,
                qualifier: ComponentQualifier {
                    kernel: false,
                    sub_component: false,
                    component_type: ComponentType::Unknown,
                },
                name: FunctionalComponentName::OptionRoms,
            },
        ];

        for attribute in &skipped {
            responder
                .process(&mut session, attribute, &mut output)
                .unwrap();
        }

        assert!(output.is_empty());
        assert_eq!(session.proto_caps(), ProtoCaps::all());
        assert_eq!(session.meas_algorithm(), None);
        assert_eq!(session.evidence_count(), 0);
    }

    #[test]
    fn test_invalid_path_skips_and_path_error_forwards() {
        let mut pts = MockPts::new();
        pts.invalid_paths.insert("/no/such/file".to_string());
        pts.path_errors
            .insert("relative/path".to_string(), PtsErrorCode::InvalidPath);
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        responder
            .process(
                &mut session,
                &Attribute::ReqFileMeas {
                    directory: false,
                    request_id: 1,
                    delimiter: b'/',
                    path: "/no/such/file".to_string(),
                },
                &mut output,
            )
            .unwrap();
        assert!(output.is_empty());

        responder
            .process(
                &mut session,
                &Attribute::ReqFileMeas {
                    directory: false,
                    request_id: 2,
                    delimiter: b'/',
                    path: "relative/path".to_string(),
                },
                &mut output,
            )
            .unwrap();
        match &output[0] {
            Attribute::PaTncError { code, .. } => assert_eq!(*code, PtsErrorCode::InvalidPath),
            other => panic!("unexpected attribute: {other:?}"),
        }
    }

    #[test]
    fn test_dh_generation_failure_aborts_session() {
        let mut pts = MockPts::new();
        pts.fail_dh_nonce = true;
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        let result = responder.process(
            &mut session,
            &Attribute::DhNonceParamsReq {
                min_nonce_len: 0,
                dh_groups: DhGroupSet::only(DhGroup::Ike14),
            },
            &mut output,
        );

        assert!(matches!(result, Err(SessionError::DhNonceGeneration(_))));
        assert!(output.is_empty());
    }

    #[test]
    fn test_secret_computation_failure_aborts_session() {
        let mut pts = MockPts::new();
        pts.fail_secret = true;
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        let result = responder.process(
            &mut session,
            &Attribute::DhNonceFinish {
                hash_algorithm: MeasurementAlgorithm::Sha256,
                initiator_value: vec![0x42; 64],
                initiator_nonce: vec![0x24; 20],
            },
            &mut output,
        );

        assert!(matches!(result, Err(SessionError::SecretComputation(_))));
    }

    #[test]
    fn test_pcr_failures_abort_the_measurement() {
        for (read_fails, extend_fails) in [(true, false), (false, true)] {
            let mut pts = MockPts::new().with_file("/etc/tnc_config", b"contents");
            pts.fail_read_pcr = read_fails;
            pts.fail_extend_pcr = extend_fails;
            let mut responder = responder(pts);
            let mut session = Session::new(ProtoCaps::all());
            session.set_meas_algorithm(MeasurementAlgorithm::Sha256);
            let mut output = Vec::new();

            let result = responder.process(
                &mut session,
                &Attribute::ReqFunctCompEvid {
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
                },
                &mut output,
            );

            if read_fails {
                assert!(matches!(result, Err(SessionError::PcrRead(16, _))));
            } else {
                assert!(matches!(result, Err(SessionError::PcrExtend(16, _))));
            }
            assert_eq!(session.evidence_count(), 0);
        }
    }

    #[test]
    fn test_tpm_version_error_carries_request_value() {
        let mut pts = MockPts::new();
        pts.tpm_version = None;
        let mut responder = responder(pts);
        let mut session = Session::new(ProtoCaps::all());
        let mut output = Vec::new();

        responder
            .process(&mut session, &Attribute::GetTpmVersionInfo, &mut output)
            .unwrap();

        assert_eq!(
            output,
            vec![Attribute::pts_error(
                PtsErrorCode::TpmVersionNotSupported,
                wire::encode(&Attribute::GetTpmVersionInfo),
            )]
        );
    }
}
