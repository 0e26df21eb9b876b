//! Centralized testing utilities.
//!
//! Collects the mock implementations of the driven ports used across the
//! crate and by downstream test suites. Available with the `test-utils`
//! feature flag.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use digest::DynDigest;
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::domain::{
    Aik, DhGroup, FileMeasurementEntry, FileMeasurements, FileMetadata, MeasurementAlgorithm,
    PtsErrorCode, TpmQuote,
};
use crate::ports::outbound::{CapabilityError, Clock, PathValidation, PtsCapability};

/// Width of the simulated PCR bank (TPM 1.2 SHA1 registers).
const PCR_LEN: usize = 20;

/// Responder DH material held between the two nonce-exchange turns.
#[derive(Clone, Debug)]
struct DhMaterial {
    group: DhGroup,
    public_value: Vec<u8>,
    nonce: Vec<u8>,
}

/// In-memory [`PtsCapability`] implementation.
///
/// Simulates a PCR bank with real extend semantics
/// (`PCR' = SHA1(PCR ∥ measurement)`), canned file contents, and
/// deterministic quote material. Every operation records what it was called
/// with so tests can assert on the interaction, and every fallible
/// operation can be made to fail via the `fail_*` switches.
#[derive(Default)]
pub struct MockPts {
    /// Canned file contents served to `hash_file`.
    pub files: HashMap<String, Vec<u8>>,
    /// TPM version blob; `None` makes `tpm_version_info` fail.
    pub tpm_version: Option<Vec<u8>>,
    /// Provisioned AIK; `None` is the silent-skip case.
    pub provisioned_aik: Option<Aik>,
    /// Paths reported as `PathValidation::Invalid`.
    pub invalid_paths: HashSet<String>,
    /// Paths reported as `PathValidation::Error(code)`.
    pub path_errors: HashMap<String, PtsErrorCode>,
    /// Canned metadata per path.
    pub metadata: HashMap<String, FileMetadata>,

    /// Failure switches.
    pub fail_dh_nonce: bool,
    pub fail_secret: bool,
    pub fail_read_pcr: bool,
    pub fail_extend_pcr: bool,
    pub fail_quote: bool,
    pub fail_measurements: bool,

    /// Recorded interactions.
    pub peer_value: Option<Vec<u8>>,
    pub peer_nonce: Option<Vec<u8>>,
    pub dh_hash_algorithm: Option<MeasurementAlgorithm>,
    pub secret_computed: bool,
    pub quoted_pcrs: Option<Vec<u32>>,

    dh: Option<DhMaterial>,
    pcrs: HashMap<u32, Vec<u8>>,
}

impl MockPts {
    pub fn new() -> MockPts {
        MockPts {
            tpm_version: Some(b"TPM 1.2 rev 116".to_vec()),
            ..MockPts::default()
        }
    }

    /// Adds a canned file.
    pub fn with_file(mut self, path: &str, content: &[u8]) -> MockPts {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    /// Provisions an AIK public key blob.
    pub fn with_aik(mut self, aik: Aik) -> MockPts {
        self.provisioned_aik = Some(aik);
        self
    }

    /// The DH group the responder generated material for, if any.
    pub fn dh_group(&self) -> Option<DhGroup> {
        self.dh.as_ref().map(|m| m.group)
    }

    /// Current value of a simulated PCR (all zeroes before any extend).
    pub fn pcr(&self, index: u32) -> Vec<u8> {
        self.pcrs
            .get(&index)
            .cloned()
            .unwrap_or_else(|| vec![0u8; PCR_LEN])
    }
}

impl PtsCapability for MockPts {
    fn create_dh_nonce(
        &mut self,
        group: DhGroup,
        nonce_len: usize,
    ) -> Result<(), CapabilityError> {
        if self.fail_dh_nonce {
            return Err(CapabilityError::DhMaterial("entropy pool empty".into()));
        }
        let mut nonce = vec![0u8; nonce_len];
        rand::thread_rng().fill_bytes(&mut nonce);
        let mut public_value = vec![0u8; 64];
        rand::thread_rng().fill_bytes(&mut public_value);
        self.dh = Some(DhMaterial {
            group,
            public_value,
            nonce,
        });
        Ok(())
    }

    fn my_public_value(&self) -> Result<(Vec<u8>, Vec<u8>), CapabilityError> {
        match &self.dh {
            Some(m) => Ok((m.public_value.clone(), m.nonce.clone())),
            None => Err(CapabilityError::DhMaterial("no DH material created".into())),
        }
    }

    fn set_peer_public_value(&mut self, value: &[u8], nonce: &[u8]) {
        self.peer_value = Some(value.to_vec());
        self.peer_nonce = Some(nonce.to_vec());
    }

    fn set_dh_hash_algorithm(&mut self, algorithm: MeasurementAlgorithm) {
        self.dh_hash_algorithm = Some(algorithm);
    }

    fn calculate_secret(&mut self) -> Result<(), CapabilityError> {
        if self.fail_secret {
            return Err(CapabilityError::SharedSecret("point not on curve".into()));
        }
        if self.dh.is_none() || self.peer_value.is_none() {
            return Err(CapabilityError::SharedSecret(
                "DH exchange incomplete".into(),
            ));
        }
        self.secret_computed = true;
        // Ephemeral material is consumed by the derivation.
        self.dh = None;
        Ok(())
    }

    fn tpm_version_info(&self) -> Result<Vec<u8>, CapabilityError> {
        self.tpm_version
            .clone()
            .ok_or_else(|| CapabilityError::TpmVersion("no TPM present".into()))
    }

    fn aik(&self) -> Option<Aik> {
        self.provisioned_aik.clone()
    }

    fn hash_file(
        &self,
        hasher: &mut dyn DynDigest,
        path: &str,
    ) -> Result<Vec<u8>, CapabilityError> {
        let content = self
            .files
            .get(path)
            .ok_or_else(|| CapabilityError::FileAccess(format!("no such file: {path}")))?;
        DynDigest::update(hasher, content);
        Ok(hasher.finalize_reset().to_vec())
    }

    fn read_pcr(&self, index: u32) -> Result<Vec<u8>, CapabilityError> {
        if self.fail_read_pcr {
            return Err(CapabilityError::Pcr(format!("cannot read PCR {index}")));
        }
        Ok(self.pcr(index))
    }

    fn extend_pcr(&mut self, index: u32, measurement: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        if self.fail_extend_pcr {
            return Err(CapabilityError::Pcr(format!("cannot extend PCR {index}")));
        }
        let mut hasher = Sha1::new();
        Digest::update(&mut hasher, self.pcr(index));
        Digest::update(&mut hasher, measurement);
        let new_value = hasher.finalize().to_vec();
        self.pcrs.insert(index, new_value.clone());
        Ok(new_value)
    }

    fn quote_tpm(&mut self, pcr_indices: &[u32]) -> Result<TpmQuote, CapabilityError> {
        self.quoted_pcrs = Some(pcr_indices.to_vec());
        if self.fail_quote {
            return Err(CapabilityError::Quote("AIK not loaded".into()));
        }
        let mut composite = Vec::new();
        for &index in pcr_indices {
            composite.extend_from_slice(&self.pcr(index));
        }
        let mut hasher = Sha1::new();
        Digest::update(&mut hasher, b"quote:");
        Digest::update(&mut hasher, &composite);
        Ok(TpmQuote {
            pcr_composite: composite,
            signature: hasher.finalize().to_vec(),
        })
    }

    fn is_path_valid(&self, path: &str) -> PathValidation {
        if let Some(&code) = self.path_errors.get(path) {
            return PathValidation::Error(code);
        }
        if self.invalid_paths.contains(path) {
            return PathValidation::Invalid;
        }
        PathValidation::Valid
    }

    fn get_metadata(
        &self,
        path: &str,
        _is_directory: bool,
    ) -> Result<FileMetadata, CapabilityError> {
        self.metadata
            .get(path)
            .cloned()
            .ok_or_else(|| CapabilityError::FileAccess(format!("cannot stat {path}")))
    }

    fn do_measurements(
        &self,
        request_id: u16,
        path: &str,
        _is_directory: bool,
    ) -> Result<FileMeasurements, CapabilityError> {
        if self.fail_measurements {
            return Err(CapabilityError::FileAccess(format!(
                "cannot measure {path}"
            )));
        }
        let content = self
            .files
            .get(path)
            .ok_or_else(|| CapabilityError::FileAccess(format!("no such file: {path}")))?;
        let mut hasher = Sha1::new();
        Digest::update(&mut hasher, content);
        Ok(FileMeasurements {
            request_id,
            entries: vec![FileMeasurementEntry {
                filename: path.to_string(),
                measurement: hasher.finalize().to_vec(),
            }],
        })
    }
}

/// A clock that returns a fixed instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> FixedClock {
        FixedClock(instant)
    }

    /// Fixed clock at the given Unix timestamp (seconds).
    pub fn at_unix(secs: i64) -> FixedClock {
        FixedClock(DateTime::<Utc>::from_timestamp(secs, 0).expect("timestamp in range"))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        Some(self.0)
    }
}

/// A clock with no wall-clock available; selects the zero timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrokenClock;

impl Clock for BrokenClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        None
    }
}
