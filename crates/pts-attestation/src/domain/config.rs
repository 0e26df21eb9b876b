//! Responder configuration.

/// Default DH nonce length in octets.
pub const DEFAULT_NONCE_LEN: usize = 20;

/// Default file measured for the BIOS reference component.
///
/// True BIOS measurement needs firmware support; measuring a well-known
/// configuration file stands in for it and is therefore configurable.
pub const DEFAULT_MEASUREMENT_PATH: &str = "/etc/tnc_config";

/// Default PCR the reference measurement is extended into.
pub const DEFAULT_EXTEND_PCR: u32 = 16;

/// Tunable settings of the attestation responder.
///
/// `nonce_len` is validated against the protocol bounds during the DH
/// nonce exchange, not at construction, so a misconfigured responder
/// answers the verifier with the proper in-band error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestationConfig {
    /// Length of the responder's DH nonce in octets.
    pub nonce_len: usize,
    /// File hashed for the BIOS reference measurement.
    pub measurement_path: String,
    /// PCR index the reference measurement extends.
    pub extend_pcr: u32,
}

impl Default for AttestationConfig {
    fn default() -> AttestationConfig {
        AttestationConfig {
            nonce_len: DEFAULT_NONCE_LEN,
            measurement_path: DEFAULT_MEASUREMENT_PATH.to_string(),
            extend_pcr: DEFAULT_EXTEND_PCR,
        }
    }
}
