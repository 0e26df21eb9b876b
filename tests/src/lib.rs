//! # Platform Trust Services Test Suite
//!
//! Unified test crate driving the attestation responder end to end:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── attestation_flow.rs   # Full verifier conversations through quote
//!     └── protocol_errors.rs    # In-band errors, silent skips, fatal aborts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pts-tests
//!
//! # By category
//! cargo test -p pts-tests integration::
//! ```

pub mod integration;

/// Installs a `RUST_LOG`-controlled subscriber for a test run. Safe to call
/// from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
