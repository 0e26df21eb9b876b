//! Ports layer: trait definitions for the hexagonal architecture.
//!
//! - **Inbound (driving)**: the API the transport calls
//! - **Outbound (driven)**: the platform capabilities this crate needs

pub mod inbound;
pub mod outbound;

pub use inbound::AttestationResponder;
pub use outbound::{CapabilityError, Clock, PathValidation, PtsCapability};
