//! Inbound port: the API the transport drives.

use crate::domain::{Attribute, Session, SessionError};

/// Endpoint-side attestation responder.
///
/// The transport decodes one inbound attribute, calls [`process`] with the
/// session it owns for that verifier, then encodes and sends whatever was
/// appended to `output`. In-band protocol errors are appended as PA-TNC
/// error attributes and still return `Ok`; an `Err` is fatal and the caller
/// must abandon the session.
///
/// [`process`]: AttestationResponder::process
pub trait AttestationResponder {
    /// Handles a single inbound attribute to completion.
    fn process(
        &mut self,
        session: &mut Session,
        attribute: &Attribute,
        output: &mut Vec<Attribute>,
    ) -> Result<(), SessionError>;
}
