pub mod signed_message;
pub mod trust_anchor;
mod util;
pub mod validation;
pub mod x5chain;

pub use signed_message::SignedMessage;
pub use trust_anchor::TrustAnchorRegistry;
pub use util::{common_name, display_name, subject_serial_number};
pub use x5chain::X5Chain;

use validation::{validate_chain, ValidationOptions};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("unable to decode signature: {0}")]
    Decode(#[source] signed_message::Error),
    #[error("signed content check failed: {0}")]
    Content(#[source] signed_message::Error),
    #[error("signature check failed: {0}")]
    Signature(#[source] signed_message::Error),
    #[error("certificate chain is not trusted: {}", .0.join(", "))]
    Chain(Vec<String>),
}

/// Verifies the CMS signatures returned by the service.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    trust_anchors: TrustAnchorRegistry,
    validate_chain: bool,
}

impl SignatureVerifier {
    pub fn new(trust_anchors: TrustAnchorRegistry, validate_chain: bool) -> Self {
        Self {
            trust_anchors,
            validate_chain,
        }
    }

    pub fn chain_validation_enabled(&self) -> bool {
        self.validate_chain
    }

    pub fn verify(
        &self,
        data_to_be_signed: &str,
        base64_signature: &str,
    ) -> Result<SignedMessage, VerifyError> {
        self.verify_with_options(
            data_to_be_signed,
            base64_signature,
            &ValidationOptions::default(),
        )
    }

    /// Decode the signature, then check the signed content, the signature itself and,
    /// when enabled, the chain to a trust anchor.
    pub fn verify_with_options(
        &self,
        data_to_be_signed: &str,
        base64_signature: &str,
        options: &ValidationOptions,
    ) -> Result<SignedMessage, VerifyError> {
        let message = SignedMessage::from_base64(base64_signature).map_err(VerifyError::Decode)?;
        message
            .verify_content(data_to_be_signed)
            .map_err(VerifyError::Content)?;
        message.verify_signature().map_err(VerifyError::Signature)?;

        if self.validate_chain {
            let outcome = validate_chain(message.x5chain(), &self.trust_anchors, options);
            if !outcome.success() {
                return Err(VerifyError::Chain(outcome.errors));
            }
        } else {
            tracing::debug!("certificate chain validation is disabled");
        }

        tracing::debug!(
            "signature of '{}' verified",
            message.x5chain().end_entity_common_name()
        );
        Ok(message)
    }
}
