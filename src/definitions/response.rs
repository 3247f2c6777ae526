use std::collections::BTreeMap;

use serde::Serialize;
use strum_macros::Display;
use x509_cert::Certificate;

use super::{
    status::{Status, StatusCode},
    x509::SignedMessage,
};

/// Optional features the service may report next to the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
pub enum ServiceExtension {
    /// Link to the self-care portal, sent with some faults.
    UserAssistancePortalUrl,
    /// Subscriber detail `1901`, the mobile network of the user.
    SubscriberInfo,
}

/// Signer attributes derived from the signature blob.
///
/// Derivation only decodes the blob. It does not verify it; that is the job of
/// [crate::definitions::x509::SignatureVerifier].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignerSummary {
    #[serde(skip)]
    pub certificate: Option<Certificate>,
    pub display_name: Option<String>,
    pub serial_number: Option<String>,
}

impl SignerSummary {
    pub fn from_signature(signature: &[u8]) -> Self {
        match SignedMessage::from_der(signature) {
            Ok(message) => {
                let x5chain = message.x5chain();
                Self {
                    certificate: Some(x5chain.end_entity_certificate().clone()),
                    display_name: x5chain.end_entity_display_name().map(str::to_string),
                    serial_number: x5chain.end_entity_serial_number().map(str::to_string),
                }
            }
            Err(e) => {
                tracing::debug!("no signer could be derived from the signature: {e}");
                Self::default()
            }
        }
    }
}

/// Outcome of one call to the service, or a locally synthesized failure.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    status: Status,
    detail: Option<String>,
    mssp_trans_id: Option<String>,
    #[serde(skip)]
    signature: Option<Vec<u8>>,
    extensions: BTreeMap<ServiceExtension, String>,
    signer: SignerSummary,
}

impl AuthResponse {
    pub fn new(code: StatusCode) -> Self {
        Self {
            status: Status::new(code),
            detail: None,
            mssp_trans_id: None,
            signature: None,
            extensions: BTreeMap::new(),
            signer: SignerSummary::default(),
        }
    }

    pub fn with_detail(code: StatusCode, detail: impl Into<String>) -> Self {
        let mut response = Self::new(code);
        response.detail = Some(detail.into());
        response
    }

    pub fn with_mssp_trans_id(mut self, mssp_trans_id: impl Into<String>) -> Self {
        self.mssp_trans_id = Some(mssp_trans_id.into());
        self
    }

    /// Attach the raw signature, deriving the signer summary from it.
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signer = SignerSummary::from_signature(&signature);
        self.signature = Some(signature);
        self
    }

    pub fn with_extension(mut self, key: ServiceExtension, value: impl Into<String>) -> Self {
        self.extensions.insert(key, value.into());
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn code(&self) -> StatusCode {
        self.status.code()
    }

    /// Overwrite the status, keeping everything derived from the signature.
    pub fn set_status(&mut self, code: StatusCode) {
        self.status = Status::new(code);
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn mssp_trans_id(&self) -> Option<&str> {
        self.mssp_trans_id.as_deref()
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn extensions(&self) -> &BTreeMap<ServiceExtension, String> {
        &self.extensions
    }

    pub fn extension(&self, key: ServiceExtension) -> Option<&str> {
        self.extensions.get(&key).map(String::as_str)
    }

    pub fn signer(&self) -> &SignerSummary {
        &self.signer
    }

    pub fn signer_certificate(&self) -> Option<&Certificate> {
        self.signer.certificate.as_ref()
    }

    pub fn signer_serial_number(&self) -> Option<&str> {
        self.signer.serial_number.as_deref()
    }

    pub fn signer_display_name(&self) -> Option<&str> {
        self.signer.display_name.as_deref()
    }
}

impl std::fmt::Display for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mssp_trans_id={}, status: {{{}}}, detail: {}",
            self.mssp_trans_id.as_deref().unwrap_or("-"),
            self.status,
            self.detail.as_deref().unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static SIGNATURE: &str = include_str!("../../tests/data/signature.b64");

    fn signature_bytes() -> Vec<u8> {
        let compact: String = SIGNATURE.split_whitespace().collect();
        base64::decode(compact).unwrap()
    }

    #[test]
    fn signer_is_derived_once_at_construction() {
        let response = AuthResponse::new(StatusCode::Signature)
            .with_mssp_trans_id("h2c0w")
            .with_signature(signature_bytes());
        assert_eq!(response.signer_serial_number(), Some("MIDCHE28RZ7TKQC2"));
        assert_eq!(response.signer_display_name(), Some("MIDCHE28RZ7TKQC2:PN"));
        assert!(response.signer_certificate().is_some());
    }

    #[test]
    fn no_signature_means_no_signer() {
        let response = AuthResponse::with_detail(StatusCode::CommSetupError, "connection refused");
        assert!(response.signer_certificate().is_none());
        assert!(response.signer_serial_number().is_none());
        assert_eq!(response.detail(), Some("connection refused"));

        let garbage = AuthResponse::new(StatusCode::Signature).with_signature(vec![1, 2, 3]);
        assert!(garbage.signer_display_name().is_none());
    }

    #[test]
    fn status_overwrite_keeps_signer() {
        let mut response = AuthResponse::new(StatusCode::Signature).with_signature(signature_bytes());
        response.set_status(StatusCode::UserSerialNumberMismatch);
        assert_eq!(response.code(), StatusCode::UserSerialNumberMismatch);
        assert_eq!(response.signer_serial_number(), Some("MIDCHE28RZ7TKQC2"));
    }

    #[test]
    fn display() {
        let response = AuthResponse::with_detail(StatusCode::CardBlocked, "blocked")
            .with_extension(ServiceExtension::UserAssistancePortalUrl, "http://mobileid.ch");
        assert_eq!(
            response.to_string(),
            "mssp_trans_id=-, status: {CARD_BLOCKED (403, Yellow)}, detail: blocked"
        );
        assert_eq!(
            response.extension(ServiceExtension::UserAssistancePortalUrl),
            Some("http://mobileid.ch")
        );
    }
}
