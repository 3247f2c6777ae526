//! CMS SignedData as returned in `Base64Signature`.
//!
//! The service signs the data-to-be-signed in an enveloping signature: the signed
//! text travels as eContent and the signer certificate, plus possibly some
//! intermediates, in the `certificates` set.
use cms::{
    cert::CertificateChoices,
    content_info::ContentInfo,
    signed_data::{SignedData, SignerIdentifier, SignerInfo},
};
use const_oid::{
    db::{rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER, rfc5911::ID_SIGNED_DATA},
    ObjectIdentifier,
};
use der::{asn1::OctetString, Decode, Encode};
use x509_cert::{ext::pkix::SubjectKeyIdentifier, Certificate};

use super::{
    validation::signature::{verify_prehashed, DigestAlgorithm, Error as SignatureError},
    X5Chain,
};

/// pkcs-9 messageDigest
const MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("signature is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unable to decode CMS structure: {0}")]
    Der(#[from] der::Error),
    #[error("content type {0} is not signed-data")]
    NotSignedData(ObjectIdentifier),
    #[error("signed data has no encapsulated content")]
    MissingContent,
    #[error("signed content is not UTF-8")]
    ContentNotUtf8,
    #[error("signed content differs from the data to be signed")]
    ContentMismatch,
    #[error("signed data has no signer")]
    NoSigner,
    #[error("signer certificate not found in signed data")]
    SignerCertificateNotFound,
    #[error("signed attributes lack a message digest")]
    MissingMessageDigest,
    #[error("message digest does not match the content")]
    MessageDigestMismatch,
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// A decoded CMS signature with its signer resolved.
#[derive(Debug, Clone)]
pub struct SignedMessage {
    content: Vec<u8>,
    x5chain: X5Chain,
    signer_info: SignerInfo,
}

impl SignedMessage {
    /// Decode a base64 CMS structure, ignoring embedded whitespace.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let compact: String = encoded.split_whitespace().collect();
        Self::from_der(&base64::decode(compact)?)
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        let content_info = ContentInfo::from_der(bytes)?;
        if content_info.content_type != ID_SIGNED_DATA {
            return Err(Error::NotSignedData(content_info.content_type));
        }
        let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;

        let content = signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or(Error::MissingContent)?
            .decode_as::<OctetString>()?
            .as_bytes()
            .to_vec();

        let signer_info = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .cloned()
            .ok_or(Error::NoSigner)?;

        let certificates: Vec<&Certificate> = signed_data
            .certificates
            .as_ref()
            .map(|set| {
                set.0
                    .iter()
                    .filter_map(|choice| match choice {
                        CertificateChoices::Certificate(cert) => Some(cert),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let signer_index = certificates
            .iter()
            .position(|cert| identifies(&signer_info.sid, cert))
            .ok_or(Error::SignerCertificateNotFound)?;

        let others = certificates
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != signer_index)
            .map(|(_, cert)| (*cert).clone())
            .collect();
        let x5chain = X5Chain::new(certificates[signer_index].clone(), others);

        Ok(Self {
            content,
            x5chain,
            signer_info,
        })
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_str(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.content).map_err(|_| Error::ContentNotUtf8)
    }

    /// The signer certificate first, then the other certificates of the signature.
    pub fn x5chain(&self) -> &X5Chain {
        &self.x5chain
    }

    pub fn signer_certificate(&self) -> &Certificate {
        self.x5chain.end_entity_certificate()
    }

    /// Check that the signed text is exactly the data that was sent to be signed.
    pub fn verify_content(&self, data_to_be_signed: &str) -> Result<(), Error> {
        if self.content_str()? == data_to_be_signed {
            Ok(())
        } else {
            Err(Error::ContentMismatch)
        }
    }

    /// Check the signer's signature over the content.
    ///
    /// With signed attributes present, their messageDigest must match the content and
    /// the signature covers the DER encoded attributes. Otherwise it covers the content.
    pub fn verify_signature(&self) -> Result<(), Error> {
        let digest = DigestAlgorithm::from_oid(self.signer_info.digest_alg.oid)?;
        let content_digest = digest.digest(&self.content);

        let hashed = match &self.signer_info.signed_attrs {
            Some(attrs) => {
                let message_digest = attrs
                    .iter()
                    .find(|attr| attr.oid == MESSAGE_DIGEST)
                    .and_then(|attr| attr.values.iter().next())
                    .ok_or(Error::MissingMessageDigest)?
                    .decode_as::<OctetString>()?;
                if message_digest.as_bytes() != content_digest.as_slice() {
                    return Err(Error::MessageDigestMismatch);
                }
                digest.digest(&attrs.to_der()?)
            }
            None => content_digest,
        };

        verify_prehashed(
            &self.signer_certificate().tbs_certificate.subject_public_key_info,
            digest,
            &hashed,
            self.signer_info.signature.as_bytes(),
        )?;
        Ok(())
    }
}

fn identifies(sid: &SignerIdentifier, cert: &Certificate) -> bool {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(issuer_and_serial) => {
            issuer_and_serial.issuer == cert.tbs_certificate.issuer
                && issuer_and_serial.serial_number == cert.tbs_certificate.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => cert
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .filter(|ext| ext.extn_id == ID_CE_SUBJECT_KEY_IDENTIFIER)
            .filter_map(|ext| SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()).ok())
            .any(|cert_ski| &cert_ski == ski),
    }
}
