use const_oid::ObjectIdentifier;
use der::Encode;
use digest::Digest;
use p256::NistP256;
use p384::NistP384;
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

use crate::definitions::x509::util::public_key;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const ID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
const ID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(ObjectIdentifier),
    #[error("unsupported public key: {0}")]
    UnsupportedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("signature does not verify")]
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Look up a digest algorithm identifier, such as the `digestAlgorithm` of a CMS signer.
    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self, Error> {
        match oid {
            ID_SHA1 => Ok(Self::Sha1),
            ID_SHA256 => Ok(Self::Sha256),
            ID_SHA384 => Ok(Self::Sha384),
            ID_SHA512 => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(oid)),
        }
    }

    /// The digest used by a combined signature algorithm such as `sha256WithRSAEncryption`.
    pub fn from_signature_algorithm(oid: ObjectIdentifier) -> Result<Self, Error> {
        match oid {
            SHA1_WITH_RSA | ECDSA_WITH_SHA1 => Ok(Self::Sha1),
            SHA256_WITH_RSA | ECDSA_WITH_SHA256 => Ok(Self::Sha256),
            SHA384_WITH_RSA | ECDSA_WITH_SHA384 => Ok(Self::Sha384),
            SHA512_WITH_RSA | ECDSA_WITH_SHA512 => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(oid)),
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn pkcs1v15(self) -> Pkcs1v15Sign {
        match self {
            Self::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
            Self::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            Self::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            Self::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }
}

/// Verify `signature` over a message whose digest is `hashed`, with the key in `spki`.
///
/// RSA keys use PKCS#1 v1.5, EC keys use DER encoded ECDSA signatures on P-256 or P-384.
pub fn verify_prehashed(
    spki: &SubjectPublicKeyInfoOwned,
    digest: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    match spki.algorithm.oid {
        RSA_ENCRYPTION => {
            let der = spki
                .to_der()
                .map_err(|e| Error::UnsupportedKey(e.to_string()))?;
            let key = RsaPublicKey::from_public_key_der(&der)
                .map_err(|e| Error::UnsupportedKey(e.to_string()))?;
            key.verify(digest.pkcs1v15(), hashed, signature)
                .map_err(|_| Error::Invalid)
        }
        EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.decode_as::<ObjectIdentifier>().ok())
                .ok_or_else(|| Error::UnsupportedKey("EC key without named curve".into()))?;
            match curve {
                SECP256R1 => {
                    let key = public_key::<NistP256>(spki)
                        .map_err(|e| Error::UnsupportedKey(e.to_string()))?;
                    let sig = p256::ecdsa::Signature::from_der(signature)
                        .map_err(|e| Error::MalformedSignature(e.to_string()))?;
                    key.verify_prehash(hashed, &sig).map_err(|_| Error::Invalid)
                }
                SECP384R1 => {
                    let key = public_key::<NistP384>(spki)
                        .map_err(|e| Error::UnsupportedKey(e.to_string()))?;
                    let sig = p384::ecdsa::Signature::from_der(signature)
                        .map_err(|e| Error::MalformedSignature(e.to_string()))?;
                    key.verify_prehash(hashed, &sig).map_err(|_| Error::Invalid)
                }
                other => Err(Error::UnsupportedAlgorithm(other)),
            }
        }
        other => Err(Error::UnsupportedAlgorithm(other)),
    }
}

/// Check that the issuer certificate signed the subject certificate.
pub fn issuer_signed_subject(subject: &Certificate, issuer: &Certificate) -> bool {
    let digest = match DigestAlgorithm::from_signature_algorithm(subject.signature_algorithm.oid) {
        Ok(digest) => digest,
        Err(e) => {
            tracing::error!("failed to determine subject signature algorithm: {e}");
            return false;
        }
    };

    let tbs = match subject.tbs_certificate.to_der() {
        Ok(tbs) => tbs,
        Err(e) => {
            tracing::error!("failed to parse subject tbs: {e:?}");
            return false;
        }
    };

    match verify_prehashed(
        &issuer.tbs_certificate.subject_public_key_info,
        digest,
        &digest.digest(&tbs),
        subject.signature.raw_bytes(),
    ) {
        Ok(()) => true,
        Err(e) => {
            tracing::info!("subject certificate signature could not be validated: {e}");
            false
        }
    }
}
