//! The signer certificate of a Mobile ID signature and the certificates carried with it.
use anyhow::{anyhow, bail, Context, Result};
use x509_cert::{certificate::Certificate, der::Decode};

use super::util::{common_name_or_unknown, display_name, subject_serial_number};

/// Parse a single PEM encoded certificate.
pub fn certificate_from_pem(bytes: &[u8]) -> Result<Certificate> {
    let (_, der) = pem_rfc7468::decode_vec(bytes)
        .map_err(|e| anyhow!("unable to parse certificate from PEM encoding: {e}"))?;
    Certificate::from_der(&der).context("unable to parse certificate from DER encoding")
}

/// Parse every certificate of a PEM bundle. An empty bundle is an error.
pub fn certificates_from_pem_bundle(bytes: &[u8]) -> Result<Vec<Certificate>> {
    let certificates = Certificate::load_pem_chain(bytes)
        .map_err(|e| anyhow!("unable to parse certificates from PEM bundle: {e}"))?;
    if certificates.is_empty() {
        bail!("PEM bundle contains no certificate");
    }
    Ok(certificates)
}

/// The signer certificate of a signature, followed by any other certificates the
/// signature carried.
#[derive(Debug, Clone)]
pub struct X5Chain {
    signer: Certificate,
    others: Vec<Certificate>,
}

impl X5Chain {
    pub fn new(signer: Certificate, others: Vec<Certificate>) -> Self {
        Self { signer, others }
    }

    pub fn end_entity_certificate(&self) -> &Certificate {
        &self.signer
    }

    pub fn end_entity_common_name(&self) -> &str {
        common_name_or_unknown(&self.signer)
    }

    pub fn end_entity_display_name(&self) -> Option<&str> {
        display_name(&self.signer)
    }

    /// The subject serialNumber the Mobile ID user is identified by.
    pub fn end_entity_serial_number(&self) -> Option<&str> {
        subject_serial_number(&self.signer)
    }

    /// Certificates other than the signer, which may link it to a trust anchor.
    pub fn intermediates(&self) -> impl Iterator<Item = &Certificate> {
        self.others.iter()
    }
}
