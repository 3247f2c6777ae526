use std::path::Path;

use anyhow::{Context, Result};
use x509_cert::Certificate;

use super::x5chain::certificates_from_pem_bundle;

/// Certificates trusted to issue the certificates of Mobile ID users.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchorRegistry {
    pub anchors: Vec<TrustAnchor>,
}

#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub certificate: Certificate,
}

impl TrustAnchorRegistry {
    pub fn from_certificates(certificates: impl IntoIterator<Item = Certificate>) -> Self {
        Self {
            anchors: certificates
                .into_iter()
                .map(|certificate| TrustAnchor { certificate })
                .collect(),
        }
    }

    /// Build a registry from PEM data, which may hold several certificates.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Ok(Self::from_certificates(certificates_from_pem_bundle(pem)?))
    }

    /// Build a registry from a list of PEM files.
    pub fn from_pem_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut registry = Self::default();
        for path in paths {
            let path = path.as_ref();
            let pem = std::fs::read(path)
                .with_context(|| format!("unable to read trust anchor file {}", path.display()))?;
            let loaded = Self::from_pem(&pem)
                .with_context(|| format!("unable to load trust anchors from {}", path.display()))?;
            tracing::debug!(
                "loaded {} trust anchor(s) from {}",
                loaded.anchors.len(),
                path.display()
            );
            registry.anchors.extend(loaded.anchors);
        }
        Ok(registry)
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn certificates(&self) -> impl Iterator<Item = &Certificate> {
        self.anchors.iter().map(|anchor| &anchor.certificate)
    }
}
