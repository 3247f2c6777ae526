//! Blocking reqwest client with a TLS client identity.
use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use reqwest::header::CONTENT_TYPE as CONTENT_TYPE_HEADER;
use serde::{Deserialize, Serialize};

use super::{HttpResponse, Transport, TransportError, CONTENT_TYPE};
use crate::wire::{shorten, SoapCall};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// PEM file holding the client certificate and its private key.
    pub client_identity: Option<PathBuf>,
    /// Extra root certificates (PEM) for the server connection.
    pub server_root_certificates: Option<PathBuf>,
    pub connect_timeout_seconds: u64,
    /// Upper bound for a whole exchange. Must exceed the request timeout of the
    /// signature request, since a synchronous call blocks until the user answers.
    pub read_timeout_seconds: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            client_identity: None,
            server_root_certificates: None,
            connect_timeout_seconds: 10,
            read_timeout_seconds: 90,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> anyhow::Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.read_timeout_seconds));

        if let Some(path) = &settings.client_identity {
            let pem = std::fs::read(path)
                .with_context(|| format!("unable to read client identity {}", path.display()))?;
            let identity = reqwest::Identity::from_pem(&pem)
                .with_context(|| format!("invalid client identity in {}", path.display()))?;
            builder = builder.identity(identity);
        }

        if let Some(path) = &settings.server_root_certificates {
            let pem = std::fs::read(path)
                .with_context(|| format!("unable to read root certificates {}", path.display()))?;
            for certificate in reqwest::Certificate::from_pem_bundle(&pem)
                .with_context(|| format!("invalid root certificates in {}", path.display()))?
            {
                builder = builder.add_root_certificate(certificate);
            }
        }

        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn post(&self, call: &SoapCall) -> Result<HttpResponse, TransportError> {
        tracing::debug!(
            "POST {} SOAPAction={}, body={}",
            call.url,
            call.soap_action,
            shorten(&call.body)
        );
        let response = self
            .client
            .post(&call.url)
            .header("SOAPAction", &call.soap_action)
            .header(CONTENT_TYPE_HEADER, CONTENT_TYPE)
            .body(call.body.clone())
            .send()
            .map_err(|e| TransportError {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| TransportError::with_status(status, e.to_string()))?;
        tracing::debug!("HTTP {status}, body={}", shorten(&body));
        Ok(HttpResponse { status, body })
    }
}
