//! The HTTP boundary: post a SOAP body, get back a status and a body.
//!
//! The rest of the crate only sees [Transport]. [ReqwestTransport] is the production
//! implementation; [ClientPool] recycles it after a number of requests.
use crate::wire::SoapCall;

mod pool;
mod reqwest_client;

pub use pool::ClientPool;
pub use reqwest_client::{ReqwestTransport, TransportSettings};

pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Any answer the server gave, whatever its HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// No usable answer. `status` is set when the server answered but the exchange
/// could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Sends SOAP calls to the service.
pub trait Transport: Send + Sync {
    fn post(&self, call: &SoapCall) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn post(&self, call: &SoapCall) -> Result<HttpResponse, TransportError> {
        (**self).post(call)
    }
}
