//! SOAP messages exchanged with the Mobile ID service.
//!
//! Requests are rendered from fixed templates ([template]); responses are read
//! into a small namespace-aware tree ([xml]) and checked against the request
//! that caused them ([parse]).
pub mod parse;
pub mod template;
pub mod xml;

pub use parse::{parse_fault, parse_signature_response, parse_status_response};
pub use xml::ParseError;

/// SOAP 1.2 envelope.
pub const NS_SOAP_ENV: &str = "http://www.w3.org/2003/05/soap-envelope";
/// ETSI TS 102 204 v1.1.2.
pub const NS_MSS: &str = "http://uri.etsi.org/TS102204/v1.1.2#";
/// FiCom extensions.
pub const NS_FICOM: &str = "http://mss.ficom.fi/TS102204/v1.0.0#";
/// Kiuru WSDL, the namespace of the status query operation.
pub const NS_ETSI_WSDL: &str = "http://uri.etsi.org/TS102204/etsi204-kiuru.wsdl";
/// Swisscom extensions carried in SOAP faults.
pub const NS_SWISSCOM_EXT: &str = "http://www.swisscom.ch/TS102204/ext/v1.0.0";
/// Additional services of the Mobile ID application provider interface.
pub const NS_SUBSCRIBER_INFO: &str = "http://mid.swisscom.ch/TS102204/as/v1.0";

pub const DEFAULT_SERVICE_URL_PREFIX: &str = "https://mobileid.swisscom.com/soap/services/";
pub const DEFAULT_SIGNATURE_PROFILE: &str = "http://mid.swisscom.ch/MID/v1/AuthProfile1";

/// Longest body excerpt written to the logs.
pub const LOG_BODY_LIMIT: usize = 1000;

/// The SOAP ports of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Signature,
    StatusQuery,
}

impl Port {
    pub fn name(self) -> &'static str {
        match self {
            Self::Signature => "MSS_Signature",
            Self::StatusQuery => "MSS_StatusQuery",
        }
    }
}

/// A rendered SOAP request, ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapCall {
    pub port: Port,
    pub url: String,
    pub soap_action: String,
    pub body: String,
}

impl SoapCall {
    pub fn new(service_url_prefix: &str, port: Port, body: String) -> Self {
        Self {
            port,
            url: format!("{service_url_prefix}{}Port", port.name()),
            soap_action: format!("#{}", port.name()),
            body,
        }
    }
}

/// Cut `text` down to [LOG_BODY_LIMIT] characters for logging.
pub fn shorten(text: &str) -> std::borrow::Cow<'_, str> {
    match text.char_indices().nth(LOG_BODY_LIMIT) {
        Some((end, _)) => format!("{}...", &text[..end]).into(),
        None => text.into(),
    }
}
