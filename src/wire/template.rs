//! Request bodies. Values reach the templates only through the validating setters of
//! [AuthRequest]; the challenge is the one free-text field and is escaped here.
use quick_xml::escape::escape;

use crate::definitions::{AuthRequest, RequestError};

/// Messaging mode of a signature request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingMode {
    Synchronous,
    AsynchronousClientServer,
}

impl MessagingMode {
    pub fn from_asynchronous(asynchronous: bool) -> Self {
        if asynchronous {
            Self::AsynchronousClientServer
        } else {
            Self::Synchronous
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synchronous => "synch",
            Self::AsynchronousClientServer => "asynchClientServer",
        }
    }
}

/// Settings of the signature request that do not depend on the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTemplate<'a> {
    pub signature_profile: &'a str,
    pub subscriber_info: bool,
}

const VALIDATE_SERVICE: &str = "<mss:Service><mss:Description><mss:mssURI>http://uri.etsi.org/TS102204/v1.1.2#validate</mss:mssURI></mss:Description></mss:Service>";
const SUBSCRIBER_INFO_SERVICE: &str = "<mss:Service><mss:Description><mss:mssURI>http://mid.swisscom.ch/as#subscriberInfo</mss:mssURI></mss:Description></mss:Service>";
const MSSP_URI: &str = "http://mid.swisscom.ch/";

struct Common<'r> {
    ap_id: &'r str,
    trans_id: &'r str,
    instant: String,
}

fn common(request: &AuthRequest) -> Result<Common<'_>, RequestError> {
    Ok(Common {
        ap_id: request.ap_id().ok_or(RequestError::Incomplete("AP id"))?,
        trans_id: request
            .trans_id()
            .ok_or(RequestError::Incomplete("trans id"))?,
        instant: request.instant_or_now(),
    })
}

/// Render an `MSS_SignatureReq`.
pub fn signature_request(
    request: &AuthRequest,
    template: &SignatureTemplate<'_>,
    mode: MessagingMode,
) -> Result<String, RequestError> {
    request.validate_complete()?;
    let Common {
        ap_id,
        trans_id,
        instant,
    } = common(request)?;
    let msisdn = request
        .phone_number()
        .ok_or(RequestError::Incomplete("phone number"))?;
    let dtbs = request
        .data_to_be_signed()
        .ok_or(RequestError::Incomplete("data to be signed"))?;

    let validate = if request.server_side_validation() {
        VALIDATE_SERVICE
    } else {
        ""
    };
    let subscriber_info = if template.subscriber_info {
        SUBSCRIBER_INFO_SERVICE
    } else {
        ""
    };

    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope soap:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/" xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#" xmlns:fi="http://mss.ficom.fi/TS102204/v1.0.0#"><soapenv:Body><MSS_Signature>
<mss:MSS_SignatureReq MajorVersion="1" MinorVersion="1" MessagingMode="{mode}" TimeOut="{timeout}">
<mss:AP_Info AP_ID="{ap_id}" AP_PWD="" AP_TransID="{trans_id}" Instant="{instant}"/>
<mss:MSSP_Info><mss:MSSP_ID><mss:URI>{MSSP_URI}</mss:URI></mss:MSSP_ID></mss:MSSP_Info>
<mss:MobileUser><mss:MSISDN>{msisdn}</mss:MSISDN></mss:MobileUser>
<mss:DataToBeSigned MimeType="text/plain" Encoding="UTF-8">{dtbs}</mss:DataToBeSigned>
<mss:SignatureProfile><mss:mssURI>{profile}</mss:mssURI></mss:SignatureProfile><mss:AdditionalServices>
{validate}<mss:Service><mss:Description><mss:mssURI>http://mss.ficom.fi/TS102204/v1.0.0#userLang</mss:mssURI></mss:Description><fi:UserLang>{language}</fi:UserLang></mss:Service>
{subscriber_info}</mss:AdditionalServices></mss:MSS_SignatureReq></MSS_Signature></soapenv:Body></soapenv:Envelope>"#,
        mode = mode.as_str(),
        timeout = request.timeout_seconds(),
        dtbs = escape(dtbs),
        profile = escape(template.signature_profile),
        language = request.language(),
    ))
}

/// Render an `MSS_StatusReq` for the transaction `mssp_trans_id`.
pub fn status_request(request: &AuthRequest, mssp_trans_id: &str) -> Result<String, RequestError> {
    let Common {
        ap_id,
        trans_id,
        instant,
    } = common(request)?;
    if mssp_trans_id.is_empty() {
        return Err(RequestError::Incomplete("MSSP trans id"));
    }
    if !crate::definitions::request::is_xml_safe(mssp_trans_id) {
        return Err(RequestError::NotXmlSafe("MSSP trans id"));
    }

    Ok(format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns:ets="http://uri.etsi.org/TS102204/etsi204-kiuru.wsdl" xmlns:v1="http://uri.etsi.org/TS102204/v1.1.2#"><soap:Body><ets:MSS_StatusQuery><MSS_StatusReq MajorVersion="1" MinorVersion="1" MSSP_TransID="{mssp_trans_id}"><v1:AP_Info AP_ID="{ap_id}" AP_PWD="" AP_TransID="{trans_id}" Instant="{instant}"/><v1:MSSP_Info><v1:MSSP_ID><v1:URI>{MSSP_URI}</v1:URI></v1:MSSP_ID></v1:MSSP_Info></MSS_StatusReq></ets:MSS_StatusQuery></soap:Body></soap:Envelope>"#
    ))
}
