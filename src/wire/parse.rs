//! Readers for the three response shapes of the service.
//!
//! Every reader returns an [AuthResponse]; protocol problems become client-local
//! status codes instead of errors. Checks run in a fixed order: correlation
//! identifiers first, then the status code, then the signature.
use super::{
    shorten,
    template::MessagingMode,
    xml::{Element, ParseError, XmlName},
    NS_ETSI_WSDL, NS_FICOM, NS_MSS, NS_SOAP_ENV, NS_SUBSCRIBER_INFO, NS_SWISSCOM_EXT,
};
use crate::definitions::{
    x509::{validation::ValidationOptions, SignatureVerifier},
    AuthRequest, AuthResponse, ServiceExtension, StatusCode,
};

/// Subscriber detail carrying the MCC/MNC of the user's network.
pub const SUBSCRIBER_INFO_MOBILE_NETWORK: &str = "1901";

const ENVELOPE: XmlName = XmlName::qualified(NS_SOAP_ENV, "Envelope");
const BODY: XmlName = XmlName::qualified(NS_SOAP_ENV, "Body");

/// What a response is checked against.
#[derive(Debug, Clone, Copy)]
pub struct ResponseCheck<'a> {
    pub request: &'a AuthRequest,
    pub verifier: &'a SignatureVerifier,
    pub validation: &'a ValidationOptions,
}

enum Abort {
    Parse(ParseError),
    Reject(AuthResponse),
}

impl From<ParseError> for Abort {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

fn settle(result: Result<AuthResponse, Abort>, body: &str) -> AuthResponse {
    match result {
        Ok(response) | Err(Abort::Reject(response)) => response,
        Err(Abort::Parse(ParseError::Missing { cursor })) => {
            tracing::error!(
                "response lacks element {cursor}, body={}",
                shorten(body)
            );
            AuthResponse::with_detail(
                StatusCode::UnknownResponse,
                format!("Missing element {cursor}"),
            )
        }
        Err(Abort::Parse(e)) => {
            tracing::error!("response is not parsable: {e}, body={}", shorten(body));
            AuthResponse::with_detail(StatusCode::UnknownResponse, e.to_string())
        }
    }
}

fn required<'e>(parent: &'e Element, name: XmlName) -> Result<&'e Element, ParseError> {
    parent.child(name).ok_or_else(|| ParseError::missing(name.local))
}

fn required_path<'e>(parent: &'e Element, path: &[XmlName]) -> Result<&'e Element, ParseError> {
    path.iter()
        .try_fold(parent, |element, step| required(element, *step))
}

fn required_attribute<'e>(
    element: &'e Element,
    name: &'static str,
) -> Result<&'e str, ParseError> {
    element
        .attribute(name)
        .ok_or_else(|| ParseError::missing(format!("{}@{name}", element.name)))
}

fn envelope_body(body: &str) -> Result<Element, ParseError> {
    let root = Element::parse(body)?;
    if !root.is(ENVELOPE) {
        return Err(ParseError::missing("Envelope"));
    }
    Ok(root)
}

/// The last `AP_TransID` in the document must be the one that was sent.
fn check_ap_trans_id(root: &Element, request: &AuthRequest, body: &str) -> Result<(), Abort> {
    let sent = request.trans_id().unwrap_or_default();
    let seen = root
        .descendant_attributes("AP_TransID")
        .last()
        .copied()
        .unwrap_or_default();
    if seen != sent {
        let detail =
            format!("Mismatched AP_TransId: req.AP_TransId='{sent}', rsp.AP_TransId='{seen}'");
        tracing::error!(target: "security", "{detail}, body={}", shorten(body));
        return Err(Abort::Reject(AuthResponse::with_detail(
            StatusCode::MismatchedApTransId,
            detail,
        )));
    }
    Ok(())
}

fn check_msisdn(response: &Element, request: &AuthRequest, body: &str) -> Result<(), Abort> {
    let sent = request.phone_number().unwrap_or_default();
    let seen = required_path(
        response,
        &[
            XmlName::qualified(NS_MSS, "MobileUser"),
            XmlName::qualified(NS_MSS, "MSISDN"),
        ],
    )?
    .text();
    if seen != sent {
        let detail =
            format!("Mismatched MSISDN: req.PhoneNumber='{sent}', rsp.PhoneNumber='{seen}'");
        tracing::error!(target: "security", "{detail}, body={}", shorten(body));
        return Err(Abort::Reject(AuthResponse::with_detail(
            StatusCode::MismatchedMsisdn,
            detail,
        )));
    }
    Ok(())
}

fn status_code(response: &Element) -> Result<String, ParseError> {
    let code = required_path(
        response,
        &[
            XmlName::qualified(NS_MSS, "Status"),
            XmlName::qualified(NS_MSS, "StatusCode"),
        ],
    )?;
    Ok(required_attribute(code, "Value")?.to_string())
}

fn status_message(response: &Element) -> Result<String, ParseError> {
    Ok(required_path(
        response,
        &[
            XmlName::qualified(NS_MSS, "Status"),
            XmlName::qualified(NS_MSS, "StatusMessage"),
        ],
    )?
    .text())
}

fn mssp_trans_id(response: &Element, body: &str) -> Result<String, Abort> {
    match response.attribute("MSSP_TransID") {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => {
            tracing::error!("response lacks MSSP_TransID, body={}", shorten(body));
            Err(Abort::Reject(AuthResponse::with_detail(
                StatusCode::UnknownResponse,
                "MSS_TransID is missing",
            )))
        }
    }
}

fn illegal_status(seen: &str, expected: &str, body: &str) -> Abort {
    let detail = format!("error=IllegalStatusCode, expect={expected}, seen={seen}");
    tracing::error!("{detail}, body={}", shorten(body));
    Abort::Reject(AuthResponse::with_detail(StatusCode::IllegalStatusCode, detail))
}

fn warn_on_changed_message(code: StatusCode, seen: &str) {
    if seen != code.canonical_message() {
        tracing::warn!(
            "service has changed the message of code {} to '{seen}' (expected '{}')",
            code.code(),
            code.canonical_message()
        );
    }
}

/// Extract, decode and verify `Base64Signature`.
fn verified_signature(
    response: &Element,
    check: &ResponseCheck<'_>,
    body: &str,
) -> Result<Vec<u8>, Abort> {
    let encoded = required_path(
        response,
        &[
            XmlName::qualified(NS_MSS, "MSS_Signature"),
            XmlName::qualified(NS_MSS, "Base64Signature"),
        ],
    )?
    .text();
    if encoded.is_empty() {
        tracing::error!("response carries an empty signature, body={}", shorten(body));
        return Err(Abort::Reject(AuthResponse::with_detail(
            StatusCode::UnknownResponse,
            "error=EmptySignature",
        )));
    }

    let invalid = |reason: String| {
        tracing::error!(
            target: "security",
            "response signature is invalid: {reason}, trans_id={}, phone_number={}, body={}",
            check.request.trans_id().unwrap_or_default(),
            check.request.phone_number().unwrap_or_default(),
            shorten(body)
        );
        Abort::Reject(AuthResponse::with_detail(
            StatusCode::InvalidResponseSignature,
            reason,
        ))
    };

    let compact: String = encoded.split_whitespace().collect();
    let bytes = base64::decode(&compact).map_err(|e| invalid(e.to_string()))?;
    let data_to_be_signed = check.request.data_to_be_signed().unwrap_or_default();
    check
        .verifier
        .verify_with_options(data_to_be_signed, &compact, check.validation)
        .map_err(|e| invalid(e.to_string()))?;
    Ok(bytes)
}

/// Value of subscriber detail `id` in `Status/StatusDetail`, if the service sent it.
pub fn subscriber_info<'e>(response: &'e Element, id: &str) -> Option<&'e str> {
    let responses = response.find(&[
        XmlName::qualified(NS_MSS, "Status"),
        XmlName::qualified(NS_MSS, "StatusDetail"),
        XmlName::qualified(NS_FICOM, "ServiceResponses"),
    ])?;
    responses
        .child_elements()
        .filter(|e| e.is(XmlName::qualified(NS_FICOM, "ServiceResponse")))
        .filter_map(|e| e.child(XmlName::qualified(NS_SUBSCRIBER_INFO, "SubscriberInfo")))
        .flat_map(|info| info.child_elements())
        .filter(|detail| detail.is(XmlName::qualified(NS_SUBSCRIBER_INFO, "Detail")))
        .find(|detail| detail.attribute("id") == Some(id))
        .and_then(|detail| detail.attribute("value"))
}

fn signed(response: &Element, mssp_trans_id: String, signature: Vec<u8>) -> AuthResponse {
    let signed = AuthResponse::new(StatusCode::Signature)
        .with_mssp_trans_id(mssp_trans_id)
        .with_signature(signature);
    match subscriber_info(response, SUBSCRIBER_INFO_MOBILE_NETWORK) {
        Some(value) => signed.with_extension(ServiceExtension::SubscriberInfo, value),
        None => signed,
    }
}

fn signature_response_element(root: &Element) -> Result<&Element, ParseError> {
    required_path(
        root,
        &[
            BODY,
            XmlName::unqualified("MSS_SignatureResponse"),
            XmlName::qualified(NS_MSS, "MSS_SignatureResp"),
        ],
    )
}

/// Read an HTTP 200 answer to `MSS_SignatureReq`.
///
/// A synchronous call must answer `500 SIGNATURE`. An asynchronous call may also
/// answer `100 REQUEST_OK`, which carries the transaction to poll.
pub fn parse_signature_response(
    body: &str,
    check: &ResponseCheck<'_>,
    mode: MessagingMode,
) -> AuthResponse {
    let result = match mode {
        MessagingMode::Synchronous => read_sync(body, check),
        MessagingMode::AsynchronousClientServer => read_async(body, check),
    };
    settle(result, body)
}

fn read_sync(body: &str, check: &ResponseCheck<'_>) -> Result<AuthResponse, Abort> {
    let root = envelope_body(body)?;
    check_ap_trans_id(&root, check.request, body)?;
    let response = signature_response_element(&root)?;
    check_msisdn(response, check.request, body)?;

    let code = status_code(response)?;
    if code != "500" {
        return Err(illegal_status(&code, "500", body));
    }
    warn_on_changed_message(StatusCode::Signature, &status_message(response)?);

    let signature = verified_signature(response, check, body)?;
    let mssp_trans_id = mssp_trans_id(response, body)?;
    Ok(signed(response, mssp_trans_id, signature))
}

fn read_async(body: &str, check: &ResponseCheck<'_>) -> Result<AuthResponse, Abort> {
    let root = envelope_body(body)?;
    check_ap_trans_id(&root, check.request, body)?;
    let response = signature_response_element(&root)?;
    check_msisdn(response, check.request, body)?;
    let mssp_trans_id = mssp_trans_id(response, body)?;

    let code = status_code(response)?;
    let message = status_message(response)?;
    match code.as_str() {
        "100" => {
            warn_on_changed_message(StatusCode::RequestOk, &message);
            return Ok(AuthResponse::new(StatusCode::RequestOk).with_mssp_trans_id(mssp_trans_id));
        }
        "500" => warn_on_changed_message(StatusCode::Signature, &message),
        _ => return Err(illegal_status(&code, "100|500", body)),
    }

    let signature = verified_signature(response, check, body)?;
    Ok(signed(response, mssp_trans_id, signature))
}

/// Read an HTTP 200 answer to `MSS_StatusReq`. `504 OUTSTANDING_TRANSACTION` means
/// the user has not answered yet.
pub fn parse_status_response(
    body: &str,
    check: &ResponseCheck<'_>,
    mssp_trans_id: &str,
) -> AuthResponse {
    settle(read_status(body, check, mssp_trans_id), body)
}

fn read_status(
    body: &str,
    check: &ResponseCheck<'_>,
    mssp_trans_id: &str,
) -> Result<AuthResponse, Abort> {
    let root = envelope_body(body)?;
    check_ap_trans_id(&root, check.request, body)?;
    let response = required_path(
        &root,
        &[
            BODY,
            XmlName::qualified(NS_ETSI_WSDL, "MSS_StatusQueryResponse"),
            XmlName::unqualified("MSS_StatusResp"),
        ],
    )?;
    check_msisdn(response, check.request, body)?;

    let code = status_code(response)?;
    let message = status_message(response)?;
    match code.as_str() {
        "504" => {
            warn_on_changed_message(StatusCode::OutstandingTransaction, &message);
            return Ok(AuthResponse::new(StatusCode::OutstandingTransaction)
                .with_mssp_trans_id(mssp_trans_id));
        }
        "500" => warn_on_changed_message(StatusCode::Signature, &message),
        _ => return Err(illegal_status(&code, "500|504", body)),
    }

    let signature = verified_signature(response, check, body)?;
    Ok(signed(response, mssp_trans_id.to_string(), signature))
}

/// The number in a subcode of the form `prefix:_DDD`.
fn fault_code_number(subcode: &str) -> Option<i32> {
    let (prefix, code) = subcode.split_once(':')?;
    let digits = code.strip_prefix('_')?;
    let well_formed = !prefix.is_empty()
        && prefix.chars().all(|c| c.is_alphanumeric() || c == '_')
        && digits.len() == 3
        && digits.bytes().all(|b| b.is_ascii_digit());
    if well_formed {
        digits.parse().ok()
    } else {
        None
    }
}

struct Fault {
    code: String,
    reason: String,
    detail: String,
    portal_url: Option<String>,
}

fn read_fault(body: &str) -> Result<Fault, ParseError> {
    let root = envelope_body(body)?;
    let fault = required_path(
        &root,
        &[BODY, XmlName::qualified(NS_SOAP_ENV, "Fault")],
    )?;
    let code = required_path(
        fault,
        &[
            XmlName::qualified(NS_SOAP_ENV, "Code"),
            XmlName::qualified(NS_SOAP_ENV, "Subcode"),
            XmlName::qualified(NS_SOAP_ENV, "Value"),
        ],
    )
    .map_err(|_| ParseError::missing("Subcode"))?
    .text();
    let reason = required_path(
        fault,
        &[
            XmlName::qualified(NS_SOAP_ENV, "Reason"),
            XmlName::qualified(NS_SOAP_ENV, "Text"),
        ],
    )
    .map_err(|_| ParseError::missing("Reason"))?
    .text();
    let detail = required(fault, XmlName::qualified(NS_SOAP_ENV, "Detail"))
        .map_err(|_| ParseError::missing("Detail"))?;
    let portal_url = detail
        .find(&[
            XmlName::qualified(NS_SWISSCOM_EXT, "UserAssistance"),
            XmlName::qualified(NS_SWISSCOM_EXT, "PortalUrl"),
        ])
        .map(Element::text);
    Ok(Fault {
        code,
        reason,
        detail: detail.text(),
        portal_url,
    })
}

/// Read a SOAP fault, the answer to any request that the service rejects.
///
/// `http_status` is only used for logging.
pub fn parse_fault(body: &str, http_status: u16, mode: MessagingMode) -> AuthResponse {
    let fault = match read_fault(body) {
        Ok(fault) => fault,
        Err(ParseError::Missing { cursor }) => {
            tracing::error!(
                "SOAP fault lacks <{cursor}>, http_status={http_status}, body={}",
                shorten(body)
            );
            return AuthResponse::with_detail(
                StatusCode::UnknownResponse,
                format!("Missing <{cursor}> in SOAP Fault"),
            );
        }
        Err(e) => {
            tracing::error!(
                "SOAP fault is not parsable: {e}, http_status={http_status}, body={}",
                shorten(body)
            );
            return AuthResponse::with_detail(
                StatusCode::UnknownResponse,
                format!("Soap Fault parsing error: {e}"),
            );
        }
    };

    let summary = || {
        format!(
            "code='{}', reason='{}', detail='{}', portalUrl='{}'",
            fault.code,
            fault.reason,
            fault.detail,
            fault.portal_url.as_deref().unwrap_or_default()
        )
    };

    let Some(number) = fault_code_number(&fault.code) else {
        let summary = summary();
        tracing::warn!("ill-formed fault code: {summary}, body={}", shorten(body));
        return AuthResponse::with_detail(StatusCode::UnsupportedStatusCode, summary);
    };

    let Some(code) = StatusCode::from_code(number).filter(|code| code.is_remote()) else {
        let summary = summary();
        tracing::warn!("unknown fault code: {summary}");
        return AuthResponse::with_detail(StatusCode::UnsupportedStatusCode, summary);
    };

    if mode == MessagingMode::Synchronous
        && matches!(
            code,
            StatusCode::RequestOk | StatusCode::OutstandingTransaction
        )
    {
        tracing::error!(
            "illegal fault code {code} in a synchronous exchange, body={}",
            shorten(body)
        );
        return AuthResponse::with_detail(StatusCode::IllegalStatusCode, code.to_string());
    }

    if fault.reason != code.canonical_message() {
        tracing::warn!(
            "SOAP fault reason '{}' does not match '{}'",
            fault.reason,
            code.canonical_message()
        );
    }

    let response = AuthResponse::with_detail(code, fault.detail);
    match fault.portal_url {
        Some(url) => response.with_extension(ServiceExtension::UserAssistancePortalUrl, url),
        None => response,
    }
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use super::*;
    use crate::definitions::x509::TrustAnchorRegistry;

    static SIGNATURE: &str = include_str!("../../tests/data/signature.b64");
    static DTBS: &str = include_str!("../../tests/data/dtbs.txt");
    static CA: &[u8] = include_bytes!("../../tests/data/ca.pem");

    const TRANS_ID: &str = "X5F6A0C11";
    const MSISDN: &str = "+41791234567";

    struct Fixture {
        request: AuthRequest,
        verifier: SignatureVerifier,
        validation: ValidationOptions,
    }

    impl Fixture {
        fn new() -> Self {
            let mut request = AuthRequest::new(MSISDN, DTBS).unwrap();
            request.set_ap_id("mid://dev.swisscom.ch").unwrap();
            request.set_trans_id(TRANS_ID).unwrap();
            Self {
                request,
                verifier: SignatureVerifier::new(TrustAnchorRegistry::from_pem(CA).unwrap(), true),
                validation: ValidationOptions::at(datetime!(2030-06-01 0:00 UTC)),
            }
        }

        fn check(&self) -> ResponseCheck<'_> {
            ResponseCheck {
                request: &self.request,
                verifier: &self.verifier,
                validation: &self.validation,
            }
        }
    }

    fn signature_response(trans_id: &str, msisdn: &str, code: &str, signature: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope">
  <soapenv:Body>
    <MSS_SignatureResponse xmlns="">
      <mss:MSS_SignatureResp xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#" MajorVersion="1" MinorVersion="1" MSSP_TransID="h2c0w">
        <mss:AP_Info AP_ID="mid://dev.swisscom.ch" AP_PWD="" AP_TransID="{trans_id}" Instant="2015-02-26T13:37:52.919Z"/>
        <mss:MSSP_Info><mss:MSSP_ID><mss:URI>http://mid.swisscom.ch/</mss:URI></mss:MSSP_ID></mss:MSSP_Info>
        <mss:MobileUser><mss:MSISDN>{msisdn}</mss:MSISDN></mss:MobileUser>
        <mss:MSS_Signature><mss:Base64Signature>{signature}</mss:Base64Signature></mss:MSS_Signature>
        <mss:SignatureProfile><mss:mssURI>http://mid.swisscom.ch/MID/v1/AuthProfile1</mss:mssURI></mss:SignatureProfile>
        <mss:Status><mss:StatusCode Value="{code}"/><mss:StatusMessage>SIGNATURE</mss:StatusMessage></mss:Status>
      </mss:MSS_SignatureResp>
    </MSS_SignatureResponse>
  </soapenv:Body>
</soapenv:Envelope>"#
        )
    }

    fn status_response(trans_id: &str, code: &str, message: &str, signature: &str) -> String {
        let signature = if signature.is_empty() {
            String::new()
        } else {
            format!("<mss:MSS_Signature><mss:Base64Signature>{signature}</mss:Base64Signature></mss:MSS_Signature>")
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope">
<soapenv:Body>
  <MSS_StatusQueryResponse xmlns="http://uri.etsi.org/TS102204/etsi204-kiuru.wsdl">
    <MSS_StatusResp xmlns="" MajorVersion="1" MinorVersion="1">
      <mss:AP_Info xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#" AP_ID="mid://dev.swisscom.ch" AP_TransID="{trans_id}" AP_PWD="" Instant="2015-02-27T13:04:45.072+01:00"/>
      <mss:MobileUser xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#"><mss:MSISDN>+41791234567</mss:MSISDN></mss:MobileUser>
      {signature}
      <mss:Status xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#" xmlns:fi="http://mss.ficom.fi/TS102204/v1.0.0#">
        <mss:StatusCode Value="{code}"/>
        <mss:StatusMessage>{message}</mss:StatusMessage>
        <mss:StatusDetail>
          <fi:ServiceResponses>
            <fi:ServiceResponse>
              <fi:Description><mss:mssURI>http://mid.swisscom.ch/as#subscriberInfo</mss:mssURI></fi:Description>
              <ns1:SubscriberInfo xmlns:ns1="http://mid.swisscom.ch/TS102204/as/v1.0"><ns1:Detail id="1901" value="22801"/></ns1:SubscriberInfo>
            </fi:ServiceResponse>
          </fi:ServiceResponses>
        </mss:StatusDetail>
      </mss:Status>
    </MSS_StatusResp>
  </MSS_StatusQueryResponse>
</soapenv:Body>
</soapenv:Envelope>"#
        )
    }

    fn fault(subcode: &str, reason: &str, portal_url: bool) -> String {
        let assistance = if portal_url {
            r#"<ns2:UserAssistance xmlns:ns2="http://www.swisscom.ch/TS102204/ext/v1.0.0"><PortalUrl xmlns="http://www.swisscom.ch/TS102204/ext/v1.0.0">http://mobileid.ch?msisdn=41791234567</PortalUrl></ns2:UserAssistance>"#
        } else {
            ""
        };
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope">
  <soapenv:Body>
    <soapenv:Fault>
      <soapenv:Code>
        <soapenv:Value>soapenv:Sender</soapenv:Value>
        <soapenv:Subcode xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#"><soapenv:Value>{subcode}</soapenv:Value></soapenv:Subcode>
      </soapenv:Code>
      <soapenv:Reason><soapenv:Text xml:lang="en">{reason}</soapenv:Text></soapenv:Reason>
      <soapenv:Detail>
        <ns1:detail xmlns:ns1="http://kiuru.methics.fi/mssp">No key found</ns1:detail>
        {assistance}
      </soapenv:Detail>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#
        )
    }

    #[test_log::test]
    fn sync_signature_is_verified() {
        let fixture = Fixture::new();
        let body = signature_response(TRANS_ID, MSISDN, "500", SIGNATURE);
        let response =
            parse_signature_response(&body, &fixture.check(), MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::Signature, "{response}");
        assert_eq!(response.mssp_trans_id(), Some("h2c0w"));
        assert_eq!(response.signer_serial_number(), Some("MIDCHE28RZ7TKQC2"));
    }

    #[test_log::test]
    fn correlation_mismatches_are_fatal() {
        let fixture = Fixture::new();
        let body = signature_response("X0000", MSISDN, "500", SIGNATURE);
        let response =
            parse_signature_response(&body, &fixture.check(), MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::MismatchedApTransId);
        assert!(response.signature().is_none());

        let body = signature_response(TRANS_ID, "+41790000000", "500", SIGNATURE);
        let response = parse_signature_response(
            &body,
            &fixture.check(),
            MessagingMode::AsynchronousClientServer,
        );
        assert_eq!(response.code(), StatusCode::MismatchedMsisdn);

        let body = status_response("X0000", "500", "SIGNATURE", SIGNATURE);
        let response = parse_status_response(&body, &fixture.check(), "h2c0w");
        assert_eq!(response.code(), StatusCode::MismatchedApTransId);
    }

    #[test_log::test]
    fn sync_accepts_only_signature() {
        let fixture = Fixture::new();
        let body = signature_response(TRANS_ID, MSISDN, "100", SIGNATURE);
        let response =
            parse_signature_response(&body, &fixture.check(), MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::IllegalStatusCode);
        assert_eq!(
            response.detail(),
            Some("error=IllegalStatusCode, expect=500, seen=100")
        );

        let response = parse_signature_response(
            &body,
            &fixture.check(),
            MessagingMode::AsynchronousClientServer,
        );
        assert_eq!(response.code(), StatusCode::RequestOk);
        assert_eq!(response.mssp_trans_id(), Some("h2c0w"));
    }

    #[test_log::test]
    fn empty_or_foreign_signatures() {
        let fixture = Fixture::new();
        let body = signature_response(TRANS_ID, MSISDN, "500", "");
        let response =
            parse_signature_response(&body, &fixture.check(), MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::UnknownResponse);
        assert_eq!(response.detail(), Some("error=EmptySignature"));

        let mut fixture = Fixture::new();
        fixture
            .request
            .set_data_to_be_signed("example.com: Login with Mobile ID (ZZZZZ)?")
            .unwrap();
        let body = signature_response(TRANS_ID, MSISDN, "500", SIGNATURE);
        let response =
            parse_signature_response(&body, &fixture.check(), MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::InvalidResponseSignature);
    }

    #[test_log::test]
    fn missing_elements_are_named() {
        let fixture = Fixture::new();
        let body = signature_response(TRANS_ID, MSISDN, "500", SIGNATURE)
            .replace("<mss:MobileUser><mss:MSISDN>+41791234567</mss:MSISDN></mss:MobileUser>", "");
        let response =
            parse_signature_response(&body, &fixture.check(), MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::UnknownResponse);
        assert_eq!(response.detail(), Some("Missing element MobileUser"));

        let response = parse_signature_response(
            "<html>oops</html>",
            &fixture.check(),
            MessagingMode::Synchronous,
        );
        assert_eq!(response.code(), StatusCode::UnknownResponse);
    }

    #[test_log::test]
    fn poll_outstanding_and_signed() {
        let fixture = Fixture::new();
        let body = status_response(TRANS_ID, "504", "OUTSTANDING_TRANSACTION", "");
        let response = parse_status_response(&body, &fixture.check(), "h2c0w");
        assert_eq!(response.code(), StatusCode::OutstandingTransaction);
        assert_eq!(response.mssp_trans_id(), Some("h2c0w"));

        let body = status_response(TRANS_ID, "500", "SIGNATURE", SIGNATURE);
        let response = parse_status_response(&body, &fixture.check(), "h2c0w");
        assert_eq!(response.code(), StatusCode::Signature, "{response}");
        assert_eq!(
            response.extension(ServiceExtension::SubscriberInfo),
            Some("22801")
        );

        let body = status_response(TRANS_ID, "401", "USER_CANCEL", "");
        let response = parse_status_response(&body, &fixture.check(), "h2c0w");
        assert_eq!(response.code(), StatusCode::IllegalStatusCode);
    }

    #[test_log::test]
    fn fault_with_and_without_portal_url() {
        let response = parse_fault(&fault("mss:_404", "NO_KEY_FOUND", true), 500, MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::NoKeyFound);
        assert_eq!(
            response.extension(ServiceExtension::UserAssistancePortalUrl),
            Some("http://mobileid.ch?msisdn=41791234567")
        );
        assert!(response.detail().unwrap().starts_with("No key found"));

        let response = parse_fault(
            &fault("mss:_404", "NO_KEY_FOUND", false),
            500,
            MessagingMode::AsynchronousClientServer,
        );
        assert_eq!(response.code(), StatusCode::NoKeyFound);
        assert!(response.extensions().is_empty());
        assert_eq!(response.detail(), Some("No key found"));
    }

    #[test_log::test]
    fn fault_codes_outside_the_taxonomy() {
        let response = parse_fault(&fault("mss:_999", "WHATEVER", false), 500, MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::UnsupportedStatusCode);

        let response = parse_fault(&fault("Sender", "X", false), 500, MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::UnsupportedStatusCode);
        assert!(response.detail().unwrap().starts_with("code='Sender'"));
    }

    #[test]
    fn subcode_shapes() {
        assert_eq!(fault_code_number("mss:_105"), Some(105));
        assert_eq!(fault_code_number("soapenv:_900"), Some(900));
        assert_eq!(fault_code_number("mss:105"), None);
        assert_eq!(fault_code_number(":_105"), None);
        assert_eq!(fault_code_number("mss:_1050"), None);
        assert_eq!(fault_code_number("mss:_10a"), None);
    }

    #[test_log::test]
    fn pending_codes_are_illegal_in_sync_faults() {
        let body = fault("mss:_504", "OUTSTANDING_TRANSACTION", false);
        let response = parse_fault(&body, 500, MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::IllegalStatusCode);

        let response = parse_fault(&body, 500, MessagingMode::AsynchronousClientServer);
        assert_eq!(response.code(), StatusCode::OutstandingTransaction);
    }

    #[test_log::test]
    fn fault_without_subcode() {
        let body = fault("mss:_401", "USER_CANCEL", false).replace(
            r#"<soapenv:Subcode xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#"><soapenv:Value>mss:_401</soapenv:Value></soapenv:Subcode>"#,
            "",
        );
        let response = parse_fault(&body, 500, MessagingMode::Synchronous);
        assert_eq!(response.code(), StatusCode::UnknownResponse);
        assert_eq!(response.detail(), Some("Missing <Subcode> in SOAP Fault"));
    }
}
