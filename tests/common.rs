//! A scripted Mobile ID service and the fixtures it signs with.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use mobileid::{
    authentication::ManualClock,
    definitions::x509::TrustAnchorRegistry,
    transport::{HttpResponse, Transport, TransportError},
    wire::{xml::Element, Port, SoapCall},
    Authenticator, Config, MobileIdClient,
};
use time::{macros::datetime, OffsetDateTime};

pub const SIGNATURE: &str = include_str!("data/signature.b64");
pub const ROGUE_SIGNATURE: &str = include_str!("data/rogue_signature.b64");
pub const CA: &[u8] = include_bytes!("data/ca.pem");
pub const DTBS: &str = include_str!("data/dtbs.txt");

pub const MSISDN: &str = "+41791234567";
/// The nonce in the challenge of `signature.b64`.
pub const NONCE: &str = "K7fQ2";
pub const SERIAL_NUMBER: &str = "MIDCHE28RZ7TKQC2";
pub const MSSP_TRANS_ID: &str = "h2c0w";
pub const START: OffsetDateTime = datetime!(2030-06-01 9:00 UTC);

fn main() {}

/// A request as the service received it.
#[derive(Debug, Clone)]
pub struct Sent {
    pub port: Port,
    pub ap_trans_id: String,
    pub msisdn: String,
    pub body: String,
}

impl Sent {
    fn new(call: &SoapCall) -> Self {
        let root = Element::parse(&call.body).expect("requests are well-formed");
        let ap_trans_id = root
            .descendant_attributes("AP_TransID")
            .last()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let msisdn = call
            .body
            .split_once("<mss:MSISDN>")
            .and_then(|(_, rest)| rest.split_once("</mss:MSISDN>"))
            .map(|(msisdn, _)| msisdn.to_string())
            .unwrap_or_else(|| MSISDN.to_string());
        Self {
            port: call.port,
            ap_trans_id,
            msisdn,
            body: call.body.clone(),
        }
    }
}

pub type Reply = Box<dyn Fn(&Sent) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// Answers with the scripted replies in order, then with the fallback forever.
#[derive(Default)]
pub struct MockService {
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    sent: Mutex<Vec<Sent>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, reply: Reply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn otherwise(self, reply: Reply) -> Self {
        *self.fallback.lock().unwrap() = Some(reply);
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, port: Port) -> usize {
        self.sent().iter().filter(|sent| sent.port == port).count()
    }
}

impl Transport for MockService {
    fn post(&self, call: &SoapCall) -> Result<HttpResponse, TransportError> {
        let sent = Sent::new(call);
        self.sent.lock().unwrap().push(sent.clone());
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply(&sent);
        }
        match &*self.fallback.lock().unwrap() {
            Some(reply) => reply(&sent),
            None => Err(TransportError::new("nothing scripted")),
        }
    }
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.client.ap_id = "mid://dev.swisscom.ch".to_string();
    config.session.dtbs_prefix = "example.com: ".to_string();
    config
}

pub type TestAuthenticator = Authenticator<Arc<MockService>, Arc<ManualClock>>;

/// An authenticator that always draws [NONCE], on a clock starting at [START].
pub fn authenticator(
    config: Config,
    service: MockService,
) -> (TestAuthenticator, Arc<MockService>, Arc<ManualClock>) {
    let service = Arc::new(service);
    let clock = Arc::new(ManualClock::starting_at(START));
    let client = MobileIdClient::new(
        config.client,
        TrustAnchorRegistry::from_pem(CA).unwrap(),
        service.clone(),
    );
    let authenticator = Authenticator::new(client, config.session, clock.clone())
        .with_nonce_generator(|_| NONCE.to_string());
    (authenticator, service, clock)
}

fn signature_element(signature: &str) -> String {
    if signature.is_empty() {
        String::new()
    } else {
        format!("<mss:MSS_Signature><mss:Base64Signature>{signature}</mss:Base64Signature></mss:MSS_Signature>")
    }
}

pub fn signature_response(trans_id: &str, msisdn: &str, code: &str, message: &str, signature: &str) -> String {
    let signature = signature_element(signature);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope">
  <soapenv:Body>
    <MSS_SignatureResponse xmlns="">
      <mss:MSS_SignatureResp xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#" MajorVersion="1" MinorVersion="1" MSSP_TransID="{MSSP_TRANS_ID}">
        <mss:AP_Info AP_ID="mid://dev.swisscom.ch" AP_PWD="" AP_TransID="{trans_id}" Instant="2030-06-01T09:00:00.000Z"/>
        <mss:MSSP_Info><mss:MSSP_ID><mss:URI>http://mid.swisscom.ch/</mss:URI></mss:MSSP_ID></mss:MSSP_Info>
        <mss:MobileUser><mss:MSISDN>{msisdn}</mss:MSISDN></mss:MobileUser>
        {signature}
        <mss:SignatureProfile><mss:mssURI>http://mid.swisscom.ch/MID/v1/AuthProfile1</mss:mssURI></mss:SignatureProfile>
        <mss:Status><mss:StatusCode Value="{code}"/><mss:StatusMessage>{message}</mss:StatusMessage></mss:Status>
      </mss:MSS_SignatureResp>
    </MSS_SignatureResponse>
  </soapenv:Body>
</soapenv:Envelope>"#
    )
}

pub fn status_response(trans_id: &str, msisdn: &str, code: &str, message: &str, signature: &str) -> String {
    let signature = signature_element(signature);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope">
<soapenv:Body>
  <MSS_StatusQueryResponse xmlns="http://uri.etsi.org/TS102204/etsi204-kiuru.wsdl">
    <MSS_StatusResp xmlns="" xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#" MajorVersion="1" MinorVersion="1">
      <mss:AP_Info AP_ID="mid://dev.swisscom.ch" AP_TransID="{trans_id}" AP_PWD="" Instant="2030-06-01T09:00:05.000+02:00"/>
      <mss:MobileUser><mss:MSISDN>{msisdn}</mss:MSISDN></mss:MobileUser>
      {signature}
      <mss:Status><mss:StatusCode Value="{code}"/><mss:StatusMessage>{message}</mss:StatusMessage></mss:Status>
    </MSS_StatusResp>
  </MSS_StatusQueryResponse>
</soapenv:Body>
</soapenv:Envelope>"#
    )
}

pub fn fault_body(subcode: &str, reason: &str, portal_url: Option<&str>) -> String {
    let assistance = portal_url
        .map(|url| {
            format!(
                r#"<ns2:UserAssistance xmlns:ns2="http://www.swisscom.ch/TS102204/ext/v1.0.0"><ns2:PortalUrl>{url}</ns2:PortalUrl></ns2:UserAssistance>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope">
  <soapenv:Body>
    <soapenv:Fault>
      <soapenv:Code>
        <soapenv:Value>soapenv:Receiver</soapenv:Value>
        <soapenv:Subcode xmlns:mss="http://uri.etsi.org/TS102204/v1.1.2#"><soapenv:Value>{subcode}</soapenv:Value></soapenv:Subcode>
      </soapenv:Code>
      <soapenv:Reason><soapenv:Text xml:lang="en">{reason}</soapenv:Text></soapenv:Reason>
      <soapenv:Detail><ns1:detail xmlns:ns1="http://kiuru.methics.fi/mssp">{reason}</ns1:detail>{assistance}</soapenv:Detail>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#
    )
}

/// `100 REQUEST_OK` to an asynchronous signature request.
pub fn accepted() -> Reply {
    Box::new(|sent| {
        Ok(HttpResponse::new(
            200,
            signature_response(&sent.ap_trans_id, &sent.msisdn, "100", "REQUEST_OK", ""),
        ))
    })
}

/// `500 SIGNATURE` straight away.
pub fn signed_at_once(signature: &'static str) -> Reply {
    Box::new(move |sent| {
        Ok(HttpResponse::new(
            200,
            signature_response(&sent.ap_trans_id, &sent.msisdn, "500", "SIGNATURE", signature),
        ))
    })
}

pub fn outstanding() -> Reply {
    Box::new(|sent| {
        Ok(HttpResponse::new(
            200,
            status_response(&sent.ap_trans_id, &sent.msisdn, "504", "OUTSTANDING_TRANSACTION", ""),
        ))
    })
}

pub fn poll_signed(signature: &'static str) -> Reply {
    Box::new(move |sent| {
        Ok(HttpResponse::new(
            200,
            status_response(&sent.ap_trans_id, &sent.msisdn, "500", "SIGNATURE", signature),
        ))
    })
}

/// Answers with a trans id other than the one sent.
pub fn poll_signed_for_other_transaction(signature: &'static str) -> Reply {
    Box::new(move |sent| {
        Ok(HttpResponse::new(
            200,
            status_response("X000000", &sent.msisdn, "500", "SIGNATURE", signature),
        ))
    })
}

pub fn fault(subcode: &'static str, reason: &'static str, portal_url: Option<&'static str>) -> Reply {
    Box::new(move |_| Ok(HttpResponse::new(500, fault_body(subcode, reason, portal_url))))
}

pub fn user_cancel() -> Reply {
    fault("mss:_401", "USER_CANCEL", None)
}

pub fn unreachable() -> Reply {
    Box::new(|_| Err(TransportError::new("connection refused")))
}
