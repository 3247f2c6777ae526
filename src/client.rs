//! The web client of the service: renders a request, posts it, reads the answer and
//! accepts or rejects the signer.
//!
//! Both calls return an [AuthResponse] in every case. Failures of any layer are
//! folded into its status, so callers branch on the status code only.
use anyhow::{bail, Context};
use time::OffsetDateTime;

use crate::{
    config::ClientSettings,
    definitions::{
        x509::{validation::ValidationOptions, SignatureVerifier, TrustAnchorRegistry},
        AuthRequest, AuthResponse, StatusCode, StatusColor,
    },
    identity::IdentityPolicy,
    transport::Transport,
    wire::{
        parse::ResponseCheck,
        parse_fault, parse_signature_response, parse_status_response,
        template::{signature_request, status_request, MessagingMode, SignatureTemplate},
        Port, SoapCall,
    },
};

pub struct MobileIdClient<T> {
    settings: ClientSettings,
    transport: T,
    verifier: SignatureVerifier,
    policy: IdentityPolicy,
}

impl<T: Transport> MobileIdClient<T> {
    pub fn new(settings: ClientSettings, trust_anchors: TrustAnchorRegistry, transport: T) -> Self {
        let verifier = SignatureVerifier::new(trust_anchors, settings.chain_validation_enabled());
        let policy = IdentityPolicy {
            serial_number: settings.serial_number_policy,
            check_certificate_time: !settings.chain_validation_enabled(),
        };
        Self {
            settings,
            transport,
            verifier,
            policy,
        }
    }

    /// Build a client whose trust anchors are read from the files named in `settings`.
    pub fn from_settings(settings: ClientSettings, transport: T) -> anyhow::Result<Self> {
        let trust_anchors = TrustAnchorRegistry::from_pem_files(&settings.trust_anchors)
            .context("unable to load trust anchors")?;
        if trust_anchors.is_empty() && settings.chain_validation_enabled() {
            bail!("certificate chain validation is enabled but no trust anchor is configured");
        }
        Ok(Self::new(settings, trust_anchors, transport))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send an `MSS_SignatureReq` and read the answer.
    ///
    /// Missing AP id and trans id are filled in from the settings. `now` is the time
    /// the signer certificate is checked at.
    pub fn request_signature(
        &self,
        request: &mut AuthRequest,
        asynchronous: bool,
        now: OffsetDateTime,
    ) -> AuthResponse {
        tracing::debug!(
            "request_signature(phone_number={}, asynchronous={asynchronous})",
            request.phone_number().unwrap_or_default()
        );
        if request.validate_complete().is_err() {
            return AuthResponse::with_detail(StatusCode::InvalidInput, "Input is incomplete");
        }
        if let Err(code) = self
            .policy
            .serial_number
            .precheck(request.user_serial_number())
        {
            tracing::warn!(
                target: "audit",
                "no serial number registered for {}, request not sent",
                request.phone_number().unwrap_or_default()
            );
            return AuthResponse::new(code);
        }
        if let Err(response) = self.fill_in(request) {
            return response;
        }

        let mode = MessagingMode::from_asynchronous(asynchronous);
        let template = SignatureTemplate {
            signature_profile: &self.settings.signature_profile,
            subscriber_info: self.settings.enable_subscriber_info,
        };
        let body = match signature_request(request, &template, mode) {
            Ok(body) => body,
            Err(e) => return AuthResponse::with_detail(StatusCode::InvalidInput, e.to_string()),
        };

        let validation = ValidationOptions::at(now);
        let check = ResponseCheck {
            request,
            verifier: &self.verifier,
            validation: &validation,
        };
        let mut response = match self.post(Port::Signature, body) {
            Ok((200, body)) => parse_signature_response(&body, &check, mode),
            Ok((status, body)) => parse_fault(&body, status, mode),
            Err(response) => response,
        };
        self.accept_signer(&mut response, request, now);
        log_outcome("request_signature", request, &response);
        response
    }

    /// Send an `MSS_StatusReq` for the transaction `mssp_trans_id`.
    ///
    /// The signature in the answer is verified against the challenge of `request`,
    /// which must be the one of the signature request being polled.
    pub fn poll_signature(
        &self,
        request: &mut AuthRequest,
        mssp_trans_id: &str,
        now: OffsetDateTime,
    ) -> AuthResponse {
        tracing::debug!("poll_signature(mssp_trans_id={mssp_trans_id})");
        if request.validate_complete().is_err() {
            return AuthResponse::with_detail(StatusCode::InvalidInput, "Input is incomplete");
        }
        if mssp_trans_id.is_empty() {
            return AuthResponse::with_detail(
                StatusCode::InvalidInput,
                "msspTransId is null or empty",
            );
        }
        if let Err(response) = self.fill_in(request) {
            return response;
        }

        let body = match status_request(request, mssp_trans_id) {
            Ok(body) => body,
            Err(e) => return AuthResponse::with_detail(StatusCode::InvalidInput, e.to_string()),
        };

        let validation = ValidationOptions::at(now);
        let check = ResponseCheck {
            request,
            verifier: &self.verifier,
            validation: &validation,
        };
        let mut response = match self.post(Port::StatusQuery, body) {
            Ok((200, body)) => parse_status_response(&body, &check, mssp_trans_id),
            Ok((status, body)) => {
                parse_fault(&body, status, MessagingMode::AsynchronousClientServer)
            }
            Err(response) => response,
        };
        self.accept_signer(&mut response, request, now);
        if response.code() != StatusCode::OutstandingTransaction {
            log_outcome("poll_signature", request, &response);
        }
        response
    }

    fn fill_in(&self, request: &mut AuthRequest) -> Result<(), AuthResponse> {
        if request.ap_id().is_none() {
            request.set_ap_id(&self.settings.ap_id).map_err(|e| {
                tracing::error!("AP id from the settings is unusable: {e}");
                AuthResponse::with_detail(StatusCode::ConfigError, e.to_string())
            })?;
        }
        request.ensure_trans_id(&self.settings.seed_ap_trans_id);
        Ok(())
    }

    fn post(&self, port: Port, body: String) -> Result<(u16, String), AuthResponse> {
        let call = SoapCall::new(&self.settings.service_url_prefix, port, body);
        match self.transport.post(&call) {
            Ok(response) => Ok((response.status, response.body)),
            Err(e) => {
                tracing::error!(
                    "{} failed: {e} (status {:?})",
                    port.name(),
                    e.status
                );
                Err(AuthResponse::with_detail(
                    StatusCode::CommSetupError,
                    e.message,
                ))
            }
        }
    }

    fn accept_signer(&self, response: &mut AuthResponse, request: &AuthRequest, now: OffsetDateTime) {
        if response.code().is_signed() {
            self.policy
                .apply(response, request.user_serial_number(), now);
        }
    }
}

fn log_outcome(operation: &str, request: &AuthRequest, response: &AuthResponse) {
    let trans_id = request.trans_id().unwrap_or_default();
    let phone_number = request.phone_number().unwrap_or_default();
    let mssp_trans_id = response.mssp_trans_id().unwrap_or_default();
    let code = response.code();
    if code.is_signed() {
        tracing::info!(
            target: "audit",
            "{operation}: signed, trans_id={trans_id}, mssp_trans_id={mssp_trans_id}, phone_number={phone_number}, serial_number={}",
            response.signer_serial_number().unwrap_or_default()
        );
    } else if code == StatusCode::RequestOk {
        tracing::info!(
            target: "audit",
            "{operation}: pending, trans_id={trans_id}, mssp_trans_id={mssp_trans_id}, phone_number={phone_number}"
        );
    } else if code.color() == StatusColor::Red {
        tracing::error!(
            target: "audit",
            "{operation}: {} ({}), trans_id={trans_id}, mssp_trans_id={mssp_trans_id}, phone_number={phone_number}, detail={}",
            code.code(),
            code,
            response.detail().unwrap_or_default()
        );
    } else {
        tracing::warn!(
            target: "audit",
            "{operation}: {} ({}), trans_id={trans_id}, mssp_trans_id={mssp_trans_id}, phone_number={phone_number}, detail={}",
            code.code(),
            code,
            response.detail().unwrap_or_default()
        );
    }
}
