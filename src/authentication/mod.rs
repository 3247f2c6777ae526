//! One authentication session: an asynchronous signature request, the polls that
//! follow it and the retries the user asks for.
//!
//! The caller renders the [Outcome] of each step and calls back with the
//! [SessionContext] it got from [Authenticator::begin_attempt]. Polling blocks the
//! calling thread; sessions of different users share nothing but the
//! [Authenticator].
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    client::MobileIdClient,
    config::SessionSettings,
    definitions::{
        request::normalize_phone_number, AuthRequest, AuthResponse, ServiceExtension,
        StatusCode, StatusColor, UserLanguage,
    },
    transport::Transport,
};

pub mod clock;
pub mod prompt;

pub use clock::{Clock, ManualClock, SystemClock};

/// Authentication method claimed for a successful login.
pub const AUTHENTICATION_METHOD_HARDWARE_TOKEN: &str =
    "http://schemas.microsoft.com/ws/2008/06/identity/authenticationmethod/hardwaretoken";

type NonceGenerator = Box<dyn Fn(usize) -> String + Send + Sync>;

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtocolState {
    Idle,
    /// The service accepted an asynchronous request; the answer must be polled.
    Polling,
    Signed,
    Cancelled,
    /// The service gave up on the request, or the poll loop ran out of time.
    Expired,
    TechnicalError,
    /// The session budget is spent.
    AutoLogout,
}

impl ProtocolState {
    /// States from which the user may start another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }

    /// The state after a status for which [StatusCode::is_retryable] holds.
    fn after_retryable(code: StatusCode) -> Self {
        if code == StatusCode::UserCancel {
            Self::Cancelled
        } else {
            Self::Expired
        }
    }
}

/// What a successful login asserts about the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub authentication_method: &'static str,
    pub phone_number: String,
    pub serial_number: Option<String>,
    pub signer_name: Option<String>,
    pub mssp_trans_id: Option<String>,
    /// MCC and MNC of the user's network, when subscriber info was requested.
    pub mobile_network: Option<String>,
}

impl Claims {
    fn from_response(phone_number: &str, response: &AuthResponse) -> Self {
        Self {
            authentication_method: AUTHENTICATION_METHOD_HARDWARE_TOKEN,
            phone_number: phone_number.to_string(),
            serial_number: response.signer_serial_number().map(str::to_string),
            signer_name: response.signer_display_name().map(str::to_string),
            mssp_trans_id: response.mssp_trans_id().map(str::to_string),
            mobile_network: response
                .extension(ServiceExtension::SubscriberInfo)
                .map(str::to_string),
        }
    }
}

/// Result of one step, for the caller to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Signed(Claims),
    /// Ask the user to answer on the phone, then call
    /// [Authenticator::continue_attempt] after `poll_delay_ms`.
    Pending {
        display_text: String,
        correlation_id: String,
        poll_delay_ms: u64,
    },
    Failed {
        display_text: String,
    },
    RetryOffered {
        display_text: String,
    },
    AutoLogout,
}

/// The state kept between the steps of a session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: ProtocolState,
    mssp_trans_id: Option<String>,
    /// Challenge of the current attempt; polls verify the signature against it.
    data_to_be_signed: String,
    nonce: String,
    session_started: OffsetDateTime,
    attempt_started: OffsetDateTime,
    tries: u32,
    phone_number: String,
    expected_serial_number: Option<String>,
    language: UserLanguage,
    claims: Option<Claims>,
}

impl SessionContext {
    fn new(
        phone_number: String,
        expected_serial_number: Option<String>,
        language: UserLanguage,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            state: ProtocolState::Idle,
            mssp_trans_id: None,
            data_to_be_signed: String::new(),
            nonce: String::new(),
            session_started: now,
            attempt_started: now,
            tries: 0,
            phone_number,
            expected_serial_number,
            language,
            claims: None,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn mssp_trans_id(&self) -> Option<&str> {
        self.mssp_trans_id.as_deref()
    }

    pub fn data_to_be_signed(&self) -> &str {
        &self.data_to_be_signed
    }

    /// Attempts made in this session, the first one included.
    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn language(&self) -> UserLanguage {
        self.language
    }
}

/// Runs authentication sessions against the service.
pub struct Authenticator<T, K = SystemClock> {
    client: MobileIdClient<T>,
    settings: SessionSettings,
    clock: K,
    nonce: NonceGenerator,
}

impl<T: Transport, K: Clock> Authenticator<T, K> {
    pub fn new(client: MobileIdClient<T>, settings: SessionSettings, clock: K) -> Self {
        Self {
            client,
            settings,
            clock,
            nonce: Box::new(prompt::random_nonce),
        }
    }

    /// Replace the generator of the nonce embedded in each challenge.
    pub fn with_nonce_generator(
        mut self,
        generator: impl Fn(usize) -> String + Send + Sync + 'static,
    ) -> Self {
        self.nonce = Box::new(generator);
        self
    }

    pub fn client(&self) -> &MobileIdClient<T> {
        &self.client
    }

    /// Start a session for the user with `phone_number` and send the first request.
    ///
    /// `expected_serial_number` is the serial number registered for the user, if any.
    /// `language_tag` picks the language of the challenge; unknown tags fall back to
    /// the configured default.
    pub fn begin_attempt(
        &self,
        expected_serial_number: Option<&str>,
        phone_number: &str,
        language_tag: &str,
    ) -> (SessionContext, Outcome) {
        let client_settings = self.client.settings();
        let policy = client_settings.serial_number_policy;
        let needs_serial_number =
            !policy.allow_absence || !policy.allow_mismatch || policy.warn_on_mismatch;
        let expected = expected_serial_number
            .filter(|_| needs_serial_number)
            .map(str::to_string);
        let language = self.language(language_tag);
        let now = self.clock.now();

        let normalized = client_settings
            .sanitize_phone_number(phone_number)
            .map_err(|e| {
                tracing::error!("unable to sanitize phone number: {e}");
                AuthResponse::with_detail(StatusCode::ConfigError, e.to_string())
            })
            .and_then(|sanitized| {
                normalize_phone_number(&sanitized).map_err(|e| {
                    tracing::warn!("unusable phone number '{sanitized}': {e}");
                    AuthResponse::with_detail(StatusCode::InvalidInput, e.to_string())
                })
            });
        let phone_number = match normalized {
            Ok(normalized) => normalized,
            Err(response) => {
                let mut context =
                    SessionContext::new(phone_number.to_string(), expected, language, now);
                let outcome = self.fail(&mut context, &response);
                return (context, outcome);
            }
        };

        let mut context = SessionContext::new(phone_number, expected, language, now);
        context.tries = 1;
        tracing::info!(
            target: "audit",
            "authentication started for {}, language={language}",
            context.phone_number
        );
        let outcome = self.send_attempt(&mut context, now);
        (context, outcome)
    }

    /// Poll until the user answers, the service gives up or the request times out.
    pub fn continue_attempt(&self, context: &mut SessionContext) -> Outcome {
        match context.state {
            ProtocolState::Signed => {
                if let Some(claims) = &context.claims {
                    return Outcome::Signed(claims.clone());
                }
            }
            ProtocolState::Polling => return self.poll_loop(context),
            _ => {}
        }
        self.bad_state("continue_attempt", context)
    }

    /// Start a new attempt in the same session, if its budget allows.
    pub fn retry_attempt(&self, context: &mut SessionContext) -> Outcome {
        if context.state == ProtocolState::AutoLogout {
            return Outcome::AutoLogout;
        }
        if !context.state.is_retryable() {
            return self.bad_state("retry_attempt", context);
        }

        let now = self.clock.now();
        let session_age = (now - context.session_started).whole_seconds();
        if session_age >= i64::from(self.settings.session_timeout_seconds)
            || context.tries >= self.settings.session_max_tries
        {
            tracing::info!(
                target: "audit",
                "session of {} ended after {} tries and {session_age}s",
                context.phone_number,
                context.tries
            );
            context.state = ProtocolState::AutoLogout;
            return Outcome::AutoLogout;
        }

        context.tries += 1;
        tracing::debug!("retry {} for {}", context.tries, context.phone_number);
        self.send_attempt(context, now)
    }

    fn send_attempt(&self, context: &mut SessionContext, now: OffsetDateTime) -> Outcome {
        let nonce = (self.nonce)(self.settings.login_nonce_length);
        let dtbs = prompt::challenge(&self.settings, context.language, &nonce);
        context.nonce = nonce;
        context.data_to_be_signed = dtbs;
        context.attempt_started = now;
        context.mssp_trans_id = None;
        context.claims = None;

        let mut request = match self.request(context) {
            Ok(request) => request,
            Err(response) => return self.fail(context, &response),
        };
        let response = self.client.request_signature(&mut request, true, now);
        let code = response.code();

        if code.is_signed() {
            return self.signed(context, &response);
        }
        match code {
            StatusCode::RequestOk => match response.mssp_trans_id() {
                Some(mssp_trans_id) => {
                    context.state = ProtocolState::Polling;
                    context.mssp_trans_id = Some(mssp_trans_id.to_string());
                    Outcome::Pending {
                        display_text: prompt::pending_text(&context.phone_number, &context.nonce),
                        correlation_id: context.nonce.clone(),
                        poll_delay_ms: u64::from(
                            self.client.settings().poll_response_delay_seconds,
                        ) * 1000,
                    }
                }
                None => self.fail(
                    context,
                    &AuthResponse::with_detail(
                        StatusCode::UnknownResponse,
                        "MSS_TransID is missing",
                    ),
                ),
            },
            code if code.is_retryable() => self.offer_retry(context, &response),
            _ => self.fail(context, &response),
        }
    }

    fn poll_loop(&self, context: &mut SessionContext) -> Outcome {
        let timeout = i64::from(self.client.settings().request_timeout_seconds);
        let interval = u64::from(self.client.settings().poll_response_interval_seconds);
        let Some(mssp_trans_id) = context.mssp_trans_id.clone() else {
            return self.bad_state("continue_attempt", context);
        };

        let mut polls = 0u32;
        loop {
            let now = self.clock.now();
            let elapsed = (now - context.attempt_started).whole_seconds();
            if elapsed >= timeout {
                break;
            }

            let mut request = match self.request(context) {
                Ok(request) => request,
                Err(response) => return self.fail(context, &response),
            };
            let response = self.client.poll_signature(&mut request, &mssp_trans_id, now);
            polls += 1;
            let code = response.code();
            if code.is_signed() {
                return self.signed(context, &response);
            }
            match code {
                StatusCode::OutstandingTransaction => {
                    tracing::trace!("poll {polls}: outstanding after {elapsed}s");
                    self.clock.sleep(Duration::from_secs(interval));
                }
                code if code.is_retryable() => return self.offer_retry(context, &response),
                _ => return self.fail(context, &response),
            }
        }

        tracing::info!(
            target: "audit",
            "no answer from {} within {timeout}s after {polls} polls, mssp_trans_id={mssp_trans_id}",
            context.phone_number
        );
        context.state = ProtocolState::Expired;
        if polls == 0 && context.tries >= self.settings.session_max_tries {
            return Outcome::Failed {
                display_text: prompt::TIMEOUT_TEXT.to_string(),
            };
        }
        Outcome::RetryOffered {
            display_text: prompt::TIMEOUT_TEXT.to_string(),
        }
    }

    /// A request for the current attempt. Polls use a fresh one, so each call gets its
    /// own AP_TransID.
    fn request(&self, context: &SessionContext) -> Result<AuthRequest, AuthResponse> {
        let client_settings = self.client.settings();
        let build = || -> Result<AuthRequest, crate::definitions::RequestError> {
            let mut request = AuthRequest::new(&context.phone_number, &context.data_to_be_signed)?;
            request.set_timeout_seconds(client_settings.request_timeout_seconds)?;
            request.set_user_serial_number(context.expected_serial_number.as_deref());
            request.set_language(context.language);
            request.set_server_side_validation(client_settings.server_side_validation);
            Ok(request)
        };
        build().map_err(|e| {
            tracing::warn!("unable to build request for {}: {e}", context.phone_number);
            AuthResponse::with_detail(StatusCode::InvalidInput, e.to_string())
        })
    }

    fn signed(&self, context: &mut SessionContext, response: &AuthResponse) -> Outcome {
        let claims = Claims::from_response(&context.phone_number, response);
        tracing::info!(
            target: "audit",
            "authentication of {} succeeded after {} tries, serial_number={}",
            context.phone_number,
            context.tries,
            claims.serial_number.as_deref().unwrap_or_default()
        );
        context.state = ProtocolState::Signed;
        context.mssp_trans_id = claims.mssp_trans_id.clone();
        context.claims = Some(claims.clone());
        Outcome::Signed(claims)
    }

    fn offer_retry(&self, context: &mut SessionContext, response: &AuthResponse) -> Outcome {
        context.state = ProtocolState::after_retryable(response.code());
        Outcome::RetryOffered {
            display_text: self.display_text(context, response),
        }
    }

    fn fail(&self, context: &mut SessionContext, response: &AuthResponse) -> Outcome {
        let code = response.code();
        if code.color() == StatusColor::Red {
            tracing::error!(
                "authentication of {} failed: {} ({code}), detail={}",
                context.phone_number,
                code.code(),
                response.detail().unwrap_or_default()
            );
        } else {
            tracing::warn!(
                "authentication of {} failed: {} ({code})",
                context.phone_number,
                code.code()
            );
        }
        context.state = ProtocolState::TechnicalError;
        Outcome::Failed {
            display_text: self.display_text(context, response),
        }
    }

    fn bad_state(&self, operation: &str, context: &SessionContext) -> Outcome {
        tracing::error!(
            "{operation} called in state {:?} for {}",
            context.state,
            context.phone_number
        );
        let response = AuthResponse::with_detail(
            StatusCode::GeneralClientError,
            format!("{operation} is not allowed in state {:?}", context.state),
        );
        Outcome::Failed {
            display_text: self.display_text(context, &response),
        }
    }

    fn display_text(&self, context: &SessionContext, response: &AuthResponse) -> String {
        prompt::display_text(response, context.language, self.settings.show_debug_message)
    }

    fn language(&self, tag: &str) -> UserLanguage {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        primary.parse().unwrap_or(self.settings.default_language)
    }
}
