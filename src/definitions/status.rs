//! Status codes returned by the Mobile ID service, plus the codes the client
//! produces locally for transport, parsing, configuration and validation failures.
//!
//! Negative codes are client-local. Codes from `100` to `900` are the literal ETSI
//! TS 102 204 codes sent by the service and are re-exported unchanged.
//!
//! Every code maps to exactly one [StatusColor], which the rest of the crate uses
//! to decide whether an outcome may be shown to the user, retried, or treated as a
//! technical error.
use serde::Serialize;
use strum_macros::{Display, EnumIter, FromRepr, IntoStaticStr};

/// Severity of a [StatusCode].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum StatusColor {
    /// Success, or an expected terminal state such as a user cancel.
    Green,
    /// A known failure that can be explained to the user.
    Yellow,
    /// A technical error.
    Red,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumIter,
    FromRepr,
    IntoStaticStr,
)]
#[repr(i32)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// The service response does not carry the user's certificate.
    UserCertAbsent = -508,
    /// The user's certificate has expired according to the local clock.
    UserCertExpired = -507,
    /// The user's certificate is not yet valid according to the local clock.
    UserCertNotYetValid = -506,
    /// The signature in the response is invalid or could not be verified locally.
    InvalidResponseSignature = -505,
    /// The response has an unknown format.
    UnknownResponse = -504,
    /// The MSISDN in the response differs from the one in the request.
    MismatchedMsisdn = -503,
    /// The AP_TransID in the response differs from the one in the request.
    MismatchedApTransId = -502,
    /// A known status code was received where it is not allowed.
    IllegalStatusCode = -501,
    /// An unknown status code was received.
    UnsupportedStatusCode = -500,
    /// No serial number is registered for the user.
    UserSerialNumberNotRegistered = -404,
    /// The serial number in the user's certificate differs from the registered one.
    UserSerialNumberMismatch = -403,
    ConfigError = -402,
    /// The input of a service call is invalid or incomplete.
    InvalidInput = -401,
    GeneralClientError = -400,
    /// No connection to the service could be set up, or it broke down.
    CommSetupError = -300,
    DoNotUse = 0,

    RequestOk = 100,
    WrongParam = 101,
    MissingParam = 102,
    WrongDataLength = 103,
    UnauthorizedAccess = 104,
    UnknownClient = 105,
    InappropriateData = 107,
    IncompatibleInterface = 108,
    UnsupportedProfile = 109,
    ExpiredTransaction = 208,
    OtaError = 209,
    UserCancel = 401,
    PinNrBlocked = 402,
    CardBlocked = 403,
    NoKeyFound = 404,
    PbSignatureProcess = 406,
    NoCertFound = 422,
    Signature = 500,
    RevokedCertificate = 501,
    ValidSignature = 502,
    InvalidSignature = 503,
    OutstandingTransaction = 504,
    InternalError = 900,
}

impl StatusCode {
    /// Look up a numeric code. Unknown numbers yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_repr(code)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Codes in the range sent by the service, as opposed to client-local codes.
    pub fn is_remote(self) -> bool {
        self.code() >= 100
    }

    /// The canonical name of the code, e.g. `SIGNATURE` for `500`.
    ///
    /// The service sends this text in `StatusMessage` and in the SOAP fault reason.
    /// It is allowed to vary the wording, so a difference is only worth a warning.
    pub fn canonical_message(self) -> &'static str {
        self.into()
    }

    pub fn color(self) -> StatusColor {
        use StatusCode::*;
        match self {
            Signature | ValidSignature | UserCancel | RequestOk => StatusColor::Green,
            UnknownClient
            | UnsupportedProfile
            | PinNrBlocked
            | CardBlocked
            | NoKeyFound
            | NoCertFound
            | ExpiredTransaction
            | PbSignatureProcess
            | RevokedCertificate
            | InvalidSignature
            | OtaError
            | UserSerialNumberNotRegistered
            | UserSerialNumberMismatch
            | UserCertAbsent
            | UserCertNotYetValid
            | UserCertExpired => StatusColor::Yellow,
            InvalidResponseSignature
            | UnknownResponse
            | MismatchedMsisdn
            | MismatchedApTransId
            | IllegalStatusCode
            | UnsupportedStatusCode
            | ConfigError
            | InvalidInput
            | GeneralClientError
            | CommSetupError
            | DoNotUse
            | WrongParam
            | MissingParam
            | WrongDataLength
            | UnauthorizedAccess
            | InappropriateData
            | IncompatibleInterface
            | OutstandingTransaction
            | InternalError => StatusColor::Red,
        }
    }

    /// Outcomes after which a new attempt may be offered to the user.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::UserCancel | Self::ExpiredTransaction | Self::PbSignatureProcess
        )
    }

    /// A successfully completed signature.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Signature | Self::ValidSignature)
    }
}

/// A status code paired with its message.
///
/// The message is always derived from the code, so a mismatched pair cannot be
/// constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    code: StatusCode,
}

impl Status {
    pub fn new(code: StatusCode) -> Self {
        Self { code }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &'static str {
        self.code.canonical_message()
    }

    pub fn color(&self) -> StatusColor {
        self.code.color()
    }
}

impl From<StatusCode> for Status {
    fn from(code: StatusCode) -> Self {
        Self::new(code)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.message(),
            self.code.code(),
            self.color()
        )
    }
}

#[cfg(test)]
mod test {
    use strum::IntoEnumIterator;

    use super::{Status, StatusCode, StatusColor};

    #[test]
    fn codes_round_trip_through_numbers() {
        for code in StatusCode::iter() {
            assert_eq!(StatusCode::from_code(code.code()), Some(code));
        }
        assert_eq!(StatusCode::from_code(106), None);
        assert_eq!(StatusCode::from_code(-301), None);
    }

    #[test]
    fn canonical_messages_match_service_wording() {
        assert_eq!(StatusCode::RequestOk.canonical_message(), "REQUEST_OK");
        assert_eq!(StatusCode::Signature.canonical_message(), "SIGNATURE");
        assert_eq!(
            StatusCode::OutstandingTransaction.canonical_message(),
            "OUTSTANDING_TRANSACTION"
        );
        assert_eq!(
            StatusCode::PbSignatureProcess.canonical_message(),
            "PB_SIGNATURE_PROCESS"
        );
        assert_eq!(StatusCode::PinNrBlocked.canonical_message(), "PIN_NR_BLOCKED");
    }

    #[test]
    fn colors() {
        assert_eq!(StatusCode::UserCancel.color(), StatusColor::Green);
        assert_eq!(StatusCode::NoKeyFound.color(), StatusColor::Yellow);
        assert_eq!(StatusCode::UnsupportedProfile.color(), StatusColor::Yellow);
        assert_eq!(StatusCode::UserCertExpired.color(), StatusColor::Yellow);
        assert_eq!(StatusCode::OutstandingTransaction.color(), StatusColor::Red);
        assert_eq!(StatusCode::MismatchedApTransId.color(), StatusColor::Red);
        assert_eq!(StatusCode::InternalError.color(), StatusColor::Red);
    }

    #[test]
    fn remote_range() {
        assert!(StatusCode::RequestOk.is_remote());
        assert!(!StatusCode::CommSetupError.is_remote());
        assert!(!StatusCode::DoNotUse.is_remote());
    }

    #[test]
    fn status_display() {
        let status = Status::new(StatusCode::CardBlocked);
        assert_eq!(status.to_string(), "CARD_BLOCKED (403, Yellow)");
    }
}
