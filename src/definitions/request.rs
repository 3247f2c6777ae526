//! The authentication request sent to the Mobile ID service.
//!
//! Every setter validates its input and rejects malformed values immediately, so a
//! request that exists is always safe to interpolate into the SOAP templates.
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{Display, EnumIter, EnumString};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

/// Maximum length of the challenge when it only uses the GSM 03.38 default alphabet.
pub const MAX_GSM_CHARS_DTBS: usize = 239;
/// Maximum length of the challenge in any other case.
pub const MAX_UTF8_CHARS_DTBS: usize = 119;
pub const MIN_MSISDN_DIGITS: usize = 7;
pub const MAX_MSISDN_DIGITS: usize = 15;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 80;

const INSTANT_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

// GSM 03.38 default alphabet, escape character excluded.
const GSM_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";
// Characters reachable through the escape sequence, each taking two septets.
const GSM_EXTENSION: &str = "\u{0c}^{}\\[~]|€";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("phone number is empty")]
    PhoneNumberEmpty,
    #[error("phone number is ill-formed: '{0}'")]
    PhoneNumberIllFormed(String),
    #[error("data to be signed is empty")]
    DataToBeSignedEmpty,
    #[error("data to be signed has {length} characters, at most {max} are allowed")]
    DataToBeSignedTooLong { length: usize, max: usize },
    #[error("AP id is empty")]
    ApIdEmpty,
    #[error("{0} contains characters that are not XML-safe")]
    NotXmlSafe(&'static str),
    #[error("timeout must be positive")]
    TimeoutNotPositive,
    #[error("instant is ill-formed: '{0}'")]
    InstantIllFormed(String),
    #[error("request is incomplete: {0} is missing")]
    Incomplete(&'static str),
}

/// Language used by the service when it talks to the user's phone.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UserLanguage {
    #[default]
    En,
    De,
    Fr,
    It,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    phone_number: Option<String>,
    data_to_be_signed: Option<String>,
    ap_id: Option<String>,
    timeout_seconds: u32,
    trans_id: Option<String>,
    instant: Option<String>,
    user_serial_number: Option<String>,
    language: UserLanguage,
    server_side_validation: bool,
}

impl Default for AuthRequest {
    fn default() -> Self {
        Self {
            phone_number: None,
            data_to_be_signed: None,
            ap_id: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            trans_id: None,
            instant: None,
            user_serial_number: None,
            language: UserLanguage::default(),
            server_side_validation: false,
        }
    }
}

impl AuthRequest {
    /// Create a request carrying the two mandatory fields.
    pub fn new(phone_number: &str, data_to_be_signed: &str) -> Result<Self, RequestError> {
        let mut request = Self::default();
        request.set_phone_number(phone_number)?;
        request.set_data_to_be_signed(data_to_be_signed)?;
        Ok(request)
    }

    /// A request is complete once both the phone number and the challenge are set.
    pub fn is_complete(&self) -> bool {
        self.phone_number.is_some() && self.data_to_be_signed.is_some()
    }

    pub fn validate_complete(&self) -> Result<(), RequestError> {
        if self.phone_number.is_none() {
            return Err(RequestError::Incomplete("phone number"));
        }
        if self.data_to_be_signed.is_none() {
            return Err(RequestError::Incomplete("data to be signed"));
        }
        Ok(())
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Set the MSISDN. Dashes and spaces are stripped before validation.
    pub fn set_phone_number(&mut self, value: &str) -> Result<(), RequestError> {
        self.phone_number = Some(normalize_phone_number(value)?);
        Ok(())
    }

    pub fn data_to_be_signed(&self) -> Option<&str> {
        self.data_to_be_signed.as_deref()
    }

    pub fn set_data_to_be_signed(&mut self, value: &str) -> Result<(), RequestError> {
        if value.is_empty() {
            return Err(RequestError::DataToBeSignedEmpty);
        }
        let (length, max) = match gsm_length(value) {
            Some(septets) => (septets, MAX_GSM_CHARS_DTBS),
            None => (value.chars().count(), MAX_UTF8_CHARS_DTBS),
        };
        if length > max {
            return Err(RequestError::DataToBeSignedTooLong { length, max });
        }
        self.data_to_be_signed = Some(value.to_string());
        Ok(())
    }

    pub fn ap_id(&self) -> Option<&str> {
        self.ap_id.as_deref()
    }

    pub fn set_ap_id(&mut self, value: &str) -> Result<(), RequestError> {
        if value.is_empty() {
            return Err(RequestError::ApIdEmpty);
        }
        if !is_xml_safe(value) {
            return Err(RequestError::NotXmlSafe("AP id"));
        }
        self.ap_id = Some(value.to_string());
        Ok(())
    }

    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
    }

    pub fn set_timeout_seconds(&mut self, value: u32) -> Result<(), RequestError> {
        if value == 0 {
            return Err(RequestError::TimeoutNotPositive);
        }
        self.timeout_seconds = value;
        Ok(())
    }

    pub fn trans_id(&self) -> Option<&str> {
        self.trans_id.as_deref()
    }

    pub fn set_trans_id(&mut self, value: &str) -> Result<(), RequestError> {
        if !is_xml_safe(value) {
            return Err(RequestError::NotXmlSafe("trans id"));
        }
        self.trans_id = Some(value.to_string());
        Ok(())
    }

    /// Return the trans id, generating one from `seed` if none was set.
    pub fn ensure_trans_id(&mut self, seed: &str) -> &str {
        self.trans_id.get_or_insert_with(|| generate_trans_id(seed))
    }

    pub fn instant(&self) -> Option<&str> {
        self.instant.as_deref()
    }

    pub fn set_instant(&mut self, value: &str) -> Result<(), RequestError> {
        if value.is_empty()
            || !value
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, 'T' | 'Z' | ':' | '.' | '+' | '-'))
        {
            return Err(RequestError::InstantIllFormed(value.to_string()));
        }
        self.instant = Some(value.to_string());
        Ok(())
    }

    /// The caller-supplied instant, or the current UTC time.
    pub fn instant_or_now(&self) -> String {
        match &self.instant {
            Some(instant) => instant.clone(),
            None => current_instant(),
        }
    }

    pub fn user_serial_number(&self) -> Option<&str> {
        self.user_serial_number.as_deref()
    }

    pub fn set_user_serial_number(&mut self, value: Option<&str>) {
        self.user_serial_number = value.map(str::to_string);
    }

    pub fn language(&self) -> UserLanguage {
        self.language
    }

    pub fn set_language(&mut self, language: UserLanguage) {
        self.language = language;
    }

    pub fn server_side_validation(&self) -> bool {
        self.server_side_validation
    }

    pub fn set_server_side_validation(&mut self, value: bool) {
        self.server_side_validation = value;
    }
}

/// Values interpolated into XML attributes must not contain markup characters.
pub fn is_xml_safe(value: &str) -> bool {
    !value.contains(['<', '>', '"', '&'])
}

/// Number of septets `text` takes in the GSM 03.38 default alphabet, or `None` if
/// it cannot be encoded there.
pub fn gsm_length(text: &str) -> Option<usize> {
    text.chars().try_fold(0usize, |length, c| {
        if GSM_BASIC.contains(c) {
            Some(length + 1)
        } else if GSM_EXTENSION.contains(c) {
            Some(length + 2)
        } else {
            None
        }
    })
}

/// `"X"` followed by 128 bits of hex: a hash over a hash of `seed` and 64 random bits.
pub fn generate_trans_id(seed: &str) -> String {
    let seed_hash = Sha256::digest(seed.as_bytes());
    let mut random = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut random);

    let mut hasher = Sha256::new();
    hasher.update(&seed_hash[..8]);
    hasher.update(random);
    let hash = hasher.finalize();
    format!("X{}", hex::encode_upper(&hash[..16]))
}

/// Current UTC time with microsecond precision, e.g. `2024-03-01T10:15:30.123456Z`.
pub fn current_instant() -> String {
    format_instant(OffsetDateTime::now_utc())
}

pub fn format_instant(at: OffsetDateTime) -> String {
    at.format(INSTANT_FORMAT)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// `^\+?\d{7,15}$`
/// The MSISDN as sent to the service: `value` without dashes and spaces.
pub fn normalize_phone_number(value: &str) -> Result<String, RequestError> {
    if value.is_empty() {
        return Err(RequestError::PhoneNumberEmpty);
    }
    let normalized: String = value.chars().filter(|c| *c != '-' && *c != ' ').collect();
    if !is_msisdn(&normalized) {
        return Err(RequestError::PhoneNumberIllFormed(normalized));
    }
    Ok(normalized)
}

fn is_msisdn(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    (MIN_MSISDN_DIGITS..=MAX_MSISDN_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
}
