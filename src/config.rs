//! Settings of the client and of the authentication sessions, read from TOML.
//!
//! Every field has a default, so a file only needs to name what it changes. The AP id
//! is the one value without a usable default and [Config::validate] insists on it.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    definitions::{request::DEFAULT_TIMEOUT_SECONDS, UserLanguage},
    identity::SerialNumberPolicy,
    transport::TransportSettings,
    wire::{DEFAULT_SERVICE_URL_PREFIX, DEFAULT_SIGNATURE_PROFILE},
};

/// Longest request timeout the service accepts.
pub const MAX_REQUEST_TIMEOUT_SECONDS: u32 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("ap_id must be set")]
    ApIdMissing,
    #[error("ap_id contains characters that are not XML-safe")]
    ApIdNotXmlSafe,
    #[error("request_timeout_seconds must be between 1 and 300, got {0}")]
    RequestTimeout(u32),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("invalid sanitize_pattern: {0}")]
    SanitizePattern(#[from] regex::Error),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientSettings,
    pub session: SessionSettings,
    pub transport: TransportSettings,
}

impl Config {
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&toml)?;
        tracing::info!(
            "configuration loaded from {}: ap_id={}, policy={}",
            path.display(),
            config.client.ap_id,
            config.client.serial_number_policy
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        self.session.validate()
    }
}

/// How requests to the service are built and how their answers are checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Identifier of this application provider, assigned by the service.
    pub ap_id: String,
    pub service_url_prefix: String,
    pub signature_profile: String,
    /// How long the user has to answer, sent to the service and bounding the poll loop.
    pub request_timeout_seconds: u32,
    /// Wait before the first poll.
    pub poll_response_delay_seconds: u32,
    pub poll_response_interval_seconds: u32,
    pub serial_number_policy: SerialNumberPolicy,
    /// Skip the certificate chain check; the signer certificate dates are checked instead.
    pub disable_signature_validation: bool,
    pub disable_signature_cert_validation: bool,
    /// Ask the service to validate the signature as well.
    pub server_side_validation: bool,
    pub enable_subscriber_info: bool,
    /// Mixed into every generated AP_TransID.
    pub seed_ap_trans_id: String,
    /// PEM files with the CA certificates that issue user certificates.
    pub trust_anchors: Vec<PathBuf>,
    pub sanitize_phone_number: bool,
    pub sanitize_pattern: String,
    pub sanitize_replacement: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ap_id: String::new(),
            service_url_prefix: DEFAULT_SERVICE_URL_PREFIX.to_string(),
            signature_profile: DEFAULT_SIGNATURE_PROFILE.to_string(),
            request_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            poll_response_delay_seconds: 3,
            poll_response_interval_seconds: 1,
            serial_number_policy: SerialNumberPolicy::default(),
            disable_signature_validation: false,
            disable_signature_cert_validation: false,
            server_side_validation: false,
            enable_subscriber_info: false,
            seed_ap_trans_id: "Some ASCII text to be used to build the unique AP_TransId in request"
                .to_string(),
            trust_anchors: Vec::new(),
            sanitize_phone_number: false,
            sanitize_pattern: r"\D".to_string(),
            sanitize_replacement: String::new(),
        }
    }
}

impl ClientSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ap_id.trim().is_empty() {
            return Err(ConfigError::ApIdMissing);
        }
        if !crate::definitions::request::is_xml_safe(&self.ap_id) {
            return Err(ConfigError::ApIdNotXmlSafe);
        }
        if !(1..=MAX_REQUEST_TIMEOUT_SECONDS).contains(&self.request_timeout_seconds) {
            return Err(ConfigError::RequestTimeout(self.request_timeout_seconds));
        }
        if self.poll_response_interval_seconds == 0 {
            return Err(ConfigError::NotPositive("poll_response_interval_seconds"));
        }
        Regex::new(&self.sanitize_pattern)?;
        Ok(())
    }

    /// The certificate chain is checked only when neither switch turns it off.
    pub fn chain_validation_enabled(&self) -> bool {
        !self.disable_signature_validation && !self.disable_signature_cert_validation
    }

    /// Apply the sanitize rule to a phone number read from the attribute store.
    /// Without sanitizing, the number is returned as is.
    pub fn sanitize_phone_number(&self, phone_number: &str) -> Result<String, ConfigError> {
        if !self.sanitize_phone_number {
            return Ok(phone_number.to_string());
        }
        let pattern = Regex::new(&self.sanitize_pattern)?;
        let sanitized = pattern
            .replace_all(phone_number, self.sanitize_replacement.as_str())
            .into_owned();
        tracing::debug!("phone number '{phone_number}' sanitized to '{sanitized}'");
        Ok(sanitized)
    }
}

/// Budgets and texts of an authentication session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Requests served by one HTTP client before it is rebuilt.
    pub web_client_max_requests: u32,
    pub session_timeout_seconds: u32,
    /// Attempts allowed per session, the first one included.
    pub session_max_tries: u32,
    /// Show technical details of errors to the user.
    pub show_debug_message: bool,
    pub login_nonce_length: usize,
    /// Prepended to every challenge, usually the name of the service.
    pub dtbs_prefix: String,
    pub default_language: UserLanguage,
    /// Login prompts by language tag. `#TransId#` is replaced by the nonce.
    pub login_prompts: BTreeMap<String, String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            web_client_max_requests: 100,
            session_timeout_seconds: 300,
            session_max_tries: 5,
            show_debug_message: false,
            login_nonce_length: 5,
            dtbs_prefix: String::new(),
            default_language: UserLanguage::En,
            login_prompts: BTreeMap::new(),
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web_client_max_requests == 0 {
            return Err(ConfigError::NotPositive("web_client_max_requests"));
        }
        if self.session_max_tries == 0 {
            return Err(ConfigError::NotPositive("session_max_tries"));
        }
        if self.login_nonce_length == 0 {
            return Err(ConfigError::NotPositive("login_nonce_length"));
        }
        Ok(())
    }

    /// The configured prompt for `language`, if any.
    pub fn login_prompt(&self, language: UserLanguage) -> Option<&str> {
        self.login_prompts
            .iter()
            .find(|(tag, _)| tag.eq_ignore_ascii_case(&language.to_string()))
            .map(|(_, prompt)| prompt.as_str())
    }
}
