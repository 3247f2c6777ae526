//! Acceptance of the signer's serial number against the one registered for the user.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::definitions::{x509::validation::check_certificate_time, AuthResponse, StatusCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown serial number policy flag '{0}'")]
pub struct UnknownPolicyFlag(String);

/// Which serial numbers are accepted.
///
/// With no flag set only an exact match is accepted. The flags relax that rule
/// independently; `warn_on_mismatch` never changes a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumberPolicy {
    pub allow_absence: bool,
    pub allow_mismatch: bool,
    pub warn_on_mismatch: bool,
}

impl SerialNumberPolicy {
    pub const MATCH_REQUIRED: Self = Self {
        allow_absence: false,
        allow_mismatch: false,
        warn_on_mismatch: false,
    };

    /// Decide on the serial number `observed` in the signer certificate, given the
    /// one `expected` from the user's attribute store.
    pub fn evaluate(&self, observed: Option<&str>, expected: Option<&str>) -> PolicyDecision {
        let observed = observed.unwrap_or_default();
        let expected = expected.unwrap_or_default();

        if observed.is_empty() {
            return PolicyDecision::Reject(StatusCode::UserSerialNumberNotRegistered);
        }
        if observed == expected {
            return PolicyDecision::Accept { warning: None };
        }
        if expected.trim().is_empty() {
            return if self.allow_absence {
                PolicyDecision::Accept {
                    warning: self.warn_on_mismatch.then_some(PolicyWarning::NotInStore),
                }
            } else {
                PolicyDecision::Reject(StatusCode::UserSerialNumberNotRegistered)
            };
        }
        if self.allow_mismatch {
            PolicyDecision::Accept {
                warning: self.warn_on_mismatch.then_some(PolicyWarning::Mismatch),
            }
        } else {
            PolicyDecision::Reject(StatusCode::UserSerialNumberMismatch)
        }
    }

    /// Refuse to start an authentication that could never be accepted.
    pub fn precheck(&self, expected: Option<&str>) -> Result<(), StatusCode> {
        if !self.allow_absence && expected.unwrap_or_default().trim().is_empty() {
            return Err(StatusCode::UserSerialNumberNotRegistered);
        }
        Ok(())
    }
}

impl Default for SerialNumberPolicy {
    fn default() -> Self {
        Self {
            allow_absence: true,
            allow_mismatch: true,
            warn_on_mismatch: false,
        }
    }
}

/// Parses a list of flag names separated by `,` or `|`, case-insensitively.
impl FromStr for SerialNumberPolicy {
    type Err = UnknownPolicyFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut policy = Self::MATCH_REQUIRED;
        for flag in s.split([',', '|']).map(str::trim).filter(|f| !f.is_empty()) {
            match flag.to_ascii_lowercase().as_str() {
                "match" | "matchrequired" => {}
                "allowabsence" => policy.allow_absence = true,
                "allowmismatch" => policy.allow_mismatch = true,
                "warnmismatch" | "warnonmismatch" => policy.warn_on_mismatch = true,
                _ => return Err(UnknownPolicyFlag(flag.to_string())),
            }
        }
        Ok(policy)
    }
}

impl TryFrom<String> for SerialNumberPolicy {
    type Error = UnknownPolicyFlag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SerialNumberPolicy> for String {
    fn from(policy: SerialNumberPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for SerialNumberPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = [
            (self.warn_on_mismatch, "warnOnMismatch"),
            (self.allow_absence, "allowAbsence"),
            (self.allow_mismatch, "allowMismatch"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        if flags.is_empty() {
            write!(f, "matchRequired")
        } else {
            write!(f, "{}", flags.join(", "))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyWarning {
    /// The user has no serial number in the attribute store.
    NotInStore,
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Accept { warning: Option<PolicyWarning> },
    Reject(StatusCode),
}

impl PolicyDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

/// The identity checks run on a verified signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityPolicy {
    pub serial_number: SerialNumberPolicy,
    /// Check the dates of the signer certificate. Needed when signature or chain
    /// validation is disabled, since those would otherwise cover it.
    pub check_certificate_time: bool,
}

impl IdentityPolicy {
    /// Accept or reject the signer of `response`. A rejection overwrites the status
    /// and keeps everything derived from the signature.
    pub fn apply(
        &self,
        response: &mut AuthResponse,
        expected: Option<&str>,
        now: OffsetDateTime,
    ) -> bool {
        let observed = response.signer_serial_number().map(str::to_string);
        if observed.as_deref().unwrap_or_default().is_empty() {
            tracing::warn!(
                target: "audit",
                "signer certificate carries no serial number, expected='{}'",
                expected.unwrap_or_default()
            );
            response.set_status(StatusCode::UserSerialNumberNotRegistered);
            return false;
        }

        if self.check_certificate_time {
            if let Err(code) = check_certificate_time(response.signer_certificate(), now) {
                tracing::warn!(target: "audit", "signer certificate rejected: {code}");
                response.set_status(code);
                return false;
            }
        }

        match self.serial_number.evaluate(observed.as_deref(), expected) {
            PolicyDecision::Accept { warning: None } => true,
            PolicyDecision::Accept {
                warning: Some(warning),
            } => {
                tracing::warn!(
                    target: "audit",
                    "serial number accepted despite {warning:?}: observed='{}', expected='{}'",
                    observed.as_deref().unwrap_or_default(),
                    expected.unwrap_or_default()
                );
                true
            }
            PolicyDecision::Reject(code) => {
                tracing::warn!(
                    target: "audit",
                    "serial number not accepted ({code}): observed='{}', expected='{}'",
                    observed.as_deref().unwrap_or_default(),
                    expected.unwrap_or_default()
                );
                response.set_status(code);
                false
            }
        }
    }
}
