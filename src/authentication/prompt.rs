//! Texts: the challenge sent to the phone and the messages shown in the browser.
use rand::RngCore;

use crate::{
    config::SessionSettings,
    definitions::{AuthResponse, ServiceExtension, StatusCode, UserLanguage},
};

/// Placeholder for the nonce in login prompts.
pub const NONCE_PLACEHOLDER: &str = "#TransId#";

/// Shown instead of the details of a technical error.
pub const GENERIC_ERROR_TEXT: &str =
    "An error occurred. Please try again later or contact your administrator.";
pub const TIMEOUT_TEXT: &str = "Timeout.";

fn default_login_prompt(language: UserLanguage) -> &'static str {
    match language {
        UserLanguage::En => "Login with Mobile ID (#TransId#)?",
        UserLanguage::De => "Login mit Mobile ID (#TransId#)?",
        UserLanguage::Fr => "Login avec Mobile ID (#TransId#)?",
        UserLanguage::It => "Login con Mobile ID (#TransId#)?",
    }
}

/// `length` characters of the base64 alphabet, drawn from a CSPRNG.
pub fn random_nonce(length: usize) -> String {
    let mut bytes = vec![0u8; (length * 3).div_ceil(4)];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::encode(bytes).chars().take(length).collect()
}

/// The challenge for one attempt: the configured prefix followed by the login prompt
/// of `language`, with the nonce filled in.
pub fn challenge(settings: &SessionSettings, language: UserLanguage, nonce: &str) -> String {
    let prompt = settings
        .login_prompt(language)
        .unwrap_or_else(|| default_login_prompt(language));
    format!(
        "{}{}",
        settings.dtbs_prefix,
        replace_ignore_ascii_case(prompt, NONCE_PLACEHOLDER, nonce)
    )
}

/// Replace every occurrence of the ASCII `placeholder`, in any letter case.
pub fn replace_ignore_ascii_case(text: &str, placeholder: &str, value: &str) -> String {
    // ASCII lowercasing keeps byte offsets, so matches in `lowered` index `text`.
    let lowered = text.to_ascii_lowercase();
    let needle = placeholder.to_ascii_lowercase();
    let mut replaced = String::with_capacity(text.len());
    let mut rest = 0;
    for (start, _) in lowered.match_indices(&needle) {
        replaced.push_str(&text[rest..start]);
        replaced.push_str(value);
        rest = start + needle.len();
    }
    replaced.push_str(&text[rest..]);
    replaced
}

/// Shown while the user is asked to answer on the phone.
pub fn pending_text(phone_number: &str, nonce: &str) -> String {
    format!(
        "A Mobile ID message has been sent to {phone_number}. Please follow the instructions on your phone and check that it shows {nonce}."
    )
}

/// Message for outcomes the user can act on. Technical errors have none.
fn user_message(code: StatusCode) -> Option<&'static str> {
    use StatusCode::*;
    let message = match code {
        RequestOk | Signature | ValidSignature => "Your login has been confirmed.",
        UserCancel => "You have cancelled the login on your phone.",
        ExpiredTransaction => "The login request has expired.",
        PbSignatureProcess => {
            "Another Mobile ID request is being processed on your phone. Please try again later."
        }
        UnknownClient => "Your phone number is not registered for Mobile ID.",
        UnsupportedProfile => "Your Mobile ID does not support this kind of login.",
        OtaError => "Your phone could not be reached.",
        PinNrBlocked | CardBlocked => "Your Mobile ID is blocked.",
        NoKeyFound | NoCertFound => "Your Mobile ID is not activated.",
        RevokedCertificate => "Your Mobile ID has been revoked.",
        InvalidSignature => "Your Mobile ID signature is invalid.",
        UserSerialNumberNotRegistered | UserSerialNumberMismatch => {
            "Your Mobile ID is not linked to this account."
        }
        UserCertAbsent | UserCertNotYetValid | UserCertExpired => {
            "Your Mobile ID certificate is not valid."
        }
        _ => return None,
    };
    Some(message)
}

/// The message shown for a failed or retryable outcome.
///
/// Technical errors are shown with their code and detail only in debug mode. A link to
/// the self-care portal is appended when the service sent one.
pub fn display_text(
    response: &AuthResponse,
    language: UserLanguage,
    show_debug_message: bool,
) -> String {
    let code = response.code();
    let mut text = match user_message(code) {
        Some(message) => message.to_string(),
        None if show_debug_message => format!(
            "{} ({}) {}",
            code.code(),
            code.canonical_message(),
            response.detail().unwrap_or_default()
        )
        .trim_end()
        .to_string(),
        None => GENERIC_ERROR_TEXT.to_string(),
    };
    if let Some(url) = response
        .extension(ServiceExtension::UserAssistancePortalUrl)
        .filter(|url| !url.trim().is_empty())
    {
        text.push_str(&format!(" See {url}&lang={language}"));
    }
    text
}
