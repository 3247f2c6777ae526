use serde::Serialize;
use time::OffsetDateTime;
use x509_cert::Certificate;

use self::{constraints::check_issuer, error::ErrorWithContext, signature::issuer_signed_subject};
use super::{trust_anchor::TrustAnchorRegistry, util::common_name_or_unknown, X5Chain};

mod constraints;
mod error;
pub(super) mod signature;
mod validity;

pub use validity::check_certificate_time;
pub(crate) use validity::check_validity_period_at;

/// Options for certificate chain validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// The time to use for validity period checks.
    /// If `None`, the current system time is used.
    pub validation_time: Option<OffsetDateTime>,
}

impl ValidationOptions {
    pub fn at(validation_time: OffsetDateTime) -> Self {
        Self {
            validation_time: Some(validation_time),
        }
    }

    /// Get the validation time, defaulting to current time if not set.
    pub fn validation_time(&self) -> OffsetDateTime {
        self.validation_time.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate that the signer certificate chains up to one of the trust anchors.
///
/// The certificates following the signer in `x5chain` may be in any order. Each step
/// of the path must match on names, carry a valid signature from the next certificate
/// and be within its validity period at the validation time. Every issuing
/// certificate, trust anchors included, must be a CA allowed to sign certificates at
/// its depth in the path.
pub fn validate_chain(
    x5chain: &X5Chain,
    trust_anchors: &TrustAnchorRegistry,
    options: &ValidationOptions,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let validation_time = options.validation_time();

    let signer = x5chain.end_entity_certificate();
    let validity_errors = check_validity_period_at(signer, validation_time)
        .into_iter()
        .map(ErrorWithContext::signer);
    outcome.errors.extend(validity_errors);

    if trust_anchors.is_empty() {
        outcome
            .errors
            .push(ErrorWithContext::trust_anchor("no trust anchors are configured"));
        return outcome;
    }

    let intermediates: Vec<&Certificate> = x5chain.intermediates().collect();
    let mut used = vec![false; intermediates.len()];
    let mut current = signer;
    let mut ca_below = 0;

    // Every intermediate can appear at most once in the path, which bounds the walk.
    loop {
        if find_trust_anchor_candidates(current, trust_anchors, validation_time, ca_below)
            .next()
            .is_some()
        {
            tracing::debug!(
                "certificate '{}' is issued by a trust anchor",
                common_name_or_unknown(current)
            );
            return outcome;
        }

        if is_trusted_certificate(current, trust_anchors) {
            tracing::debug!(
                "certificate '{}' is itself a trust anchor",
                common_name_or_unknown(current)
            );
            return outcome;
        }

        let next = intermediates
            .iter()
            .enumerate()
            .filter(|(index, _)| !used[*index])
            .find(|(_, candidate)| {
                is_issuer_of(current, candidate, validation_time, ca_below)
            })
            .map(|(index, candidate)| (index, *candidate));

        match next {
            Some((index, issuer)) => {
                used[index] = true;
                current = issuer;
                ca_below += 1;
            }
            None => {
                outcome.errors.push(ErrorWithContext::chain(format!(
                    "no valid issuer found for '{}'",
                    common_name_or_unknown(current)
                )));
                return outcome;
            }
        }
    }
}

fn is_issuer_of(
    subject: &Certificate,
    candidate: &Certificate,
    at: OffsetDateTime,
    ca_below: usize,
) -> bool {
    if candidate.tbs_certificate.subject != subject.tbs_certificate.issuer {
        return false;
    }
    if !issuer_signed_subject(subject, candidate) {
        tracing::warn!(
            "'{}' did not sign '{}'",
            common_name_or_unknown(candidate),
            common_name_or_unknown(subject)
        );
        return false;
    }
    let errors = check_issuer(candidate, ca_below);
    if !errors.is_empty() {
        tracing::warn!(
            target: "security",
            "'{}' may not issue '{}': {errors:?}",
            common_name_or_unknown(candidate),
            common_name_or_unknown(subject)
        );
        return false;
    }
    let errors = check_validity_period_at(candidate, at);
    if !errors.is_empty() {
        tracing::warn!(
            "certificate '{}' is not valid: {errors:?}",
            common_name_or_unknown(candidate)
        );
    }
    errors.is_empty()
}

fn find_trust_anchor_candidates<'a: 'b, 'b>(
    subject: &'a Certificate,
    trust_anchors: &'b TrustAnchorRegistry,
    validation_time: OffsetDateTime,
    ca_below: usize,
) -> impl Iterator<Item = &'b Certificate> {
    trust_anchors
        .certificates()
        .filter(move |candidate| is_issuer_of(subject, candidate, validation_time, ca_below))
}

fn is_trusted_certificate(certificate: &Certificate, trust_anchors: &TrustAnchorRegistry) -> bool {
    trust_anchors
        .certificates()
        .any(|anchor| anchor == certificate)
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use crate::definitions::x509::{
        trust_anchor::TrustAnchorRegistry, x5chain::certificate_from_pem, X5Chain,
    };

    use super::{validate_chain, ValidationOptions};

    static SIGNER: &[u8] = include_bytes!("../../../../tests/data/signer.pem");
    static EC_SIGNER: &[u8] = include_bytes!("../../../../tests/data/ec_signer.pem");
    static ROGUE: &[u8] = include_bytes!("../../../../tests/data/rogue.pem");
    static CA: &[u8] = include_bytes!("../../../../tests/data/ca.pem");
    static CHAIN_ROOT: &[u8] = include_bytes!("../../../../tests/data/chain/root.pem");
    static INTERMEDIATE: &[u8] = include_bytes!("../../../../tests/data/chain/intermediate.pem");
    static INTERMEDIATE_SIGNER: &[u8] = include_bytes!("../../../../tests/data/chain/signer.pem");
    static USER: &[u8] = include_bytes!("../../../../tests/data/chain/user.pem");
    static FORGED: &[u8] = include_bytes!("../../../../tests/data/chain/forged.pem");
    static SUB_CA: &[u8] = include_bytes!("../../../../tests/data/chain/sub_ca.pem");
    static TOO_DEEP: &[u8] = include_bytes!("../../../../tests/data/chain/too_deep.pem");

    fn anchors() -> TrustAnchorRegistry {
        TrustAnchorRegistry::from_pem(CA).unwrap()
    }

    fn chain(certs: &[&[u8]]) -> X5Chain {
        let mut certificates = certs.iter().map(|pem| certificate_from_pem(pem).unwrap());
        let signer = certificates.next().unwrap();
        X5Chain::new(signer, certificates.collect())
    }

    fn in_2030() -> ValidationOptions {
        ValidationOptions::at(datetime!(2030-06-01 0:00 UTC))
    }

    #[test_log::test]
    fn signer_issued_by_anchor_is_valid() {
        let outcome = validate_chain(&chain(&[SIGNER]), &anchors(), &in_2030());
        assert!(outcome.success(), "{outcome:?}");
        let outcome = validate_chain(&chain(&[EC_SIGNER]), &anchors(), &in_2030());
        assert!(outcome.success(), "{outcome:?}");
    }

    #[test_log::test]
    fn anchor_inside_chain_is_accepted() {
        let outcome = validate_chain(&chain(&[SIGNER, CA]), &anchors(), &in_2030());
        assert!(outcome.success(), "{outcome:?}");
    }

    #[test_log::test]
    fn self_signed_signer_is_rejected() {
        let outcome = validate_chain(&chain(&[ROGUE]), &anchors(), &in_2030());
        assert!(!outcome.success());
        assert!(outcome.errors[0].starts_with("Certificate chain error"));
    }

    #[test_log::test]
    fn empty_registry_is_rejected() {
        let outcome = validate_chain(
            &chain(&[SIGNER]),
            &TrustAnchorRegistry::default(),
            &in_2030(),
        );
        assert!(!outcome.success());
    }

    #[test_log::test]
    fn expired_signer_is_reported() {
        let options = ValidationOptions::at(datetime!(2040-01-01 0:00 UTC));
        let outcome = validate_chain(&chain(&[SIGNER]), &anchors(), &options);
        assert!(!outcome.success());
        assert!(outcome
            .errors
            .iter()
            .any(|e| e == "Signer certificate error: expired"));
    }

    fn chain_root() -> TrustAnchorRegistry {
        TrustAnchorRegistry::from_pem(CHAIN_ROOT).unwrap()
    }

    #[test_log::test]
    fn path_through_intermediate_is_valid() {
        let outcome = validate_chain(
            &chain(&[INTERMEDIATE_SIGNER, INTERMEDIATE]),
            &chain_root(),
            &in_2030(),
        );
        assert!(outcome.success(), "{outcome:?}");

        let outcome = validate_chain(&chain(&[INTERMEDIATE_SIGNER]), &chain_root(), &in_2030());
        assert!(!outcome.success());
    }

    #[test_log::test]
    fn end_entity_cannot_issue_certificates() {
        // The user certificate is valid and trusted, but CA:FALSE.
        let outcome = validate_chain(&chain(&[USER]), &chain_root(), &in_2030());
        assert!(outcome.success(), "{outcome:?}");

        let outcome = validate_chain(&chain(&[FORGED, USER]), &chain_root(), &in_2030());
        assert!(!outcome.success());
        assert_eq!(
            outcome.errors,
            vec!["Certificate chain error: no valid issuer found for 'MIDCHEVICTIM0001:PN'"]
        );
    }

    #[test_log::test]
    fn path_length_constraint_is_enforced() {
        let outcome = validate_chain(
            &chain(&[TOO_DEEP, SUB_CA, INTERMEDIATE]),
            &chain_root(),
            &in_2030(),
        );
        assert!(!outcome.success());
        assert_eq!(
            outcome.errors,
            vec!["Certificate chain error: no valid issuer found for 'Mobile ID Test Sub CA'"]
        );
    }
}
