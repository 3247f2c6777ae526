//! Checks on a certificate that issues another one in the chain.
use const_oid::AssociatedOid;
use der::Decode;
use x509_cert::{
    ext::{
        pkix::{BasicConstraints, KeyUsage, KeyUsages},
        Extension,
    },
    Certificate,
};

type Error = String;

/// Check that `issuer` may sign certificates when `ca_below` CA certificates sit
/// between it and the signer.
pub fn check_issuer(issuer: &Certificate, ca_below: usize) -> Vec<Error> {
    let mut errors = vec![];

    match extension(issuer, BasicConstraints::OID) {
        Some(extension) => match BasicConstraints::from_der(extension.extn_value.as_bytes()) {
            Ok(constraints) => errors.extend(check_basic_constraints(constraints, ca_below)),
            Err(e) => errors.push(format!("failed to decode BasicConstraints: {e}")),
        },
        None => errors.push("BasicConstraints extension is missing".to_string()),
    }

    // Without KeyUsage every usage is allowed.
    if let Some(extension) = extension(issuer, KeyUsage::OID) {
        match KeyUsage::from_der(extension.extn_value.as_bytes()) {
            Ok(usage) => errors.extend(check_key_usage(usage)),
            Err(e) => errors.push(format!("failed to decode KeyUsage: {e}")),
        }
    }

    errors
}

fn check_basic_constraints(constraints: BasicConstraints, ca_below: usize) -> Option<Error> {
    if !constraints.ca {
        return Some(format!("not a CA certificate: {constraints:?}"));
    }
    match constraints.path_len_constraint {
        Some(path_len) if usize::from(path_len) < ca_below => Some(format!(
            "path length constraint {path_len} exceeded by {ca_below} CA certificates"
        )),
        _ => None,
    }
}

fn check_key_usage(usage: KeyUsage) -> Option<Error> {
    if usage.0.contains(KeyUsages::KeyCertSign) {
        None
    } else {
        Some(format!(
            "key usage does not allow certificate signing: {:?}",
            usage.0.into_iter().collect::<Vec<KeyUsages>>()
        ))
    }
}

fn extension(certificate: &Certificate, oid: const_oid::ObjectIdentifier) -> Option<&Extension> {
    certificate
        .tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|extension| extension.extn_id == oid)
}
