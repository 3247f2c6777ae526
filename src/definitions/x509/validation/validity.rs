use time::OffsetDateTime;
use x509_cert::Certificate;

use crate::definitions::status::StatusCode;

/// Check certificate validity period against a specific time.
pub fn check_validity_period_at(certificate: &Certificate, at: OffsetDateTime) -> Vec<Error> {
    let validity = certificate.tbs_certificate.validity;
    let mut errors: Vec<Error> = vec![];

    let not_after = OffsetDateTime::from(validity.not_after.to_system_time());
    let not_before = OffsetDateTime::from(validity.not_before.to_system_time());

    if not_after < at {
        errors.push(Error::Expired);
    }
    if not_before > at {
        errors.push(Error::NotYetValid);
    }

    errors
}

/// Map the validity of the signer certificate at `at` to a status.
///
/// Used when cryptographic checks were skipped and the certificate dates are the
/// only remaining signal.
pub fn check_certificate_time(
    certificate: Option<&Certificate>,
    at: OffsetDateTime,
) -> Result<(), StatusCode> {
    let Some(certificate) = certificate else {
        return Err(StatusCode::UserCertAbsent);
    };
    match check_validity_period_at(certificate, at).first() {
        None => Ok(()),
        Some(Error::NotYetValid) => Err(StatusCode::UserCertNotYetValid),
        Some(Error::Expired) => Err(StatusCode::UserCertExpired),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expired")]
    Expired,
    #[error("not yet valid")]
    NotYetValid,
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use crate::definitions::x509::x5chain::certificate_from_pem;

    use super::*;

    fn signer() -> Certificate {
        certificate_from_pem(include_bytes!("../../../../tests/data/signer.pem")).unwrap()
    }

    #[test]
    fn validity_window() {
        let signer = signer();
        assert!(check_validity_period_at(&signer, datetime!(2030-01-01 0:00 UTC)).is_empty());
        assert_eq!(
            check_validity_period_at(&signer, datetime!(2020-01-01 0:00 UTC)),
            vec![Error::NotYetValid]
        );
        assert_eq!(
            check_validity_period_at(&signer, datetime!(2040-01-01 0:00 UTC)),
            vec![Error::Expired]
        );
    }

    #[test]
    fn certificate_time_status() {
        let signer = signer();
        assert_eq!(
            check_certificate_time(None, datetime!(2030-01-01 0:00 UTC)),
            Err(StatusCode::UserCertAbsent)
        );
        assert_eq!(
            check_certificate_time(Some(&signer), datetime!(2030-01-01 0:00 UTC)),
            Ok(())
        );
        assert_eq!(
            check_certificate_time(Some(&signer), datetime!(2020-01-01 0:00 UTC)),
            Err(StatusCode::UserCertNotYetValid)
        );
        assert_eq!(
            check_certificate_time(Some(&signer), datetime!(2040-01-01 0:00 UTC)),
            Err(StatusCode::UserCertExpired)
        );
    }
}
