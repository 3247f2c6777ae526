use anyhow::{Context, Error};
use const_oid::{
    db::rfc4519::{COMMON_NAME, SERIAL_NUMBER},
    AssociatedOid, ObjectIdentifier,
};
use der::{
    asn1::{Ia5StringRef, PrintableStringRef, TeletexStringRef, Utf8StringRef},
    referenced::OwnedToRef,
    Tag, Tagged,
};
use ecdsa::{PrimeCurve, VerifyingKey};
use elliptic_curve::{
    sec1::{FromEncodedPoint, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey,
};
use sec1::point::ModulusSize;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::{attr::AttributeValue, Certificate};

/// id-at-pseudonym
pub const PSEUDONYM: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.65");

/// Get an elliptic curve public key from a SubjectPublicKeyInfo.
pub fn public_key<C>(spki: &SubjectPublicKeyInfoOwned) -> Result<VerifyingKey<C>, Error>
where
    C: AssociatedOid + CurveArithmetic + PrimeCurve,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    spki.owned_to_ref()
        .try_into()
        .map(|key: PublicKey<C>| key.into())
        .context("could not parse public key from PKCS8 SPKI")
}

/// Get the first CommonName of the X.509 certificate, or return "Unknown".
pub fn common_name_or_unknown(certificate: &Certificate) -> &str {
    common_name(certificate).unwrap_or("Unknown")
}

pub fn common_name(certificate: &Certificate) -> Option<&str> {
    first_subject_attribute(certificate, COMMON_NAME)
}

/// The first serialNumber (2.5.4.5) attribute of the subject, in encoding order.
///
/// This is the identifier bound to the holder of the signing key, not the
/// serial number of the certificate itself.
pub fn subject_serial_number(certificate: &Certificate) -> Option<&str> {
    first_subject_attribute(certificate, SERIAL_NUMBER)
}

/// Name to show for the signer: the common name, falling back to the pseudonym.
pub fn display_name(certificate: &Certificate) -> Option<&str> {
    common_name(certificate).or_else(|| first_subject_attribute(certificate, PSEUDONYM))
}

fn first_subject_attribute(certificate: &Certificate, oid: ObjectIdentifier) -> Option<&str> {
    certificate
        .tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter_map(|attribute| {
            if attribute.oid == oid {
                attribute_value_to_str(&attribute.value)
            } else {
                None
            }
        })
        .next()
}

pub fn attribute_value_to_str(av: &AttributeValue) -> Option<&str> {
    match av.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Utf8String => Utf8StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::TeletexString => TeletexStringRef::try_from(av).ok().map(|s| s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use crate::definitions::x509::x5chain::certificate_from_pem;

    use super::*;

    #[test]
    fn subject_attributes() {
        let signer = certificate_from_pem(include_bytes!("../../../tests/data/signer.pem")).unwrap();
        assert_eq!(subject_serial_number(&signer), Some("MIDCHE28RZ7TKQC2"));
        assert_eq!(display_name(&signer), Some("MIDCHE28RZ7TKQC2:PN"));

        let anonymous =
            certificate_from_pem(include_bytes!("../../../tests/data/no_serial_signer.pem"))
                .unwrap();
        assert_eq!(subject_serial_number(&anonymous), None);
        assert_eq!(common_name_or_unknown(&anonymous), "Anonymous Signer");
    }

    #[test]
    fn display_name_prefers_common_name() {
        let named =
            certificate_from_pem(include_bytes!("../../../tests/data/named_pseudonym_signer.pem"))
                .unwrap();
        assert_eq!(display_name(&named), Some("Pseudonymous Signer"));

        let pseudonymous =
            certificate_from_pem(include_bytes!("../../../tests/data/pseudonym_signer.pem")).unwrap();
        assert_eq!(common_name(&pseudonymous), None);
        assert_eq!(display_name(&pseudonymous), Some("MIDCHEPSEUDO0002:PN"));
    }
}
