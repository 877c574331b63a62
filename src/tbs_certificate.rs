use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// The "To Be Signed" portion of an X.509 certificate, filled in step by step.
///
/// The version is always v3. Fields are bound in order: serial (at
/// construction), names, subject public key, extensions, validity. A draft
/// converts to its DER form only once every field is present.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions for the certificate.
/// * `validity` - The certificate's validity window.
#[derive(Clone, Debug)]
pub struct TbsCertificate {
    pub serial_number: u64,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Option<Name>,
    pub subject: Option<Name>,
    pub subject_public_key: Option<PublicKey>,
    pub extensions: Vec<ExtensionParam>,
    pub validity: Option<Validity>,
}

impl TbsCertificate {
    /// Starts a v3 draft with the given serial.
    pub fn new(serial_number: u64) -> Self {
        Self {
            serial_number,
            signature_algorithm: SignatureAlgorithm::Sha256WithRSA,
            issuer: None,
            subject: None,
            subject_public_key: None,
            extensions: Vec::new(),
            validity: None,
        }
    }

    pub fn bind_names(&mut self, subject: Name, issuer: Name) {
        self.subject = Some(subject);
        self.issuer = Some(issuer);
    }

    pub fn bind_public_key(&mut self, key: PublicKey) {
        self.subject_public_key = Some(key);
    }

    pub fn attach_extensions(&mut self, extensions: Vec<ExtensionParam>) {
        self.extensions = extensions;
    }

    pub fn set_validity(&mut self, validity: Validity) {
        self.validity = Some(validity);
    }

    /// Minimal big-endian encoding of the serial.
    pub fn serial_bytes(&self) -> Vec<u8> {
        serial_to_bytes(self.serial_number)
    }

    /// Converts the draft into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let subject = self.subject.clone().ok_or_else(|| incomplete("subject name"))?;
        let issuer = self.issuer.clone().ok_or_else(|| incomplete("issuer name"))?;
        let public_key = self
            .subject_public_key
            .as_ref()
            .ok_or_else(|| incomplete("subject public key"))?;
        let validity = self.validity.ok_or_else(|| incomplete("validity"))?;

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial_bytes())?,
            signature: self.signature_algorithm.clone().into(),
            issuer,
            validity: x509_cert::time::Validity {
                not_before: to_x509_time(validity.not_before)?,
                not_after: to_x509_time(validity.not_after)?,
            },
            subject,
            subject_public_key_info: public_key.as_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a parsed `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        let signature_algorithm = SignatureAlgorithm::try_from(&inner.signature)?;

        let extensions = inner
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect();

        Ok(Self {
            serial_number: serial_from_bytes(inner.serial_number.as_bytes())?,
            signature_algorithm,
            issuer: Some(inner.issuer.clone()),
            subject: Some(inner.subject.clone()),
            subject_public_key: Some(PublicKey::from_x509spki(&inner.subject_public_key_info)?),
            extensions,
            validity: Some(Validity {
                not_before: from_x509_time(inner.validity.not_before)?,
                not_after: from_x509_time(inner.validity.not_after)?,
            }),
        })
    }

    /// Encodes the draft into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(der::Encode::to_der(&self.to_tbs_certificate_inner()?)?)
    }
}

fn incomplete(field: &str) -> CaError {
    CaError::SigningError(format!("certificate draft is missing its {field}"))
}

pub(crate) fn serial_to_bytes(serial: u64) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = bytes[start..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

pub(crate) fn serial_from_bytes(bytes: &[u8]) -> Result<u64> {
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return Err(CaError::DecodingError(
            "serial number does not fit in 64 bits".to_string(),
        ));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050 on.
fn to_x509_time(instant: OffsetDateTime) -> Result<Time> {
    let secs = u64::try_from(instant.unix_timestamp())
        .map_err(|_| CaError::InvalidInput(format!("{instant} is before the Unix epoch")))?;
    let since_epoch = std::time::Duration::from_secs(secs);
    if instant.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_unix_duration(since_epoch)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_unix_duration(
            since_epoch,
        )?))
    }
}

pub(crate) fn from_x509_time(time: Time) -> Result<OffsetDateTime> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|e| CaError::DecodingError(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| CaError::DecodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn serial_encoding_is_minimal() {
        assert_eq!(serial_to_bytes(50_000_000), vec![0x02, 0xFA, 0xF0, 0x80]);
        assert_eq!(serial_to_bytes(0x80), vec![0x00, 0x80]);
        assert_eq!(serial_to_bytes(0), vec![0x00]);
        assert_eq!(serial_from_bytes(&[0x00, 0x05, 0xF5, 0xE0, 0xFF]).unwrap(), 99_999_999);
    }

    #[test]
    fn times_switch_to_generalized_in_2050() {
        let before = to_x509_time(datetime!(2049-12-31 23:59:59 UTC)).unwrap();
        let after = to_x509_time(datetime!(2050-01-01 00:00:00 UTC)).unwrap();
        assert!(matches!(before, Time::UtcTime(_)));
        assert!(matches!(after, Time::GeneralTime(_)));
        assert_eq!(from_x509_time(after).unwrap(), datetime!(2050-01-01 00:00:00 UTC));
    }

    #[test]
    fn incomplete_draft_cannot_be_encoded() {
        let draft = TbsCertificate::new(60_000_000);
        assert!(matches!(
            draft.to_tbs_certificate_inner(),
            Err(CaError::SigningError(_))
        ));
    }
}
