use bon::Builder;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::{Any, Ia5StringRef, PrintableStringRef, SetOfVec, Utf8StringRef};
use time::{Duration, OffsetDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// Lifetime of the root CA certificate: ten 365-day years, no leap days.
pub const CA_VALIDITY: Duration = Duration::hours(10 * 365 * 24);

/// Lifetime of an issued leaf certificate: one 365-day year.
pub const LEAF_VALIDITY: Duration = Duration::hours(365 * 24);

const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const STATE_OR_PROVINCE_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const EMAIL_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// Parameters for building an X.509 certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `is_ca` - Selects the CA or the leaf extension profile.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub is_ca: bool,
}

/// Subject or issuer name of a certificate.
///
/// Every attribute except the common name is optional. Empty values are
/// treated as absent and never encoded.
///
/// # Fields
/// * `country` - The country (C), two letters.
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
/// * `common_name` - The common name (CN).
/// * `email` - The email address (emailAddress).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
    pub common_name: String,
    pub email: Option<String>,
}

/// Operator-facing name for a certificate subject.
pub type SubjectInfo = DistinguishedName;

impl DistinguishedName {
    /// A name carrying only a common name, as used for leaf certificates.
    pub fn common_name_only(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    /// Converts the distinguished name to an X.509 `Name`.
    ///
    /// Attributes are emitted in the order C, ST, L, O, OU, CN, emailAddress,
    /// one per RDN. The country is a PrintableString, the email an IA5String
    /// and everything else a UTF8String.
    pub fn as_x509_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();

        if let Some(country) = present(&self.country) {
            if country.chars().count() != 2 {
                return Err(CaError::InvalidInput(format!(
                    "country code must be two letters, got {country:?}"
                )));
            }
            let value = PrintableStringRef::new(country)
                .map_err(|e| CaError::InvalidInput(format!("country code {country:?}: {e}")))?;
            rdns.push(rdn(COUNTRY_NAME, Any::encode_from(&value)?)?);
        }

        for (oid, value) in [
            (STATE_OR_PROVINCE_NAME, present(&self.state)),
            (LOCALITY_NAME, present(&self.locality)),
            (ORGANIZATION_NAME, present(&self.organization)),
            (ORGANIZATIONAL_UNIT_NAME, present(&self.organization_unit)),
            (COMMON_NAME, Some(self.common_name.as_str()).filter(|s| !s.is_empty())),
        ] {
            if let Some(value) = value {
                rdns.push(rdn(oid, Any::encode_from(&Utf8StringRef::new(value)?)?)?);
            }
        }

        if let Some(email) = present(&self.email) {
            let value = Ia5StringRef::new(email)
                .map_err(|e| CaError::InvalidInput(format!("email address {email:?}: {e}")))?;
            rdns.push(rdn(EMAIL_ADDRESS, Any::encode_from(&value)?)?);
        }

        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 `Name`.
    ///
    /// Attributes other than the seven known ones are ignored.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self> {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = attribute_string(attr)?;
                match attr.oid {
                    COUNTRY_NAME => dn.country = Some(value),
                    STATE_OR_PROVINCE_NAME => dn.state = Some(value),
                    LOCALITY_NAME => dn.locality = Some(value),
                    ORGANIZATION_NAME => dn.organization = Some(value),
                    ORGANIZATIONAL_UNIT_NAME => dn.organization_unit = Some(value),
                    COMMON_NAME => dn.common_name = value,
                    EMAIL_ADDRESS => dn.email = Some(value),
                    _ => {}
                }
            }
        }

        Ok(dn)
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn rdn(oid: ObjectIdentifier, value: Any) -> Result<RelativeDistinguishedName> {
    let set = SetOfVec::try_from(vec![AttributeTypeAndValue { oid, value }])?;
    Ok(RelativeDistinguishedName(set))
}

fn attribute_string(attr: &AttributeTypeAndValue) -> Result<String> {
    match attr.value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(attr.value.value())
                .map(str::to_owned)
                .map_err(|e| CaError::DecodingError(format!("attribute {}: {e}", attr.oid)))
        }
        tag => Err(CaError::DecodingError(format!(
            "attribute {} has unsupported string type {tag}",
            attr.oid
        ))),
    }
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// A window opening at `start` and lasting exactly `duration`.
    ///
    /// `start` is truncated to whole seconds, the resolution of X.509 times,
    /// so the encoded window keeps the exact duration.
    pub fn starting_at(start: OffsetDateTime, duration: Duration) -> Result<Self> {
        let not_before = OffsetDateTime::from_unix_timestamp(start.unix_timestamp())
            .map_err(|e| CaError::InvalidInput(e.to_string()))?;
        Ok(Self {
            not_before,
            not_after: not_before + duration,
        })
    }

    /// A window opening now and lasting exactly `duration`.
    pub fn starting_now(duration: Duration) -> Result<Self> {
        Self::starting_at(OffsetDateTime::now_utc(), duration)
    }

    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        let value = extension
            .to_x509_extension_value()
            .map_err(|e| CaError::ExtensionBuildError(format!("{}: {e}", E::OID)))?;
        Ok(Self {
            oid: E::OID,
            critical,
            value,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}
