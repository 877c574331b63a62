use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::OctetString,
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;

use super::params::ExtensionParam;
use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::tbs_certificate::TbsCertificate;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use caforge::cert::extensions::{BasicConstraints, ToAndFromX509Extension};
/// let bc = BasicConstraints { is_ca: true, max_path_length: None };
/// let encoded = bc.to_x509_extension_value().unwrap();
/// let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
/// assert!(decoded.is_ca);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
///
/// # Fields
/// * `key_identifier` - The key identifier.
/// * `authority_cert_issuer` - Name of the issuer of the authority's certificate.
/// * `authority_cert_serial_number` - Serial of the authority's certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
    pub authority_cert_issuer: Option<Name>,
    pub authority_cert_serial_number: Option<Vec<u8>>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let authority_cert_issuer = self
            .authority_cert_issuer
            .clone()
            .map(|name| vec![GeneralName::DirectoryName(name)]);

        let authority_cert_serial_number = self
            .authority_cert_serial_number
            .as_deref()
            .map(x509_cert::serial_number::SerialNumber::new)
            .transpose()?;

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer,
            authority_cert_serial_number,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki.authority_cert_issuer.as_ref().and_then(|names| {
            names.iter().find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(dn.clone()),
                _ => None,
            })
        });

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec()),
        })
    }
}

/// Assembles the fixed extension sets for the root CA and for leaves.
///
/// Both profiles read the subject public key from the certificate draft, so
/// the key must be bound to the draft before extensions are built.
pub struct ExtensionBuilder;

impl ExtensionBuilder {
    /// subjectKeyIdentifier, authorityKeyIdentifier (keyid + issuer + serial),
    /// critical basicConstraints CA:TRUE.
    pub fn build_ca_extensions(ca: &TbsCertificate) -> Result<Vec<ExtensionParam>> {
        let key_id = subject_key_id(ca)?;
        let issuer = ca.issuer.clone().ok_or_else(|| {
            CaError::ExtensionBuildError("CA certificate has no issuer name bound".to_string())
        })?;

        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: key_id.clone(),
            authority_cert_issuer: Some(issuer),
            authority_cert_serial_number: Some(ca.serial_bytes()),
        };
        let basic_constraints = BasicConstraints {
            is_ca: true,
            max_path_length: None,
        };

        Ok(vec![
            ExtensionParam::from_extension(SubjectKeyIdentifier(key_id), false)?,
            ExtensionParam::from_extension(authority_key_id, false)?,
            ExtensionParam::from_extension(basic_constraints, true)?,
        ])
    }

    /// basicConstraints CA:FALSE, authorityKeyIdentifier (keyid of the
    /// issuing CA), critical keyUsage digitalSignature + keyEncipherment,
    /// subjectKeyIdentifier.
    pub fn build_leaf_extensions(
        issuer: &(impl Issuer + ?Sized),
        leaf: &TbsCertificate,
    ) -> Result<Vec<ExtensionParam>> {
        let key_id = subject_key_id(leaf)?;
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: issuer.key_identifier().map_err(|e| {
                CaError::ExtensionBuildError(format!("issuer key identifier: {e}"))
            })?,
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        let key_usage = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);

        Ok(vec![
            ExtensionParam::from_extension(BasicConstraints::default(), false)?,
            ExtensionParam::from_extension(authority_key_id, false)?,
            ExtensionParam::from_extension(key_usage, true)?,
            ExtensionParam::from_extension(SubjectKeyIdentifier(key_id), false)?,
        ])
    }
}

fn subject_key_id(draft: &TbsCertificate) -> Result<Vec<u8>> {
    let key = draft.subject_public_key.as_ref().ok_or_else(|| {
        CaError::ExtensionBuildError("no public key bound to the certificate".to_string())
    })?;
    key.key_identifier()
        .map_err(|e| CaError::ExtensionBuildError(format!("subject key identifier: {e}")))
}
