pub mod extensions;
pub mod params;

use der::asn1::Any;
use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{BasicConstraints, SubjectKeyIdentifier, ToAndFromX509Extension};
use params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::{TbsCertificate, from_x509_time, serial_from_bytes};

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA signature algorithms carry an explicit NULL parameter (RFC 4055).
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
        }
    }
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = CaError;

    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self> {
        match value.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRSA)
            }
            other => Err(CaError::DecodingError(format!(
                "unsupported signature algorithm {other}"
            ))),
        }
    }
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der_bytes)?,
        })
    }

    /// Parses a single `CERTIFICATE` PEM block.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_pem(pem_str)?,
        })
    }

    pub fn serial_number(&self) -> Result<u64> {
        serial_from_bytes(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn subject_name(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer_name(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(self.subject_name())
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(self.issuer_name())
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn validity(&self) -> Result<Validity> {
        let validity = &self.inner.tbs_certificate.validity;
        Ok(Validity {
            not_before: from_x509_time(validity.not_before)?,
            not_after: from_x509_time(validity.not_after)?,
        })
    }

    /// Extensions in the order they appear in the certificate.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Looks up and decodes one extension, returning it with its criticality.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<(bool, E)>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>().map(|value| (ext.critical, value)))
            .transpose()
    }

    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some((_, BasicConstraints { is_ca: true, .. })))
        )
    }

    /// Whether issuer and subject encode to the same bytes.
    pub fn is_self_issued(&self) -> bool {
        match (self.subject_name().to_der(), self.issuer_name().to_der()) {
            (Ok(subject), Ok(issuer)) => subject == issuer,
            _ => false,
        }
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<bool> {
        if self.inner.signature_algorithm != self.inner.tbs_certificate.signature {
            return Ok(false);
        }
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::DecodingError("signature has unused bits".to_string())
        })?;
        Ok(issuer_key.verify(&tbs, signature))
    }

    /// Whole days from `now` until `notAfter`, rounded down; negative once
    /// the certificate has expired.
    pub fn days_remaining(&self, now: OffsetDateTime) -> Result<i64> {
        let remaining = self.validity()?.not_after - now;
        Ok(remaining.whole_seconds().div_euclid(86_400))
    }

    /// Extracts certificate information into a `CertificationRequestInfo` object.
    pub fn to_cert_info(&self) -> Result<CertificationRequestInfo> {
        Ok(CertificationRequestInfo {
            subject: self.subject()?,
            subject_public_key: self.public_key()?,
            is_ca: self.is_ca(),
        })
    }

    /// Draft view of the signed portion.
    pub fn to_tbs(&self) -> Result<TbsCertificate> {
        TbsCertificate::from_tbs_certificate_inner(&self.inner.tbs_certificate)
    }

    /// Creates a new self-signed certificate.
    ///
    /// The subject public key in `cert_info` must belong to `key`.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
        serial_number: u64,
    ) -> Result<Self> {
        if cert_info.subject_public_key != key.public_key() {
            return Err(CaError::SigningError(
                "self-signed certificate key does not match the signing key".to_string(),
            ));
        }

        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.as_x509_name()?,
            key,
        };
        self_issuer.issue(cert_info, validity, serial_number)
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// The root CA: its certificate together with the matching private key.
#[derive(Debug, Clone)]
pub struct CaHandle {
    cert: Certificate,
    key: KeyPair,
}

impl CaHandle {
    /// Pairs a certificate with its key, rejecting a key that does not
    /// belong to the certificate.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        let handle = Self { cert, key };
        handle.check_consistency()?;
        Ok(handle)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.cert
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    pub fn into_parts(self) -> (Certificate, KeyPair) {
        (self.cert, self.key)
    }
}

impl Issuer for CaHandle {
    fn issuer_name(&self) -> Result<Name> {
        // The name of the issuer is the subject of the certificate, byte for byte
        Ok(self.cert.subject_name().clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.cert.extension::<SubjectKeyIdentifier>()? {
            Some((_, ski)) => Ok(ski.0),
            None => self.key.public_key().key_identifier(),
        }
    }

    fn check_consistency(&self) -> Result<()> {
        let cert_spki = self.cert.inner.tbs_certificate.subject_public_key_info.to_der()?;
        let key_spki = self.key.as_spki()?.to_der()?;
        if cert_spki != key_spki {
            return Err(CaError::SigningError(
                "CA private key does not belong to the CA certificate".to_string(),
            ));
        }
        Ok(())
    }
}
