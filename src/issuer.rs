use der::Encode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::ExtensionBuilder;
use crate::cert::params::{CertificationRequestInfo, Validity};
use crate::error::{CaError, Result};
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// The provided [`Issuer::issue`] is the certificate factory: it fills a
/// [`TbsCertificate`] draft in order (version and serial, names, subject key,
/// extensions, validity) and signs it with [`Issuer::signing_key`].
///
/// The signing key is trusted to belong to the entity named by
/// [`Issuer::issuer_name`]; implementors that can check this override
/// [`Issuer::check_consistency`].
pub trait Issuer {
    /// Returns the distinguished name of the issuer, exactly as it will be
    /// written into issued certificates.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Key identifier placed in the authorityKeyIdentifier of issued
    /// certificates.
    fn key_identifier(&self) -> Result<Vec<u8>> {
        self.signing_key().public_key().key_identifier()
    }

    /// Fails with [`CaError::SigningError`] when the signing key does not
    /// belong to the declared issuer.
    fn check_consistency(&self) -> Result<()> {
        Ok(())
    }

    /// Issues a certificate based on the provided certification request information.
    ///
    /// # Arguments
    /// * `cert_request` - Subject, subject public key and CA/leaf profile.
    /// * `validity` - The validity window; `not_before` is the issuance instant.
    /// * `serial_number` - Serial for the new certificate.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        serial_number: u64,
    ) -> Result<Certificate> {
        self.check_consistency()?;

        let mut tbs_cert = TbsCertificate::new(serial_number);
        tbs_cert.bind_names(cert_request.subject.as_x509_name()?, self.issuer_name()?);
        tbs_cert.bind_public_key(cert_request.subject_public_key.clone());

        let extensions = if cert_request.is_ca {
            ExtensionBuilder::build_ca_extensions(&tbs_cert)?
        } else {
            ExtensionBuilder::build_leaf_extensions(self, &tbs_cert)?
        };
        tbs_cert.attach_extensions(extensions);
        tbs_cert.set_validity(validity);

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CaError::SigningError(format!("encoding TBS certificate: {e}")))?;
        let signature = self.signing_key().sign_data(&tbs_der)?;

        let cert_inner = CertificateInner {
            signature_algorithm: tbs_cert_inner.signature.clone(),
            tbs_certificate: tbs_cert_inner,
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| CaError::SigningError(e.to_string()))?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}
