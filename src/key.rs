use std::fmt;

use pkcs8::LineEnding;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey},
    signature::{SignatureEncoding, Signer, Verifier},
    traits::PublicKeyParts,
};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CaError, Result};
use crate::pem_utils;

/// Modulus size used for both CA and leaf keys.
pub const DEFAULT_RSA_BITS: usize = 4096;

/// An RSA key pair owned by a certificate until it is exported.
#[derive(Clone)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CaError::KeyGenerationError(e.to_string()))?;
        Ok(Self::from_private(private))
    }

    fn from_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    /// Modulus length in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public.clone())
    }

    /// The public half as a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().as_spki()
    }

    /// Signs `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new(self.private.as_ref().clone());
        let signature: Signature = signing_key
            .try_sign(data)
            .map_err(|e| CaError::SigningError(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Encodes the private key as an unencrypted PKCS#8 PEM block.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(pem.as_str().to_owned())
    }

    /// Parses a PEM private key.
    ///
    /// Accepts PKCS#8 (`PRIVATE KEY`) and, for keys produced by other tools,
    /// PKCS#1 (`RSA PRIVATE KEY`).
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let private = match pem_utils::pem_label(pem_str)?.as_str() {
            "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_pem(pem_str)?,
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_pem(pem_str)
                .map_err(|e| CaError::DecodingError(e.to_string()))?,
            other => {
                return Err(CaError::DecodingError(format!(
                    "unsupported private key label: {other}"
                )));
            }
        };
        Ok(Self::from_private(private))
    }
}

/// The public half of an RSA key pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Extracts an RSA public key from a certificate's `SubjectPublicKeyInfo`.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = der::Encode::to_der(spki)?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CaError::DecodingError(e.to_string()))?;
        Ok(PublicKey(public))
    }

    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned::from_key(self.0.clone())?)
    }

    /// RFC 5280 method 1 key identifier: SHA-1 of the subjectPublicKey bits.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.as_spki()?;
        Ok(Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec())
    }

    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    /// Checks an RSASSA-PKCS1-v1_5 / SHA-256 signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let verifying_key = VerifyingKey::<Sha256>::new(self.0.clone());
        Signature::try_from(signature)
            .map(|sig| verifying_key.verify(data, &sig).is_ok())
            .unwrap_or(false)
    }
}

/// Produces fresh key pairs for new certificates.
pub trait KeyGenerator {
    fn generate(&self) -> Result<KeyPair>;
}

/// Generates RSA keys of a fixed modulus size.
#[derive(Clone, Copy, Debug)]
pub struct RsaKeyGenerator {
    bits: usize,
}

impl RsaKeyGenerator {
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> usize {
        self.bits
    }
}

impl Default for RsaKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_RSA_BITS)
    }
}

impl KeyGenerator for RsaKeyGenerator {
    fn generate(&self) -> Result<KeyPair> {
        tracing::debug!(bits = self.bits, "generating RSA key pair");
        KeyPair::generate_rsa(self.bits)
    }
}
