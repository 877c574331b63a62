//! # caforge - A Minimal Pure Rust Certificate Authority
//!
//! caforge creates a self-signed RSA root CA, keeps it in a directory, and
//! issues client certificates signed by it. It is built entirely on the
//! RustCrypto libraries.
//!
//! ## Certificate Profiles
//!
//! - **Root CA**: RSA-4096, valid for 10×365 days, extensions
//!   subjectKeyIdentifier, authorityKeyIdentifier and a critical
//!   basicConstraints `CA:true`.
//! - **Leaf**: RSA-4096, valid for 365 days, subject holds only the common
//!   name, extensions basicConstraints `CA:false`, authorityKeyIdentifier,
//!   a critical keyUsage (digitalSignature, keyEncipherment) and
//!   subjectKeyIdentifier.
//!
//! Both are signed with sha256WithRSAEncryption and stored as PEM.
//!
//! ## Quick Start
//!
//! ### Issuing from a CA held in memory
//!
//! ```rust,no_run
//! use caforge::{
//!     cert::{CaHandle, Certificate, params::{CA_VALIDITY, LEAF_VALIDITY, CertificationRequestInfo, DistinguishedName, Validity}},
//!     issuer::Issuer,
//!     key::{KeyGenerator, RsaKeyGenerator},
//!     serial::SerialAllocator,
//! };
//!
//! # fn main() -> Result<(), caforge::error::CaError> {
//! let keys = RsaKeyGenerator::default();
//! let serials = SerialAllocator::default();
//!
//! let ca_key = keys.generate()?;
//! let ca_info = CertificationRequestInfo::builder()
//!     .subject(
//!         DistinguishedName::builder()
//!             .common_name("Example Root".to_string())
//!             .organization("Example Corp".to_string())
//!             .build(),
//!     )
//!     .subject_public_key(ca_key.public_key())
//!     .is_ca(true)
//!     .build();
//! let ca_cert = Certificate::new_self_signed(
//!     &ca_info,
//!     &ca_key,
//!     Validity::starting_now(CA_VALIDITY)?,
//!     serials.next(),
//! )?;
//! let ca = CaHandle::new(ca_cert, ca_key)?;
//!
//! let leaf_key = keys.generate()?;
//! let leaf_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::common_name_only("client1"))
//!     .subject_public_key(leaf_key.public_key())
//!     .build();
//! let leaf = ca.issue(&leaf_info, Validity::starting_now(LEAF_VALIDITY)?, serials.next())?;
//!
//! println!("{}", leaf.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Running the interactive flow
//!
//! ```rust,no_run
//! use caforge::{config::Config, prompt::ConsoleInput};
//!
//! let mut workflow = Config::default().workflow();
//! match workflow.run(&mut ConsoleInput) {
//!     Ok(issued) => println!("wrote {}", issued.artifacts.cert_path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: RSA key generation, PEM import/export, signing and verification
//! - [`serial`]: Serial number allocation and the issued serial registry
//! - [`cert`]: Certificate encoding/decoding, extensions and the CA handle
//! - [`issuer`]: Building and signing certificates
//! - [`tbs_certificate`]: The unsigned certificate draft
//! - [`store`]: Creating, loading and checking the persisted CA
//! - [`output`]: Persisting issued leaf certificates
//! - [`prompt`]: Operator input
//! - [`workflow`]: The end-to-end issuance flow
//! - [`config`]: Run configuration
//! - [`error`]: Error types

pub mod cert;
pub mod config;
pub mod error;
pub mod issuer;
pub mod key;
pub mod output;
pub mod pem_utils;
pub mod prompt;
pub mod serial;
pub mod store;
pub mod tbs_certificate;
pub mod workflow;
