#![allow(dead_code)]

use std::path::Path;

use caforge::cert::params::{CertificationRequestInfo, DistinguishedName, SubjectInfo, Validity};
use caforge::cert::{CaHandle, Certificate};
use caforge::key::{KeyGenerator, RsaKeyGenerator};
use caforge::output::DirectorySink;
use caforge::serial::SerialAllocator;
use caforge::store::{CaDirectory, CaStorage, CaStore};
use caforge::workflow::{IssuanceWorkflow, WorkflowOptions};

/// Small keys keep the tests fast; the profile is otherwise unchanged.
pub const TEST_KEY_BITS: usize = 1024;

pub fn key_generator() -> RsaKeyGenerator {
    RsaKeyGenerator::new(TEST_KEY_BITS)
}

pub fn acme_subject() -> SubjectInfo {
    DistinguishedName::builder()
        .country("US".to_string())
        .state("CA".to_string())
        .locality("SF".to_string())
        .organization("Acme".to_string())
        .organization_unit("Eng".to_string())
        .common_name("Acme Root".to_string())
        .email("a@acme.com".to_string())
        .build()
}

/// Operator answers for a first run followed by the leaf common name.
pub fn acme_answers(leaf_cn: &str) -> Vec<String> {
    [
        "US",
        "CA",
        "SF",
        "Acme",
        "Eng",
        "Acme Root",
        "a@acme.com",
        leaf_cn,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn store(root: &Path) -> CaStore<CaDirectory> {
    CaStore::new(CaDirectory::new(root.join("CA")), key_generator())
}

pub fn workflow(root: &Path, options: WorkflowOptions) -> IssuanceWorkflow<CaDirectory, DirectorySink> {
    IssuanceWorkflow::new(store(root), DirectorySink::new(root), options)
}

/// Builds an in-memory root CA with the given validity window.
pub fn generate_ca(validity: Validity) -> CaHandle {
    let ca_key = key_generator().generate().unwrap();
    let ca_cert_info = CertificationRequestInfo::builder()
        .subject(acme_subject())
        .subject_public_key(ca_key.public_key())
        .is_ca(true)
        .build();
    let cert = Certificate::new_self_signed(
        &ca_cert_info,
        &ca_key,
        validity,
        SerialAllocator::default().next(),
    )
    .unwrap();
    CaHandle::new(cert, ca_key).unwrap()
}

/// Persists `ca` into the `CA` directory under `root`.
pub fn persist_ca(root: &Path, ca: &CaHandle) {
    CaDirectory::new(root.join("CA"))
        .write_pair(
            &ca.certificate().to_pem().unwrap(),
            &ca.key().to_pkcs8_pem().unwrap(),
        )
        .unwrap();
}
