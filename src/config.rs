//! Run configuration.

use std::path::PathBuf;

use bon::Builder;

use crate::key::{DEFAULT_RSA_BITS, RsaKeyGenerator};
use crate::output::DirectorySink;
use crate::prompt::RetryPolicy;
use crate::store::{CaDirectory, CaStore, DEFAULT_CA_DIR};
use crate::workflow::{IssuanceWorkflow, WorkflowOptions};

/// Where the CA and issued certificates live, and how keys are generated.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `ca.crt`, `ca.key` and `serials.txt`.
    #[builder(into, default = PathBuf::from(DEFAULT_CA_DIR))]
    pub ca_dir: PathBuf,
    /// Directory receiving `<common name>.crt` and `<common name>.key`.
    #[builder(into, default = PathBuf::from("."))]
    pub out_dir: PathBuf,
    /// RSA modulus size for the CA and leaf keys.
    #[builder(default = DEFAULT_RSA_BITS)]
    pub key_bits: usize,
    #[builder(default = true)]
    pub enforce_ca_expiry: bool,
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Config {
    pub fn store(&self) -> CaStore<CaDirectory> {
        CaStore::new(
            CaDirectory::new(&self.ca_dir),
            RsaKeyGenerator::new(self.key_bits),
        )
    }

    pub fn workflow(&self) -> IssuanceWorkflow<CaDirectory, DirectorySink> {
        let options = WorkflowOptions::builder()
            .enforce_ca_expiry(self.enforce_ca_expiry)
            .retry(self.retry)
            .build();
        IssuanceWorkflow::new(self.store(), DirectorySink::new(&self.out_dir), options)
    }
}
