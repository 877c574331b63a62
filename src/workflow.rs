//! The end-to-end issuance flow.
//!
//! One run moves through
//! `NoCa -> CaCreated | CaLoaded -> Verified -> Issuing -> Done`,
//! or stops in [`WorkflowState::Failed`] naming the step that went wrong.

use std::fmt;

use bon::Builder;
use thiserror::Error;
use tracing::{debug, info};

use crate::cert::params::{CertificationRequestInfo, DistinguishedName, LEAF_VALIDITY, Validity};
use crate::cert::{CaHandle, Certificate};
use crate::error::CaError;
use crate::issuer::Issuer;
use crate::key::{KeyGenerator, KeyPair, RsaKeyGenerator};
use crate::output::{LeafArtifacts, LeafSink};
use crate::prompt::{InputProvider, RetryPolicy, collect_subject, request_non_empty};
use crate::serial::SerialAllocator;
use crate::store::{CaStorage, CaStore};

/// Prompt for the leaf common name.
pub const LEAF_CN_PROMPT: &str = "Client Certificate CN: ";

/// Shown after an empty leaf common name.
pub const EMPTY_CN_MESSAGE: &str = "Please provide a valid CN for client certificate";

/// The step a run was performing when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowStep {
    CreatingCa,
    LoadingCa,
    VerifyingCa,
    CollectingInput,
    GeneratingKey,
    AllocatingSerial,
    BuildingExtensions,
    Signing,
    WritingArtifact,
    RecordingSerial,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            WorkflowStep::CreatingCa => "creating CA",
            WorkflowStep::LoadingCa => "loading CA",
            WorkflowStep::VerifyingCa => "verifying CA",
            WorkflowStep::CollectingInput => "collecting input",
            WorkflowStep::GeneratingKey => "generating key",
            WorkflowStep::AllocatingSerial => "allocating serial",
            WorkflowStep::BuildingExtensions => "building extensions",
            WorkflowStep::Signing => "signing",
            WorkflowStep::WritingArtifact => "writing artifact",
            WorkflowStep::RecordingSerial => "recording serial",
        };
        f.write_str(step)
    }
}

/// A failed run: the step and its cause.
#[derive(Debug, Error, Clone)]
#[error("{step} failed: {source}")]
pub struct WorkflowError {
    pub step: WorkflowStep,
    #[source]
    pub source: CaError,
}

impl WorkflowError {
    pub fn new(step: WorkflowStep, source: CaError) -> Self {
        Self { step, source }
    }
}

fn at(step: WorkflowStep) -> impl FnOnce(CaError) -> WorkflowError {
    move |source| WorkflowError::new(step, source)
}

/// Where a run currently is.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowState {
    /// Nothing has happened yet.
    Pending,
    /// No CA is stored; one is about to be created.
    NoCa,
    CaCreated,
    CaLoaded,
    Verified { days_remaining: i64 },
    Issuing { common_name: String },
    Done,
    Failed { step: WorkflowStep, error: String },
}

/// Knobs for a run.
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Refuse to issue from an expired CA.
    #[builder(default = true)]
    pub enforce_ca_expiry: bool,
    /// How often an empty leaf common name is asked again.
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The outcome of a successful run.
#[derive(Debug, Clone)]
pub struct IssuedLeaf {
    pub certificate: Certificate,
    pub artifacts: LeafArtifacts,
    /// Whole days the CA had left when the leaf was issued.
    pub ca_days_remaining: i64,
    /// Whether this run created the CA.
    pub ca_created: bool,
}

/// Ensures a CA exists, checks it, and issues one leaf certificate.
pub struct IssuanceWorkflow<S, O, G = RsaKeyGenerator> {
    store: CaStore<S, G>,
    sink: O,
    serials: SerialAllocator,
    options: WorkflowOptions,
    state: WorkflowState,
}

impl<S, O, G> IssuanceWorkflow<S, O, G>
where
    S: CaStorage,
    O: LeafSink,
    G: KeyGenerator,
{
    pub fn new(store: CaStore<S, G>, sink: O, options: WorkflowOptions) -> Self {
        Self {
            store,
            sink,
            serials: SerialAllocator::default(),
            options,
            state: WorkflowState::Pending,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn store(&self) -> &CaStore<S, G> {
        &self.store
    }

    pub fn options(&self) -> WorkflowOptions {
        self.options
    }

    /// Runs the whole flow, asking `input` for whatever is missing.
    pub fn run(&mut self, input: &mut dyn InputProvider) -> Result<IssuedLeaf, WorkflowError> {
        let result = self.drive(input);
        if let Err(err) = &result {
            self.transition(WorkflowState::Failed {
                step: err.step,
                error: err.source.to_string(),
            });
        }
        result
    }

    fn drive(&mut self, input: &mut dyn InputProvider) -> Result<IssuedLeaf, WorkflowError> {
        let (ca, ca_created) = self.ensure_ca(input)?;
        let ca_days_remaining = self.verify(&ca, input)?;

        let common_name =
            request_non_empty(input, LEAF_CN_PROMPT, EMPTY_CN_MESSAGE, self.options.retry)
                .map_err(at(WorkflowStep::CollectingInput))?;
        self.transition(WorkflowState::Issuing {
            common_name: common_name.clone(),
        });

        let (certificate, key) = self.issue_leaf(&ca, &common_name)?;
        let artifacts = self
            .sink
            .store_leaf(&common_name, &certificate, &key)
            .map_err(at(WorkflowStep::WritingArtifact))?;

        let serial = certificate
            .serial_number()
            .map_err(at(WorkflowStep::RecordingSerial))?;
        self.store
            .record_serial(serial)
            .map_err(at(WorkflowStep::RecordingSerial))?;

        info!(common_name = %common_name, serial, "leaf certificate issued");
        self.transition(WorkflowState::Done);

        Ok(IssuedLeaf {
            certificate,
            artifacts,
            ca_days_remaining,
            ca_created,
        })
    }

    fn ensure_ca(&mut self, input: &mut dyn InputProvider) -> Result<(CaHandle, bool), WorkflowError> {
        if self.store.exists() {
            let location = self.store.storage().cert_location();
            input.notify(&format!(
                "CA certificate has been found as {}",
                location.display()
            ));
            let ca = self.store.load().map_err(at(WorkflowStep::LoadingCa))?;
            self.transition(WorkflowState::CaLoaded);
            return Ok((ca, false));
        }

        self.transition(WorkflowState::NoCa);
        input.notify("Creating CA Certificate, Please provide the values");
        let subject = collect_subject(input).map_err(at(WorkflowStep::CollectingInput))?;
        let ca = self
            .store
            .create(&subject)
            .map_err(at(WorkflowStep::CreatingCa))?;
        self.transition(WorkflowState::CaCreated);
        Ok((ca, true))
    }

    fn verify(&mut self, ca: &CaHandle, input: &mut dyn InputProvider) -> Result<i64, WorkflowError> {
        let days_remaining = self
            .store
            .check_validity(ca.certificate())
            .map_err(at(WorkflowStep::VerifyingCa))?;
        input.notify(&format!("CA Certificate valid for {days_remaining} days"));

        if days_remaining < 0 && self.options.enforce_ca_expiry {
            return Err(WorkflowError::new(
                WorkflowStep::VerifyingCa,
                CaError::CaExpired { days_remaining },
            ));
        }
        self.transition(WorkflowState::Verified { days_remaining });
        Ok(days_remaining)
    }

    /// Issues a leaf for `common_name` signed by `ca`, with a fresh key and
    /// a serial not yet used by this CA. Nothing is persisted.
    pub fn issue_leaf(
        &self,
        ca: &CaHandle,
        common_name: &str,
    ) -> Result<(Certificate, KeyPair), WorkflowError> {
        let registry = self
            .store
            .serial_registry()
            .map_err(at(WorkflowStep::AllocatingSerial))?;
        let serial = self
            .serials
            .next_unique(&registry)
            .map_err(at(WorkflowStep::AllocatingSerial))?;

        let key = self
            .store
            .key_generator()
            .generate()
            .map_err(at(WorkflowStep::GeneratingKey))?;

        let cert_info = CertificationRequestInfo::builder()
            .subject(DistinguishedName::common_name_only(common_name))
            .subject_public_key(key.public_key())
            .build();
        let validity = Validity::starting_now(LEAF_VALIDITY).map_err(at(WorkflowStep::Signing))?;

        let certificate = ca.issue(&cert_info, validity, serial).map_err(|e| {
            let step = match e {
                CaError::ExtensionBuildError(_) => WorkflowStep::BuildingExtensions,
                _ => WorkflowStep::Signing,
            };
            WorkflowError::new(step, e)
        })?;

        debug!(common_name, serial, "leaf certificate signed");
        Ok((certificate, key))
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!(from = ?self.state, to = ?next, "workflow transition");
        self.state = next;
    }
}
