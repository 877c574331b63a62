mod util;

use std::fs;

use caforge::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier,
};
use caforge::cert::params::{CA_VALIDITY, DistinguishedName, LEAF_VALIDITY, Validity};
use caforge::cert::Certificate;
use caforge::error::CaError;
use caforge::issuer::Issuer;
use caforge::key::KeyPair;
use caforge::prompt::ScriptedInput;
use caforge::serial::SERIAL_RANGE;
use caforge::store::CaStorage;
use caforge::workflow::{WorkflowOptions, WorkflowState, WorkflowStep};
use der::Encode;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use x509_cert::Version;

pub type Result<T> = std::result::Result<T, CaError>;

/// First run with no CA: the Acme root is created and `client1` is issued
/// from it.
#[test]
fn acme_first_run() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let mut workflow = util::workflow(dir.path(), WorkflowOptions::default());
    let issued = workflow.run(&mut ScriptedInput::new(util::acme_answers("client1"))).unwrap();

    assert!(issued.ca_created);
    assert_eq!(workflow.state(), &WorkflowState::Done);
    assert!(dir.path().join("CA/ca.crt").is_file());
    assert!(dir.path().join("CA/ca.key").is_file());
    assert!(dir.path().join("client1.crt").is_file());
    assert!(dir.path().join("client1.key").is_file());

    let ca = workflow.store().load()?;
    let leaf = Certificate::from_pem(&fs::read_to_string(dir.path().join("client1.crt")).unwrap())?;
    assert_eq!(leaf, issued.certificate);

    assert_eq!(ca.certificate().subject()?, util::acme_subject());
    assert!(leaf.verify_signed_by(&ca.certificate().public_key()?)?);
    assert_eq!(leaf.issuer()?.common_name, "Acme Root");

    let (critical, bc) = leaf.extension::<BasicConstraints>()?.unwrap();
    assert!(!bc.is_ca);
    assert!(!critical);
    let (critical, ku) = leaf.extension::<KeyUsage>()?.unwrap();
    assert!(critical);
    assert_eq!(ku.0, KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);

    let leaf_key =
        KeyPair::from_pem(&fs::read_to_string(dir.path().join("client1.key")).unwrap())?;
    assert_eq!(leaf_key.public_key(), leaf.public_key()?);
    Ok(())
}

#[test]
fn ca_certificate_profile() -> Result<()> {
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    let cert = ca.certificate();

    assert_eq!(cert.inner.tbs_certificate.version, Version::V3);
    assert_eq!(cert.validity()?.duration(), Duration::hours(10 * 365 * 24));
    assert!(cert.is_self_issued());
    assert!(cert.is_ca());
    assert!(cert.verify_signed_by(&ca.key().public_key())?);
    assert!(SERIAL_RANGE.contains(&cert.serial_number()?));

    let oids: Vec<_> = cert.extensions().iter().map(|ext| ext.oid).collect();
    assert_eq!(
        oids,
        [
            <SubjectKeyIdentifier as caforge::cert::extensions::ToAndFromX509Extension>::OID,
            <AuthorityKeyIdentifier as caforge::cert::extensions::ToAndFromX509Extension>::OID,
            <BasicConstraints as caforge::cert::extensions::ToAndFromX509Extension>::OID,
        ]
    );
    let criticality: Vec<_> = cert.extensions().iter().map(|ext| ext.critical).collect();
    assert_eq!(criticality, [false, false, true]);

    let (_, ski) = cert.extension::<SubjectKeyIdentifier>()?.unwrap();
    let (_, aki) = cert.extension::<AuthorityKeyIdentifier>()?.unwrap();
    assert_eq!(ski.0, ca.key().public_key().key_identifier()?);
    assert_eq!(aki.key_identifier, ski.0);
    assert_eq!(aki.authority_cert_issuer.as_ref(), Some(cert.subject_name()));
    assert!(aki.authority_cert_serial_number.is_some());
    Ok(())
}

#[test]
fn leaf_certificate_profile() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    let workflow = util::workflow(dir.path(), WorkflowOptions::default());

    let before = OffsetDateTime::now_utc() - Duration::seconds(1);
    let (leaf, key) = workflow.issue_leaf(&ca, "client1").unwrap();
    let validity = leaf.validity()?;

    assert_eq!(leaf.inner.tbs_certificate.version, Version::V3);
    assert_eq!(validity.duration(), LEAF_VALIDITY);
    assert!(validity.not_before >= before);
    assert!(validity.contains(OffsetDateTime::now_utc()));

    assert_eq!(
        leaf.issuer_name().to_der()?,
        ca.certificate().subject_name().to_der()?
    );
    assert_eq!(leaf.subject()?, DistinguishedName::common_name_only("client1"));
    assert_eq!(leaf.public_key()?, key.public_key());
    assert!(!leaf.is_ca());
    assert!(leaf.verify_signed_by(&ca.key().public_key())?);
    assert!(!leaf.verify_signed_by(&key.public_key())?);

    let criticality: Vec<_> = leaf.extensions().iter().map(|ext| ext.critical).collect();
    assert_eq!(criticality, [false, false, true, false]);

    let (_, aki) = leaf.extension::<AuthorityKeyIdentifier>()?.unwrap();
    let (_, ca_ski) = ca.certificate().extension::<SubjectKeyIdentifier>()?.unwrap();
    assert_eq!(aki.key_identifier, ca_ski.0);
    assert_eq!(aki.authority_cert_issuer, None);
    assert_eq!(aki.authority_cert_serial_number, None);

    let (_, ski) = leaf.extension::<SubjectKeyIdentifier>()?.unwrap();
    assert_eq!(ski.0, key.public_key().key_identifier()?);
    assert!(SERIAL_RANGE.contains(&leaf.serial_number()?));
    Ok(())
}

#[test]
fn pem_round_trip_keeps_every_field() -> Result<()> {
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    let original = ca.certificate();

    let pem = original.to_pem()?;
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    let parsed = Certificate::from_pem(&pem)?;

    assert_eq!(parsed.subject()?, original.subject()?);
    assert_eq!(parsed.issuer()?, original.issuer()?);
    assert_eq!(parsed.serial_number()?, original.serial_number()?);
    assert_eq!(parsed.validity()?, original.validity()?);
    assert_eq!(parsed.extensions(), original.extensions());
    assert_eq!(parsed.to_der()?, original.to_der()?);
    assert_eq!(&Certificate::from_der(&original.to_der()?)?, original);

    let info = parsed.to_cert_info()?;
    assert!(info.is_ca);
    assert_eq!(info.subject, original.subject()?);
    assert_eq!(info.subject_public_key, ca.key().public_key());
    assert_eq!(
        parsed.to_tbs()?.to_der()?,
        original.inner.tbs_certificate.to_der()?
    );
    Ok(())
}

#[test]
fn loading_twice_is_byte_identical() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = util::store(dir.path());
    store.create(&util::acme_subject())?;

    let first = store.load()?;
    let second = store.load()?;
    assert_eq!(first.certificate().to_der()?, second.certificate().to_der()?);
    assert_eq!(first.key().to_pkcs8_pem()?, second.key().to_pkcs8_pem()?);
    Ok(())
}

/// A valid CA already on disk is loaded as-is and used for the leaf.
#[test]
fn existing_ca_is_reused() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    util::persist_ca(dir.path(), &ca);
    let cert_before = fs::read(dir.path().join("CA/ca.crt")).unwrap();
    let key_before = fs::read(dir.path().join("CA/ca.key")).unwrap();

    let mut workflow = util::workflow(dir.path(), WorkflowOptions::default());
    let mut input = ScriptedInput::new(["client2"]);
    let issued = workflow.run(&mut input).unwrap();

    assert!(!issued.ca_created);
    assert!((3649..=3650).contains(&issued.ca_days_remaining));
    assert!(
        input
            .notices()
            .contains(&format!("CA Certificate valid for {} days", issued.ca_days_remaining))
    );
    assert_eq!(fs::read(dir.path().join("CA/ca.crt")).unwrap(), cert_before);
    assert_eq!(fs::read(dir.path().join("CA/ca.key")).unwrap(), key_before);
    assert!(issued.certificate.verify_signed_by(&ca.key().public_key())?);
    Ok(())
}

#[test]
fn truncated_ca_certificate_stops_the_run() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    util::persist_ca(dir.path(), &ca);
    let cert_path = dir.path().join("CA/ca.crt");
    let pem = fs::read_to_string(&cert_path).unwrap();
    fs::write(&cert_path, &pem[..pem.len() / 2]).unwrap();

    let mut workflow = util::workflow(dir.path(), WorkflowOptions::default());
    let err = workflow.run(&mut ScriptedInput::new(["client1"])).unwrap_err();

    assert_eq!(err.step, WorkflowStep::LoadingCa);
    assert!(matches!(err.source, CaError::CaLoadError { .. }));
    assert!(!dir.path().join("client1.crt").exists());
    assert!(!dir.path().join("client1.key").exists());
    Ok(())
}

/// A CA certificate whose key has gone missing is never replaced.
#[test]
fn certificate_without_key_stops_the_run() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    util::persist_ca(dir.path(), &ca);
    let cert_path = dir.path().join("CA/ca.crt");
    let cert_before = fs::read(&cert_path).unwrap();
    fs::remove_file(dir.path().join("CA/ca.key")).unwrap();

    let mut workflow = util::workflow(dir.path(), WorkflowOptions::default());
    let err = workflow
        .run(&mut ScriptedInput::new(util::acme_answers("client1")))
        .unwrap_err();

    assert_eq!(err.step, WorkflowStep::LoadingCa);
    assert!(matches!(err.source, CaError::CaLoadError { .. }));
    assert_eq!(fs::read(&cert_path).unwrap(), cert_before);
    assert!(!dir.path().join("CA/ca.key").exists());
    assert!(!dir.path().join("client1.crt").exists());
    Ok(())
}

#[test]
fn expired_ca_is_refused_unless_allowed() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let start = OffsetDateTime::now_utc() - Duration::days(30);
    let ca = util::generate_ca(Validity::starting_at(start, Duration::days(10))?);
    util::persist_ca(dir.path(), &ca);

    let mut workflow = util::workflow(dir.path(), WorkflowOptions::default());
    let err = workflow.run(&mut ScriptedInput::new(["client1"])).unwrap_err();
    assert_eq!(err.step, WorkflowStep::VerifyingCa);
    assert!(matches!(err.source, CaError::CaExpired { days_remaining } if days_remaining < 0));
    assert!(!dir.path().join("client1.crt").exists());

    let options = WorkflowOptions::builder().enforce_ca_expiry(false).build();
    let mut workflow = util::workflow(dir.path(), options);
    let issued = workflow.run(&mut ScriptedInput::new(["client1"])).unwrap();
    assert!(issued.ca_days_remaining < 0);
    assert!(dir.path().join("client1.crt").is_file());
    Ok(())
}

#[test]
fn foreign_signing_key_is_rejected() -> Result<()> {
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    let other = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    let (cert, _) = ca.into_parts();
    let (_, other_key) = other.into_parts();

    assert!(matches!(
        caforge::cert::CaHandle::new(cert, other_key),
        Err(CaError::SigningError(_))
    ));
    Ok(())
}

#[test]
fn leaf_serials_are_recorded() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let mut workflow = util::workflow(dir.path(), WorkflowOptions::default());
    let first = workflow.run(&mut ScriptedInput::new(util::acme_answers("client1"))).unwrap();
    let second = workflow.run(&mut ScriptedInput::new(["client2"])).unwrap();

    let registry = util::store(dir.path()).serial_registry()?;
    let ca_serial = util::store(dir.path()).load()?.certificate().serial_number()?;
    assert!(registry.contains(ca_serial));
    assert!(registry.contains(first.certificate.serial_number()?));
    assert!(registry.contains(second.certificate.serial_number()?));
    assert_ne!(first.certificate.serial_number()?, second.certificate.serial_number()?);
    assert!(
        util::store(dir.path())
            .storage()
            .cert_location()
            .ends_with("CA/ca.crt")
    );
    Ok(())
}

#[test]
fn issuer_trait_signs_with_any_ca_handle() -> Result<()> {
    let ca = util::generate_ca(Validity::starting_now(CA_VALIDITY)?);
    assert_eq!(ca.issuer_name()?, ca.certificate().subject_name().clone());
    ca.check_consistency()?;
    Ok(())
}
