//! Persistence of the root CA.
//!
//! The CA lives in a directory holding `ca.crt` (PEM certificate), `ca.key`
//! (unencrypted PKCS#8 PEM key) and `serials.txt` (serials issued so far).
//! [`CaStorage`] covers the file mechanics; [`CaStore`] turns stored bytes
//! into a [`CaHandle`] and creates the CA when there is none.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::cert::params::{CA_VALIDITY, CertificationRequestInfo, SubjectInfo, Validity};
use crate::cert::{CaHandle, Certificate};
use crate::error::{CaError, Result};
use crate::key::{KeyGenerator, KeyPair, RsaKeyGenerator};
use crate::serial::{IssuedSerialRegistry, SerialAllocator};

/// CA certificate filename.
pub const CA_CERT_FILENAME: &str = "ca.crt";

/// CA private key filename.
pub const CA_KEY_FILENAME: &str = "ca.key";

/// Issued serial registry filename.
pub const SERIALS_FILENAME: &str = "serials.txt";

/// Default CA directory, relative to the working directory.
pub const DEFAULT_CA_DIR: &str = "CA";

const STAGING_SUFFIX: &str = ".tmp";

/// Durable storage for the CA's PEM artifacts.
pub trait CaStorage {
    /// Where the certificate lives, for messages.
    fn cert_location(&self) -> PathBuf;

    /// Where the private key lives, for messages.
    fn key_location(&self) -> PathBuf;

    /// True once a CA certificate is present. A certificate without its key
    /// still counts, so that loading fails instead of a new CA replacing it.
    fn exists(&self) -> bool;

    /// Reads `(certificate PEM, key PEM)`.
    fn read_pair(&self) -> Result<(String, String)>;

    /// Writes both artifacts, the certificate last, so that a failure part
    /// way leaves [`exists`] false.
    ///
    /// [`exists`]: CaStorage::exists
    fn write_pair(&self, cert_pem: &str, key_pem: &str) -> Result<()>;

    /// Reads the issued serial registry; an absent registry is empty.
    fn read_serials(&self) -> Result<IssuedSerialRegistry>;

    fn write_serials(&self, registry: &IssuedSerialRegistry) -> Result<()>;
}

/// A CA kept in a filesystem directory.
#[derive(Clone, Debug)]
pub struct CaDirectory {
    dir: PathBuf,
}

impl CaDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn serials_path(&self) -> PathBuf {
        self.dir.join(SERIALS_FILENAME)
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            info!(dir = %self.dir.display(), "creating CA directory");
        }
        fs::create_dir_all(&self.dir).map_err(|e| CaError::write(&self.dir, e))
    }
}

impl CaStorage for CaDirectory {
    fn cert_location(&self) -> PathBuf {
        self.dir.join(CA_CERT_FILENAME)
    }

    fn key_location(&self) -> PathBuf {
        self.dir.join(CA_KEY_FILENAME)
    }

    fn exists(&self) -> bool {
        self.cert_location().is_file()
    }

    fn read_pair(&self) -> Result<(String, String)> {
        let cert_path = self.cert_location();
        let key_path = self.key_location();
        let cert_pem = fs::read_to_string(&cert_path).map_err(|e| CaError::load(&cert_path, e))?;
        let key_pem = fs::read_to_string(&key_path).map_err(|e| CaError::load(&key_path, e))?;
        Ok((cert_pem, key_pem))
    }

    fn write_pair(&self, cert_pem: &str, key_pem: &str) -> Result<()> {
        self.ensure_dir()?;
        let cert_path = self.cert_location();
        let key_path = self.key_location();

        // Stage both, then publish the key before the certificate: `exists`
        // keys on the certificate, so a crash at any point leaves no visible CA.
        let staged_key = stage(&key_path, key_pem, true)?;
        let staged_cert = stage(&cert_path, cert_pem, false)?;
        publish(&staged_key, &key_path)?;
        publish(&staged_cert, &cert_path)?;
        Ok(())
    }

    fn read_serials(&self) -> Result<IssuedSerialRegistry> {
        let path = self.serials_path();
        if !path.exists() {
            debug!(path = %path.display(), "no serial registry yet");
            return Ok(IssuedSerialRegistry::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| CaError::load(&path, e))?;
        IssuedSerialRegistry::parse(&text).map_err(|e| CaError::load(&path, e))
    }

    fn write_serials(&self, registry: &IssuedSerialRegistry) -> Result<()> {
        self.ensure_dir()?;
        let path = self.serials_path();
        let staged = stage(&path, &registry.to_text(), false)?;
        publish(&staged, &path)
    }
}

/// Writes `contents` next to `path` under a staging name and returns that
/// name. Private files are restricted to the owner on Unix.
pub(crate) fn stage(path: &Path, contents: &str, private: bool) -> Result<PathBuf> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(STAGING_SUFFIX);
    let staged = PathBuf::from(staged);

    // A leftover staging file keeps its old mode when reopened.
    match fs::remove_file(&staged) {
        Ok(()) => debug!(path = %staged.display(), "removed stale staging file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(CaError::write(path, e)),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }

    let mut file = options.open(&staged).map_err(|e| CaError::write(path, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| CaError::write(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if private {
            let perms = fs::Permissions::from_mode(0o600);
            if let Err(e) = fs::set_permissions(&staged, perms) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to set restrictive permissions on private key file"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(staged)
}

/// Atomically moves a staged file into place.
pub(crate) fn publish(staged: &Path, path: &Path) -> Result<()> {
    fs::rename(staged, path).map_err(|e| CaError::write(path, e))
}

/// Creates, loads and inspects the root CA held by a [`CaStorage`].
#[derive(Debug)]
pub struct CaStore<S, G = RsaKeyGenerator> {
    storage: S,
    key_generator: G,
    serials: SerialAllocator,
}

impl<S: CaStorage, G: KeyGenerator> CaStore<S, G> {
    pub fn new(storage: S, key_generator: G) -> Self {
        Self {
            storage,
            key_generator,
            serials: SerialAllocator::default(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn key_generator(&self) -> &G {
        &self.key_generator
    }

    pub fn exists(&self) -> bool {
        self.storage.exists()
    }

    /// Generates a key pair and a self-signed CA certificate for `subject`,
    /// persists both and returns them.
    pub fn create(&self, subject: &SubjectInfo) -> Result<CaHandle> {
        info!(common_name = %subject.common_name, "generating new CA certificate");

        let key = self.key_generator.generate()?;
        let serial = self.serials.next();
        let cert_info = CertificationRequestInfo::builder()
            .subject(subject.clone())
            .subject_public_key(key.public_key())
            .is_ca(true)
            .build();
        let validity = Validity::starting_now(CA_VALIDITY)?;
        let cert = Certificate::new_self_signed(&cert_info, &key, validity, serial)?;

        self.storage
            .write_pair(&cert.to_pem()?, &key.to_pkcs8_pem()?)?;

        let mut registry = IssuedSerialRegistry::new();
        registry.insert(serial);
        self.storage.write_serials(&registry)?;

        info!(
            serial,
            path = %self.storage.cert_location().display(),
            "CA certificate created"
        );
        CaHandle::new(cert, key)
    }

    /// Reads the persisted CA and checks that its key matches its certificate.
    pub fn load(&self) -> Result<CaHandle> {
        let cert_path = self.storage.cert_location();
        let key_path = self.storage.key_location();

        let (cert_pem, key_pem) = self.storage.read_pair()?;
        let cert = Certificate::from_pem(&cert_pem).map_err(|e| CaError::load(&cert_path, e))?;
        let key = KeyPair::from_pem(&key_pem).map_err(|e| CaError::load(&key_path, e))?;
        let handle = CaHandle::new(cert, key).map_err(|e| CaError::load(&key_path, e))?;

        debug!(path = %cert_path.display(), "loaded CA");
        Ok(handle)
    }

    /// Whole days until `cert` expires, negative once it has.
    pub fn check_validity(&self, cert: &Certificate) -> Result<i64> {
        let days = cert.days_remaining(OffsetDateTime::now_utc())?;
        if days < 0 {
            warn!(days, "CA certificate has expired");
        } else {
            info!(days, "CA certificate validity");
        }
        Ok(days)
    }

    pub fn serial_registry(&self) -> Result<IssuedSerialRegistry> {
        self.storage.read_serials()
    }

    /// Adds `serial` to the persisted registry.
    pub fn record_serial(&self, serial: u64) -> Result<()> {
        let mut registry = self.storage.read_serials()?;
        if registry.insert(serial) {
            self.storage.write_serials(&registry)?;
        }
        Ok(())
    }
}
