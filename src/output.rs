//! Where issued leaf certificates end up.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cert::Certificate;
use crate::error::{CaError, Result};
use crate::key::KeyPair;
use crate::store::{publish, stage};

/// Paths of a persisted leaf certificate and its key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafArtifacts {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Receives each issued leaf certificate with its private key.
pub trait LeafSink {
    fn store_leaf(&self, common_name: &str, cert: &Certificate, key: &KeyPair)
    -> Result<LeafArtifacts>;
}

/// Writes `<common name>.crt` and `<common name>.key` into a directory.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The two output paths for `common_name`, after checking it is usable
    /// as a file name.
    pub fn paths_for(&self, common_name: &str) -> Result<LeafArtifacts> {
        if common_name.is_empty()
            || common_name == "."
            || common_name == ".."
            || common_name.contains(['/', '\\', '\0'])
        {
            return Err(CaError::InvalidInput(format!(
                "common name {common_name:?} cannot be used as a file name"
            )));
        }
        Ok(LeafArtifacts {
            cert_path: self.dir.join(format!("{common_name}.crt")),
            key_path: self.dir.join(format!("{common_name}.key")),
        })
    }
}

impl LeafSink for DirectorySink {
    fn store_leaf(
        &self,
        common_name: &str,
        cert: &Certificate,
        key: &KeyPair,
    ) -> Result<LeafArtifacts> {
        let artifacts = self.paths_for(common_name)?;
        fs::create_dir_all(&self.dir).map_err(|e| CaError::write(&self.dir, e))?;

        let staged_key = stage(&artifacts.key_path, &key.to_pkcs8_pem()?, true)?;
        let staged_cert = stage(&artifacts.cert_path, &cert.to_pem()?, false)?;
        publish(&staged_key, &artifacts.key_path)?;
        publish(&staged_cert, &artifacts.cert_path)?;

        info!(
            cert = %artifacts.cert_path.display(),
            key = %artifacts.key_path.display(),
            "leaf certificate written"
        );
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_named_after_common_name() {
        let sink = DirectorySink::new("out");
        let artifacts = sink.paths_for("client1").unwrap();
        assert_eq!(artifacts.cert_path, Path::new("out/client1.crt"));
        assert_eq!(artifacts.key_path, Path::new("out/client1.key"));
    }

    #[test]
    fn path_like_common_names_are_rejected() {
        let sink = DirectorySink::new("out");
        for name in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(
                matches!(sink.paths_for(name), Err(CaError::InvalidInput(_))),
                "{name:?} accepted"
            );
        }
    }
}
