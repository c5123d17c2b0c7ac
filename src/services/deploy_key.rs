//! Deploy key
//!
//! The OpenSSH public key installed on spawned nodes, either passed to vendors that
//! accept a key at creation time or pushed post-boot by a deployment.

use std::path::Path;

use anyhow::{Context, Result};
use ssh_key::{HashAlg, PublicKey};
use tracing::info;

use crate::config::ProvisioningConfig;

/// A validated OpenSSH public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployKey {
    openssh: String,
    fingerprint: String,
}

impl DeployKey {
    /// Parse a single-line OpenSSH public key
    pub fn parse(encoded: &str) -> Result<Self> {
        let key = PublicKey::from_openssh(encoded.trim()).context("Invalid OpenSSH public key")?;
        let openssh = key
            .to_openssh()
            .context("Failed to re-encode OpenSSH public key")?;

        Ok(Self {
            openssh,
            fingerprint: key.fingerprint(HashAlg::Sha256).to_string(),
        })
    }

    /// Read a key from a `.pub` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read public key file: {:?}", path))?;
        Self::parse(&contents).with_context(|| format!("Invalid public key in {:?}", path))
    }

    /// Load the configured deploy key, inline value first
    pub fn from_config(config: &ProvisioningConfig) -> Result<Option<Self>> {
        let key = match (&config.public_key, &config.public_key_path) {
            (Some(inline), _) => Self::parse(inline)?,
            (None, Some(path)) => Self::from_file(path)?,
            (None, None) => return Ok(None),
        };

        info!("Loaded deploy key {}", key.fingerprint);
        Ok(Some(key))
    }

    pub fn as_openssh(&self) -> &str {
        &self.openssh
    }

    /// SHA-256 fingerprint, `SHA256:...`
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
