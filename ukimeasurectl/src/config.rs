// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Configuration management for ukimeasurectl
//!
//! Settings are merged from several sources, highest precedence first:
//!
//! 1. Command-line arguments
//! 2. Environment variables (prefixed with `UKIMEASURE_`)
//! 3. Configuration files (TOML format)
//! 4. Default values
//!
//! Without an explicit `--config`, the files `ukimeasure.toml` (current
//! directory) and `/etc/ukimeasure/ukimeasure.conf` are read when they
//! exist.
//!
//! ## Environment Variables
//! - `UKIMEASURE_PCR=12`
//! - `UKIMEASURE_BANKS=sha256,sha384`
//! - `UKIMEASURE_SIGNING_KEY=/etc/kernel/pcr-private.pem`
//!
//! ## Example Configuration File
//!
//! ```toml
//! pcr = 11
//! banks = ["sha256"]
//! signing_key = "/etc/kernel/pcr-private.pem"
//!
//! [[phases]]
//! phase = "enter-initrd"
//!
//! [[phases]]
//! phase = "leave-initrd"
//! sign = false
//! ```

use std::path::PathBuf;

use config::{ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use ukimeasure::{
    phases::ordered_phases, selection::MAX_PCR_INDEX, BankAssembler,
    HashAlgorithm, PhaseInfo, UKI_PCR,
};

use crate::{error::ValidationError, Cli};

const LOCAL_CONFIG: &str = "ukimeasure.toml";
const SYSTEM_CONFIG: &str = "/etc/ukimeasure/ukimeasure.conf";

/// Merged ukimeasurectl configuration
///
/// `banks` and `phases` stay `None` unless set explicitly, so that a list
/// from a file or the environment replaces the built-in one as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the first configuration file that was read
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
    /// PCR the policies are bound to
    pub pcr: u32,
    /// PCR banks to compute, all of them when unset
    pub banks: Option<Vec<HashAlgorithm>>,
    /// Boot phases to walk, the systemd ones when unset
    pub phases: Option<Vec<PhaseInfo>>,
    /// PEM file with the RSA private key used to sign the policies
    pub signing_key: Option<String>,
    pub signing_key_password: Option<String>,
    /// Where to write the JSON document, stdout when unset
    pub output: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            loaded_from: None,
            pcr: UKI_PCR,
            banks: None,
            phases: None,
            signing_key: None,
            signing_key_password: None,
            output: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, files and the environment
    ///
    /// # Errors
    ///
    /// Returns ConfigError if an explicit configuration file does not
    /// exist, a file cannot be parsed or a value has the wrong type.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(explicit_path) = config_path {
            if !PathBuf::from(explicit_path).exists() {
                return Err(ConfigError::Message(format!(
                    "Specified configuration file not found: {explicit_path}"
                )));
            }
        }

        let mut loaded_path: Option<PathBuf> = None;
        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                if loaded_path.is_none() {
                    loaded_path = Some(path.clone());
                }
                log::debug!("Loading config from: {}", path.display());
                builder = builder.add_source(
                    File::from(path).format(FileFormat::Toml).required(false),
                );
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("UKIMEASURE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("banks")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.loaded_from = loaded_path;

        if config.loaded_from.is_none() {
            log::info!("No configuration files found, using defaults and environment variables");
        }

        Ok(config)
    }

    /// Configuration files to read, lowest precedence first
    fn get_config_paths(config_path: Option<&str>) -> Vec<PathBuf> {
        match config_path {
            Some(path) => vec![PathBuf::from(path)],
            None => {
                vec![PathBuf::from(SYSTEM_CONFIG), PathBuf::from(LOCAL_CONFIG)]
            }
        }
    }

    /// Apply command-line argument overrides
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if let Some(pcr) = cli.pcr {
            self.pcr = pcr;
        }

        if !cli.banks.is_empty() {
            self.banks = Some(cli.banks.clone());
        }

        if let Some(ref key) = cli.key {
            self.signing_key = Some(key.clone());
        }

        if let Some(ref password) = cli.key_password {
            self.signing_key_password = Some(password.clone());
        }

        self
    }

    pub fn banks(&self) -> Vec<HashAlgorithm> {
        self.banks
            .clone()
            .unwrap_or_else(|| HashAlgorithm::ALL.to_vec())
    }

    pub fn phases(&self) -> Vec<PhaseInfo> {
        self.phases.clone().unwrap_or_else(ordered_phases)
    }

    /// Check the merged configuration before running a command
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pcr > MAX_PCR_INDEX {
            return Err(ValidationError::PcrOutOfRange(self.pcr));
        }

        if self.banks().is_empty() {
            return Err(ValidationError::NoBanks);
        }

        let phases = self.phases();
        if phases.is_empty() {
            return Err(ValidationError::NoPhases);
        }
        if phases.iter().any(|p| p.phase.is_empty()) {
            return Err(ValidationError::EmptyPhase);
        }

        Ok(())
    }

    /// Assembler for the configured PCR, banks and phases
    pub fn assembler(&self) -> BankAssembler {
        BankAssembler::new(self.pcr)
            .with_phases(self.phases())
            .with_algorithms(&self.banks())
    }
}
