// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Signed PCR policies for every boot phase of a UKI.
//!
//! This mimics what happens to the PCR while the image boots: the boot stub
//! measures the UKI sections, then systemd extends the PCR with the name of
//! each boot phase it goes through. At every phase marked for signing the
//! expected PCR value is turned into a PolicyPCR digest and signed, so the
//! TPM will accept it through PolicyAuthorize only while the PCR holds that
//! value.

use base64::{engine::general_purpose, Engine as _};
use log::*;
use openssl::{pkey::Public, rsa::Rsa};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    algorithms::HashAlgorithm,
    digest::PcrDigest,
    error::{MeasureError, Result},
    phases::{ordered_phases, PhaseInfo},
    policy::calculate_policy,
    sections::{Section, SectionData},
    selection::PcrSelection,
    signer::{public_key_fingerprint, sign, verify_signature, PcrSigner},
};

/// PCR the boot stub measures the UKI sections into
pub const UKI_PCR: u32 = 11;

/// One signed policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankData {
    /// PCRs covered by the policy
    pub pcrs: Vec<u32>,
    /// Fingerprint of the signing public key
    pub pkfp: String,
    /// Policy signature, base64 encoded
    pub sig: String,
    /// Policy digest, hex encoded
    pub pol: String,
}

/// Expected PCR value and unsigned policy at one boot phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMeasurement {
    pub phase: String,
    /// Expected PCR value, hex encoded
    pub pcr: String,
    /// Policy digest, hex encoded
    pub pol: String,
}

/// Per hash algorithm lists of entries
///
/// Serialized in the JSON layout the boot stub reads from `.pcrsig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PcrBanks<T> {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sha1: Vec<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sha256: Vec<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sha384: Vec<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sha512: Vec<T>,
}

impl<T> Default for PcrBanks<T> {
    fn default() -> Self {
        PcrBanks {
            sha1: Vec::new(),
            sha256: Vec::new(),
            sha384: Vec::new(),
            sha512: Vec::new(),
        }
    }
}

impl<T> PcrBanks<T> {
    pub fn bank(&self, algorithm: HashAlgorithm) -> &[T] {
        match algorithm {
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
            HashAlgorithm::Sha384 => &self.sha384,
            HashAlgorithm::Sha512 => &self.sha512,
        }
    }

    pub fn set_bank(&mut self, algorithm: HashAlgorithm, entries: Vec<T>) {
        match algorithm {
            HashAlgorithm::Sha1 => self.sha1 = entries,
            HashAlgorithm::Sha256 => self.sha256 = entries,
            HashAlgorithm::Sha384 => self.sha384 = entries,
            HashAlgorithm::Sha512 => self.sha512 = entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        HashAlgorithm::ALL.iter().all(|&a| self.bank(a).is_empty())
    }
}

/// Content of the `.pcrsig` section
pub type PcrData = PcrBanks<BankData>;

/// Output of the unsigned mode
pub type Measurements = PcrBanks<PhaseMeasurement>;

/// Measure the sections into a fresh PCR, the way the boot stub does
///
/// Sections are measured in canonical order, each one as two extend
/// operations: the NUL terminated section name, then the content.
pub fn measure_sections(
    algorithm: HashAlgorithm,
    sections: &SectionData,
) -> Result<PcrDigest> {
    let mut digest = PcrDigest::new(algorithm);

    for section in Section::measured() {
        let Some(source) = sections.get(&section) else {
            continue;
        };
        debug!("Measuring section {section} into the {algorithm} bank");

        let content = source.read(section)?;

        let mut name = section.name().as_bytes().to_vec();
        name.push(0);
        digest.extend(&name)?;
        digest.extend(&content)?;
    }

    Ok(digest)
}

/// Extend the PCR with the phase label
///
/// Every phase is extended, whether it is signed or not.
pub fn measure_phase(
    phase: &PhaseInfo,
    mut digest: PcrDigest,
) -> Result<PcrDigest> {
    debug!(
        "Extending the {} bank with phase {}",
        digest.algorithm(),
        phase.phase
    );
    digest.extend(phase.phase.as_bytes())?;
    Ok(digest)
}

/// Compute and sign the policy matching the current value of `digest`
/// in PCR `pcr`
pub fn sign_policy(
    pcr: u32,
    signer: &dyn PcrSigner,
    digest: &PcrDigest,
) -> Result<BankData> {
    let algorithm = digest.algorithm();
    let selection = PcrSelection::new(algorithm, &[pcr])?;

    debug!(
        "Expected PCR {pcr} value for the {algorithm} bank: {}",
        digest.to_hex()
    );
    let policy = calculate_policy(digest.snapshot(), &selection)?;
    let signature = sign(&policy, algorithm, signer)?;
    let pkfp = signer.fingerprint()?;

    debug!("Signed policy {} with key {pkfp}", signature.digest);

    Ok(BankData {
        pcrs: vec![pcr],
        pkfp,
        sig: signature.signature_base64,
        pol: signature.digest,
    })
}

fn unsigned_policy(
    pcr: u32,
    phase: &PhaseInfo,
    digest: &PcrDigest,
) -> Result<PhaseMeasurement> {
    let selection = PcrSelection::new(digest.algorithm(), &[pcr])?;
    let policy = calculate_policy(digest.snapshot(), &selection)?;

    Ok(PhaseMeasurement {
        phase: phase.phase.clone(),
        pcr: digest.to_hex(),
        pol: hex::encode(policy),
    })
}

/// Computes the policies of a UKI for a set of banks and boot phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAssembler {
    pcr: u32,
    phases: Vec<PhaseInfo>,
    algorithms: Vec<HashAlgorithm>,
}

impl Default for BankAssembler {
    fn default() -> Self {
        Self::new(UKI_PCR)
    }
}

impl BankAssembler {
    /// Assembler for all supported banks and the systemd boot phases
    pub fn new(pcr: u32) -> Self {
        BankAssembler {
            pcr,
            phases: ordered_phases(),
            algorithms: HashAlgorithm::ALL.to_vec(),
        }
    }

    pub fn with_phases(mut self, phases: Vec<PhaseInfo>) -> Self {
        self.phases = phases;
        self
    }

    /// Restrict the banks to compute. Banks are always emitted in the
    /// order of [`HashAlgorithm::ALL`].
    pub fn with_algorithms(mut self, algorithms: &[HashAlgorithm]) -> Self {
        let mut algorithms = algorithms.to_vec();
        algorithms.sort();
        algorithms.dedup();
        self.algorithms = algorithms;
        self
    }

    pub fn pcr(&self) -> u32 {
        self.pcr
    }

    pub fn phases(&self) -> &[PhaseInfo] {
        &self.phases
    }

    pub fn algorithms(&self) -> &[HashAlgorithm] {
        &self.algorithms
    }

    /// Signed policies of one bank, one per signed phase, in phase order
    pub fn calculate_bank_data(
        &self,
        algorithm: HashAlgorithm,
        sections: &SectionData,
        signer: &dyn PcrSigner,
    ) -> Result<Vec<BankData>> {
        let mut digest = measure_sections(algorithm, sections)?;
        let mut banks = Vec::new();

        for phase in &self.phases {
            digest = measure_phase(phase, digest)?;

            if !phase.sign {
                continue;
            }
            banks.push(sign_policy(self.pcr, signer, &digest)?);
        }

        Ok(banks)
    }

    /// Same walk as [`BankAssembler::calculate_bank_data`], without signing
    pub fn calculate_measurements(
        &self,
        algorithm: HashAlgorithm,
        sections: &SectionData,
    ) -> Result<Vec<PhaseMeasurement>> {
        let mut digest = measure_sections(algorithm, sections)?;
        let mut measurements = Vec::new();

        for phase in &self.phases {
            digest = measure_phase(phase, digest)?;

            if !phase.sign {
                continue;
            }
            let measurement = unsigned_policy(self.pcr, phase, &digest)?;
            info!(
                "PCR {} {algorithm} bank at {}: {} (policy {})",
                self.pcr, measurement.phase, measurement.pcr, measurement.pol
            );
            measurements.push(measurement);
        }

        Ok(measurements)
    }

    /// Signed policies of every bank
    pub fn generate_signed_pcr(
        &self,
        sections: &SectionData,
        signer: &dyn PcrSigner,
    ) -> Result<PcrData> {
        self.for_each_bank(|algorithm| {
            let banks = self.calculate_bank_data(algorithm, sections, signer)?;
            info!("Signed {} policies for the {algorithm} bank", banks.len());
            Ok(banks)
        })
    }

    /// Expected PCR values and unsigned policies of every bank, for when
    /// there is no key to sign with
    pub fn generate_measurements(
        &self,
        sections: &SectionData,
    ) -> Result<Measurements> {
        self.for_each_bank(|algorithm| {
            self.calculate_measurements(algorithm, sections)
        })
    }

    // Banks share nothing but read-only inputs, so each one is computed on
    // its own thread. Results are collected in algorithm order and the
    // first failing bank, in that order, is reported.
    fn for_each_bank<T, F>(&self, f: F) -> Result<PcrBanks<T>>
    where
        T: Send,
        F: Fn(HashAlgorithm) -> Result<Vec<T>> + Sync,
    {
        let f = &f;
        let results = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .algorithms
                .iter()
                .map(|&algorithm| (algorithm, s.spawn(move || f(algorithm))))
                .collect();

            handles
                .into_iter()
                .map(|(algorithm, handle)| (algorithm, handle.join()))
                .collect::<Vec<_>>()
        });

        let mut banks = PcrBanks::default();
        for (algorithm, result) in results {
            let entries =
                result.map_err(|_| MeasureError::BankWorker(algorithm))??;
            banks.set_bank(algorithm, entries);
        }

        Ok(banks)
    }
}

/// Signed policy for the measurement of a single file into PCR `pcr`
///
/// The file content is extended as is, without section name and without
/// boot phases.
pub fn calculate_bank_data_for_file(
    pcr: u32,
    algorithm: HashAlgorithm,
    file: &Path,
    signer: &dyn PcrSigner,
) -> Result<Vec<BankData>> {
    let content = std::fs::read(file).map_err(|source| {
        MeasureError::SectionReadError {
            section: file.display().to_string(),
            source,
        }
    })?;

    let mut digest = PcrDigest::new(algorithm);
    digest.extend(&content)?;

    Ok(vec![sign_policy(pcr, signer, &digest)?])
}

/// Check a signed policy against a public key
///
/// Returns `false` when the policy was signed by another key or when the
/// signature does not match.
pub fn verify_bank(
    bank: &BankData,
    algorithm: HashAlgorithm,
    key: &Rsa<Public>,
) -> Result<bool> {
    if bank.pkfp != public_key_fingerprint(key)? {
        warn!("Policy {} was signed by key {}", bank.pol, bank.pkfp);
        return Ok(false);
    }

    let signature = general_purpose::STANDARD.decode(&bank.sig)?;
    let policy = hex::decode(&bank.pol)?;

    verify_signature(key, &policy, &signature, algorithm)
}
