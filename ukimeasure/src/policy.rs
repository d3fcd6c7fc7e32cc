// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Trial computation of TPM2 policy digests.
//!
//! A policy session digest starts as all zeroes and every policy command
//! updates it as `digest = H(digest || commandCode || parameters)`. Only
//! `TPM2_PolicyPCR` is needed here, and policy sessions are always SHA-256.

use log::*;
use openssl::hash::{hash, Hasher, MessageDigest};

use crate::{
    error::{MeasureError, Result},
    selection::PcrSelection,
};

/// TPM_CC_PolicyPCR
pub const TPM2_CC_POLICY_PCR: u32 = 0x0000_017F;

/// Size of a SHA-256 policy digest
pub const POLICY_DIGEST_SIZE: usize = 32;

/// Software policy session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyCalculator {
    digest: [u8; POLICY_DIGEST_SIZE],
}

impl Default for PolicyCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyCalculator {
    pub fn new() -> Self {
        PolicyCalculator {
            digest: [0u8; POLICY_DIGEST_SIZE],
        }
    }

    pub fn digest(&self) -> &[u8; POLICY_DIGEST_SIZE] {
        &self.digest
    }

    fn update(&mut self, command_code: u32, parameters: &[&[u8]]) -> Result<()> {
        let mut hasher =
            Hasher::new(MessageDigest::sha256()).map_err(MeasureError::Hash)?;
        hasher.update(&self.digest).map_err(MeasureError::Hash)?;
        hasher
            .update(&command_code.to_be_bytes())
            .map_err(MeasureError::Hash)?;
        for p in parameters {
            hasher.update(p).map_err(MeasureError::Hash)?;
        }
        let new = hasher.finish().map_err(MeasureError::Hash)?;
        self.digest.copy_from_slice(&new);
        Ok(())
    }

    /// Apply TPM2_PolicyPCR, where `pcr_digest` is the digest of the
    /// concatenated expected values of the selected PCRs
    pub fn policy_pcr(
        &mut self,
        pcr_digest: &[u8],
        selection: &PcrSelection,
    ) -> Result<()> {
        let pcrs = selection.marshal();
        self.update(TPM2_CC_POLICY_PCR, &[pcrs.as_slice(), pcr_digest])
    }
}

/// Calculate the PolicyPCR digest for the expected value of the PCR
/// described by `selection`
pub fn calculate_policy(
    pcr_value: &[u8],
    selection: &PcrSelection,
) -> Result<Vec<u8>> {
    let pcr_digest =
        hash(MessageDigest::sha256(), pcr_value).map_err(MeasureError::Hash)?;

    let mut calculator = PolicyCalculator::new();
    calculator.policy_pcr(&pcr_digest, selection)?;

    debug!(
        "PolicyPCR for {} PCRs {:?}: {}",
        selection.algorithm(),
        selection.pcrs(),
        hex::encode(calculator.digest())
    );

    Ok(calculator.digest().to_vec())
}
