// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

use crate::{
    algorithms::HashAlgorithm,
    error::{MeasureError, Result},
};

/// Size of the PCR select bitmap in a TPMS_PCR_SELECTION
pub const PCR_SELECT_SIZE: usize = 3;

/// Highest PCR index that fits in the selection bitmap
pub const MAX_PCR_INDEX: u32 = (PCR_SELECT_SIZE * 8) as u32 - 1;

/// Convert PCR indices into the TPM PCR select bitmap
///
/// PCR `n` is stored in byte `n >> 3`, bit `n & 7`.
pub fn create_selector(pcrs: &[u32]) -> Result<[u8; PCR_SELECT_SIZE]> {
    let mut mask = [0u8; PCR_SELECT_SIZE];

    for &n in pcrs {
        if n > MAX_PCR_INDEX {
            return Err(MeasureError::IndexOutOfRange {
                index: n,
                max: MAX_PCR_INDEX,
            });
        }
        mask[(n >> 3) as usize] |= 1 << (n & 0x7);
    }

    Ok(mask)
}

/// Selection of PCRs of a single bank
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcrSelection {
    algorithm: HashAlgorithm,
    select: [u8; PCR_SELECT_SIZE],
}

impl PcrSelection {
    pub fn new(algorithm: HashAlgorithm, pcrs: &[u32]) -> Result<Self> {
        Ok(PcrSelection {
            algorithm,
            select: create_selector(pcrs)?,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn select(&self) -> &[u8; PCR_SELECT_SIZE] {
        &self.select
    }

    /// Selected PCR indices, in ascending order
    pub fn pcrs(&self) -> Vec<u32> {
        (0..=MAX_PCR_INDEX)
            .filter(|n| self.select[(n >> 3) as usize] & (1 << (n & 0x7)) != 0)
            .collect()
    }

    /// Marshal as a TPML_PCR_SELECTION holding this single selection
    ///
    /// All integers are big endian, as in every TPM structure.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 2 + 1 + PCR_SELECT_SIZE);
        // TPML_PCR_SELECTION.count
        buf.extend_from_slice(&1u32.to_be_bytes());
        // TPMS_PCR_SELECTION
        buf.extend_from_slice(&self.algorithm.tpm_alg_id().to_be_bytes());
        buf.push(PCR_SELECT_SIZE as u8);
        buf.extend_from_slice(&self.select);
        buf
    }
}
