// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Software model of a single PCR register.

use openssl::hash::{hash, MessageDigest};

use crate::{
    algorithms::HashAlgorithm,
    error::{MeasureError, Result},
};

/// Simulated PCR for one hash algorithm.
///
/// The register starts at the reset value (all zeroes) and can only be
/// modified through [`PcrDigest::extend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcrDigest {
    algorithm: HashAlgorithm,
    value: Vec<u8>,
}

impl PcrDigest {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        PcrDigest {
            algorithm,
            value: vec![0u8; algorithm.digest_size()],
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Extend the register with the given data, the same way the TPM does
    /// when it receives a measurement event: `value = H(value || H(data))`
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        let md: MessageDigest = self.algorithm.into();
        let event = hash(md, data).map_err(MeasureError::Hash)?;

        let mut input = Vec::with_capacity(self.value.len() + event.len());
        input.extend_from_slice(&self.value);
        input.extend_from_slice(&event);

        self.value = hash(md, &input).map_err(MeasureError::Hash)?.to_vec();
        Ok(())
    }

    /// Current value of the register
    pub fn snapshot(&self) -> &[u8] {
        &self.value
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.value)
    }
}
