// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

use thiserror::Error;

use crate::algorithms::{AlgorithmError, HashAlgorithm};

#[derive(Error, Debug)]
pub enum MeasureError {
    /// Hash algorithm outside of the supported set
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(#[from] AlgorithmError),

    /// PCR index does not fit in the 3 bytes PCR selection bitmask
    #[error("PCR index {index} is out of range (exceeds maximum value {max})")]
    IndexOutOfRange { index: u32, max: u32 },

    /// Unknown UKI section name
    #[error("unknown UKI section {0}")]
    UnknownSection(String),

    /// Error obtaining the content of a section
    #[error("failed to read section {section}")]
    SectionReadError {
        section: String,
        source: std::io::Error,
    },

    /// Error calculating hash
    #[error("failed to calculate hash")]
    Hash(#[source] openssl::error::ErrorStack),

    /// Error signing a policy digest
    #[error("failed to sign policy digest: {message}")]
    SigningError {
        message: String,
        source: Option<openssl::error::ErrorStack>,
    },

    /// Error reading the signing key file
    #[error("failed to read key file {path}")]
    KeyRead {
        path: String,
        source: std::io::Error,
    },

    /// Error decoding or converting the signing key
    #[error("failed to load key: {message}")]
    KeyLoad {
        message: String,
        source: openssl::error::ErrorStack,
    },

    /// Only RSA keys can sign PCR policies
    #[error("unsupported key algorithm: {id}")]
    UnsupportedKeyAlgorithm { id: String },

    /// Error decoding base64
    #[error("failed to decode base64")]
    Base64Decode(#[from] base64::DecodeError),

    /// Error decoding hex
    #[error("failed to decode hex")]
    HexDecode(#[from] hex::FromHexError),

    /// Error verifying a signature
    #[error("signature verification failed: {message}")]
    VerifyError {
        message: String,
        source: openssl::error::ErrorStack,
    },

    /// A bank computation thread panicked
    #[error("computation of the {0} bank did not complete")]
    BankWorker(HashAlgorithm),
}

pub type Result<T> = std::result::Result<T, MeasureError>;
