// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Error handling for ukimeasurectl

use thiserror::Error;

/// Main error type for ukimeasurectl operations
#[derive(Error, Debug)]
pub enum UkimeasurectlError {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values that cannot be used
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// Errors from the policy computation
    #[error("Measurement error: {0}")]
    Measure(#[from] ukimeasure::MeasureError),

    /// A `--section` argument not in the NAME=PATH form
    #[error("Invalid section argument '{0}': expected NAME=PATH")]
    SectionArgument(String),

    /// The command needs a private key and none was configured
    #[error(
        "No signing key configured: use --key, signing_key or UKIMEASURE_SIGNING_KEY"
    )]
    MissingSigningKey,

    /// Output file errors
    #[error("Failed to write {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors found while validating the merged configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("PCR index {0} is out of range (0-23)")]
    PcrOutOfRange(u32),

    #[error("At least one PCR bank must be selected")]
    NoBanks,

    #[error("At least one boot phase must be configured")]
    NoPhases,

    #[error("Boot phase names cannot be empty")]
    EmptyPhase,
}

impl UkimeasurectlError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            UkimeasurectlError::Config(_)
            | UkimeasurectlError::Validation(_)
            | UkimeasurectlError::SectionArgument(_)
            | UkimeasurectlError::MissingSigningKey => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(UkimeasurectlError::MissingSigningKey.exit_code(), 2);
        assert_eq!(
            UkimeasurectlError::from(ValidationError::NoBanks).exit_code(),
            2
        );
        let err = UkimeasurectlError::from(
            ukimeasure::MeasureError::UnknownSection(".text".into()),
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            UkimeasurectlError::MissingSigningKey.to_string(),
            "No signing key configured: use --key, signing_key or UKIMEASURE_SIGNING_KEY"
        );
        let err = UkimeasurectlError::SectionArgument("linux".into());
        assert_eq!(
            err.to_string(),
            "Invalid section argument 'linux': expected NAME=PATH"
        );
        assert_eq!(
            ValidationError::PcrOutOfRange(24).to_string(),
            "PCR index 24 is out of range (0-23)"
        );
    }
}
