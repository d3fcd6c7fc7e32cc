// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Offline computation of the signed TPM2 PCR policies embedded in a
//! unified kernel image.

pub mod algorithms;
pub mod bank;
pub mod digest;
pub mod error;
pub mod phases;
pub mod policy;
pub mod sections;
pub mod selection;
pub mod signer;

pub use algorithms::HashAlgorithm;
pub use bank::{BankAssembler, BankData, Measurements, PcrData, UKI_PCR};
pub use error::{MeasureError, Result};
pub use phases::PhaseInfo;
pub use sections::{Section, SectionData, SectionSource, UkiSection};
pub use signer::{PcrSigner, RsaPcrSigner};
