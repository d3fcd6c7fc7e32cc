// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

use serde::{Deserialize, Serialize};

pub const ENTER_INITRD: &str = "enter-initrd";
pub const LEAVE_INITRD: &str = "leave-initrd";
pub const SYSINIT: &str = "sysinit";
pub const READY: &str = "ready";

/// A boot phase whose label is extended into the PCR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub phase: String,
    /// Whether a signed policy is produced once this phase is reached
    #[serde(default = "default_sign")]
    pub sign: bool,
}

fn default_sign() -> bool {
    true
}

impl PhaseInfo {
    pub fn new(phase: impl Into<String>, sign: bool) -> Self {
        PhaseInfo {
            phase: phase.into(),
            sign,
        }
    }
}

/// Boot phases measured by systemd, in the order they happen
pub fn ordered_phases() -> Vec<PhaseInfo> {
    [ENTER_INITRD, LEAVE_INITRD, SYSINIT, READY]
        .into_iter()
        .map(|p| PhaseInfo::new(p, true))
        .collect()
}
