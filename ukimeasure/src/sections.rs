// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! Sections of a unified kernel image (UKI) and their content.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    convert::TryFrom,
    fmt,
    path::PathBuf,
    str::FromStr,
};

use crate::error::{MeasureError, Result};

/// PE sections with a special meaning in a UKI
///
/// The declaration order is the canonical order in which the boot stub
/// measures the sections into the PCR. Do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Linux,
    OsRel,
    CmdLine,
    Initrd,
    Ucode,
    Splash,
    Dtb,
    DtbAuto,
    Hwids,
    Uname,
    Sbat,
    PcrSig,
    PcrPKey,
}

impl Section {
    /// Every known section, in canonical order
    pub const ORDERED: [Section; 13] = [
        Section::Linux,
        Section::OsRel,
        Section::CmdLine,
        Section::Initrd,
        Section::Ucode,
        Section::Splash,
        Section::Dtb,
        Section::DtbAuto,
        Section::Hwids,
        Section::Uname,
        Section::Sbat,
        Section::PcrSig,
        Section::PcrPKey,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::Linux => ".linux",
            Section::OsRel => ".osrel",
            Section::CmdLine => ".cmdline",
            Section::Initrd => ".initrd",
            Section::Ucode => ".ucode",
            Section::Splash => ".splash",
            Section::Dtb => ".dtb",
            Section::DtbAuto => ".dtbauto",
            Section::Hwids => ".hwids",
            Section::Uname => ".uname",
            Section::Sbat => ".sbat",
            Section::PcrSig => ".pcrsig",
            Section::PcrPKey => ".pcrpkey",
        }
    }

    /// `.pcrsig` holds the signed policies themselves and is never measured
    pub fn should_be_measured(&self) -> bool {
        !matches!(self, Section::PcrSig)
    }

    /// Sections the boot stub measures, in the order it measures them
    pub fn measured() -> impl Iterator<Item = Section> {
        Section::ORDERED
            .into_iter()
            .filter(Section::should_be_measured)
    }
}

impl TryFrom<&str> for Section {
    type Error = MeasureError;

    fn try_from(value: &str) -> Result<Self> {
        Section::ORDERED
            .into_iter()
            .find(|s| s.name() == value)
            .ok_or_else(|| MeasureError::UnknownSection(value.into()))
    }
}

impl FromStr for Section {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self> {
        Section::try_from(s)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where the content of a section comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl SectionSource {
    pub fn read(&self, section: Section) -> Result<Cow<'_, [u8]>> {
        match self {
            SectionSource::Bytes(b) => Ok(Cow::Borrowed(b.as_slice())),
            SectionSource::File(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| MeasureError::SectionReadError {
                    section: format!("{section} ({})", path.display()),
                    source,
                }),
        }
    }
}

impl From<Vec<u8>> for SectionSource {
    fn from(bytes: Vec<u8>) -> Self {
        SectionSource::Bytes(bytes)
    }
}

impl From<&[u8]> for SectionSource {
    fn from(bytes: &[u8]) -> Self {
        SectionSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for SectionSource {
    fn from(path: PathBuf) -> Self {
        SectionSource::File(path)
    }
}

/// Content of the sections to measure
///
/// The map order matches the canonical order, but measurement walks
/// [`Section::measured`] rather than relying on the map.
pub type SectionData = BTreeMap<Section, SectionSource>;

/// A section of the image being assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UkiSection {
    pub name: Section,
    pub source: SectionSource,
    /// Whether the boot stub measures this section
    pub measure: bool,
}

/// Collect the sections that have to be measured
pub fn sections_data(sections: &[UkiSection]) -> SectionData {
    sections
        .iter()
        .filter(|s| s.measure)
        .map(|s| (s.name, s.source.clone()))
        .collect()
}
