// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

//! ukimeasurectl - precompute the signed TPM2 PCR policies of a unified
//! kernel image
//!
//! The output of `sign` is the JSON document stored in the `.pcrsig`
//! section of the image.
//!
//! ```bash
//! ukimeasurectl --key pcr-private.pem sign \
//!     --section .linux=vmlinuz --section .initrd=initrd.img \
//!     --section .cmdline=cmdline.txt --output pcrsig.json
//!
//! # Expected PCR values, without signing
//! ukimeasurectl measure --section .linux=vmlinuz
//! ```

mod config;
mod error;

use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{ArgAction, Parser, Subcommand};
use log::{debug, error, warn};
use ukimeasure::{
    bank::calculate_bank_data_for_file, sections::sections_data,
    HashAlgorithm, PcrData, RsaPcrSigner, Section, SectionData, UkiSection,
};

use crate::{config::Config, error::UkimeasurectlError};

/// Command-line interface for ukimeasurectl
#[derive(Parser, Debug)]
#[command(name = "ukimeasurectl", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// PCR the policies are bound to
    #[arg(long, value_name = "INDEX")]
    pub pcr: Option<u32>,

    /// PCR banks to compute (sha1, sha256, sha384, sha512)
    #[arg(long, value_name = "ALG", value_delimiter = ',')]
    pub banks: Vec<HashAlgorithm>,

    /// PEM file with the RSA private key used for signing
    #[arg(short, long, value_name = "FILE")]
    pub key: Option<String>,

    /// Password of the private key
    #[arg(long, value_name = "PASSWORD")]
    pub key_password: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign the policies of every bank and boot phase
    Sign {
        /// Section content, may be repeated
        #[arg(short, long = "section", value_name = "NAME=PATH")]
        sections: Vec<String>,

        /// Output file, stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },
    /// Print the expected PCR values and policies without signing
    Measure {
        #[arg(short, long = "section", value_name = "NAME=PATH")]
        sections: Vec<String>,

        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },
    /// Sign the policy for a PCR that only measures the given file
    SignFile {
        file: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },
    /// Print the public key matching the signing key
    Pubkey {
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        error!("Command failed: {e}");
        process::exit(e.exit_code());
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    pretty_env_logger::formatted_builder()
        .filter_level(log_level)
        .target(pretty_env_logger::env_logger::Target::Stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), UkimeasurectlError> {
    let config = Config::load(cli.config.as_deref())?.with_cli_overrides(cli);
    config.validate()?;
    debug!(
        "Using PCR {} with banks {:?}",
        config.pcr,
        config.assembler().algorithms()
    );

    match &cli.command {
        Commands::Sign { sections, output } => {
            let signer = load_signer(&config)?;
            let sections = parse_sections(sections)?;
            let data = config
                .assembler()
                .generate_signed_pcr(&sections, &signer)?;
            let json = serde_json::to_string(&data)?;
            write_output(output.as_deref().or(config.output.as_deref()), &json)
        }
        Commands::Measure { sections, output } => {
            let sections = parse_sections(sections)?;
            let measurements =
                config.assembler().generate_measurements(&sections)?;
            let json = serde_json::to_string_pretty(&measurements)?;
            write_output(output.as_deref().or(config.output.as_deref()), &json)
        }
        Commands::SignFile { file, output } => {
            let signer = load_signer(&config)?;
            let mut data = PcrData::default();
            for &algorithm in config.assembler().algorithms() {
                let banks = calculate_bank_data_for_file(
                    config.pcr, algorithm, file, &signer,
                )?;
                data.set_bank(algorithm, banks);
            }
            let json = serde_json::to_string(&data)?;
            write_output(output.as_deref().or(config.output.as_deref()), &json)
        }
        Commands::Pubkey { output } => {
            let signer = load_signer(&config)?;
            write_output(output.as_deref(), signer.public_key_pem()?.trim_end())
        }
    }
}

fn load_signer(config: &Config) -> Result<RsaPcrSigner, UkimeasurectlError> {
    let key = config
        .signing_key
        .as_deref()
        .ok_or(UkimeasurectlError::MissingSigningKey)?;
    debug!("Loading signing key from {key}");

    Ok(RsaPcrSigner::from_pem_file(
        Path::new(key),
        config.signing_key_password.as_deref(),
    )?)
}

/// Parse a `NAME=PATH` section argument. The leading dot of the section
/// name is optional.
fn parse_section(
    arg: &str,
) -> Result<(Section, PathBuf), UkimeasurectlError> {
    let (name, path) = arg
        .split_once('=')
        .filter(|(name, path)| !name.is_empty() && !path.is_empty())
        .ok_or_else(|| UkimeasurectlError::SectionArgument(arg.into()))?;

    let section = if name.starts_with('.') {
        Section::try_from(name)?
    } else {
        Section::try_from(format!(".{name}").as_str())?
    };

    Ok((section, PathBuf::from(path)))
}

fn parse_sections(args: &[String]) -> Result<SectionData, UkimeasurectlError> {
    let mut sections: Vec<UkiSection> = Vec::new();

    for arg in args {
        let (name, path) = parse_section(arg)?;
        if let Some(previous) = sections.iter_mut().find(|s| s.name == name) {
            warn!("Section {name} given more than once, using {}", path.display());
            previous.source = path.into();
            continue;
        }
        sections.push(UkiSection {
            name,
            source: path.into(),
            measure: name.should_be_measured(),
        });
    }

    Ok(sections_data(&sections))
}

fn write_output(
    output: Option<&str>,
    content: &str,
) -> Result<(), UkimeasurectlError> {
    match output {
        Some(path) => {
            std::fs::write(path, format!("{content}\n")).map_err(|source| {
                UkimeasurectlError::Output {
                    path: path.to_string(),
                    source,
                }
            })?;
            debug!("Wrote {path}");
        }
        None => println!("{content}"),
    }
    Ok(())
}
