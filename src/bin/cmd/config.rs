// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Config command - validate and print ORB configuration.

use std::path::PathBuf;

use clap::Subcommand;

use crate::common::{print_json, Result};
use iiopcodec::OrbConfig;

/// ORB configuration files.
#[derive(Subcommand, Clone, Debug)]
pub enum ConfigCmd {
    /// Print the effective configuration (defaults when no file is given)
    Show {
        /// TOML configuration file
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

impl ConfigCmd {
    pub fn run(self) -> Result<()> {
        match self {
            ConfigCmd::Show { input, json } => cmd_show(input, json),
        }
    }
}

/// Cmd: Show configuration
fn cmd_show(input: Option<PathBuf>, json: bool) -> Result<()> {
    let config = match input {
        Some(path) => OrbConfig::load(&path)?,
        None => OrbConfig::default(),
    };
    if json {
        return print_json(&config);
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}
