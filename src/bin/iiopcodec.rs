// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # iiopcodec CLI
//!
//! Command-line tool for CORBA object references and GIOP messages.
//!
//! ## Usage
//!
//! ```sh
//! # Decode a stringified IOR
//! iiopcodec ior decode IOR:000000000000000d49444c3a...
//!
//! # Build an IOR for a TCP endpoint
//! iiopcodec ior encode --type-id IDL:Calc:1.0 --host localhost --port 2809 --key calc
//!
//! # Decode a captured message
//! iiopcodec giop inspect request.bin --json
//!
//! # Print the effective ORB configuration
//! iiopcodec config show orb.toml
//! ```

mod cmd;
mod common;

use std::process;

use clap::{Parser, Subcommand};
use cmd::{ConfigCmd, GiopCmd, IorCmd};
use common::Result;

/// iiopcodec - CORBA GIOP/IIOP toolkit
///
/// Decode and build object references, inspect GIOP messages.
#[derive(Parser, Clone)]
#[command(name = "iiopcodec")]
#[command(about = "CORBA GIOP/IIOP toolkit for IORs and GIOP messages", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Object references (decode, encode)
    #[command(subcommand)]
    Ior(IorCmd),

    /// GIOP messages (inspect)
    #[command(subcommand)]
    Giop(GiopCmd),

    /// ORB configuration (show)
    #[command(subcommand)]
    Config(ConfigCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ior(cmd) => cmd.run(),
        Commands::Giop(cmd) => cmd.run(),
        Commands::Config(cmd) => cmd.run(),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
