// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! IOR command - decode and encode stringified object references.

use clap::Subcommand;

use crate::common::{codeset_name, format_key, print_json, Result};
use iiopcodec::ior::{ComponentData, TaggedComponent, TaggedProfile};
use iiopcodec::{GiopVersion, Ior};

/// Work with stringified IORs.
#[derive(Subcommand, Clone, Debug)]
pub enum IorCmd {
    /// Decode an `IOR:` string
    Decode {
        /// Stringified IOR
        #[arg(value_name = "IOR")]
        ior: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Build an IOR for a TCP endpoint
    Encode {
        /// Repository id of the object's interface
        #[arg(long)]
        type_id: String,

        #[arg(long)]
        host: String,

        #[arg(long)]
        port: u16,

        /// Object key (text)
        #[arg(long)]
        key: String,

        /// GIOP version of the profile
        #[arg(long, default_value = "1.2")]
        version: GiopVersion,
    },
}

impl IorCmd {
    pub fn run(self) -> Result<()> {
        match self {
            IorCmd::Decode { ior, json } => cmd_decode(&ior, json),
            IorCmd::Encode {
                type_id,
                host,
                port,
                key,
                version,
            } => cmd_encode(type_id, host, port, key, version),
        }
    }
}

/// Cmd: Decode an IOR
fn cmd_decode(text: &str, json: bool) -> Result<()> {
    let ior: Ior = text.trim().parse()?;
    if json {
        return print_json(&ior);
    }

    if ior.is_null_reference() {
        println!("Null reference");
        return Ok(());
    }
    println!("Type id: {}", ior.type_id());
    println!("Profiles: {}", ior.profiles().len());
    for (index, profile) in ior.profiles().iter().enumerate() {
        println!();
        match profile {
            TaggedProfile::InternetIiop(iiop) => {
                println!("[{index}] Internet IIOP");
                println!("  Version: {}", iiop.version);
                println!("  Host: {}", iiop.host);
                println!("  Port: {}", iiop.port);
                println!("  Object key: {}", format_key(&iiop.object_key));
                print_components(&iiop.components);
            }
            TaggedProfile::MultipleComponents(components) => {
                println!("[{index}] Multiple components");
                print_components(components);
            }
        }
    }
    Ok(())
}

fn print_components(components: &[TaggedComponent]) {
    if components.is_empty() {
        return;
    }
    println!("  Components:");
    for component in components {
        match &component.data {
            ComponentData::CodeSets(code_sets) => {
                println!("    [{}] Code sets", component.id);
                println!(
                    "      char:  {} (conversions: {})",
                    codeset_name(code_sets.char_sets.native_set),
                    join_names(&code_sets.char_sets.conversion_sets)
                );
                println!(
                    "      wchar: {} (conversions: {})",
                    codeset_name(code_sets.wchar_sets.native_set),
                    join_names(&code_sets.wchar_sets.conversion_sets)
                );
            }
            ComponentData::Opaque(data) => {
                println!("    [{}] {} bytes: {}", component.id, data.len(), hex::encode(data));
            }
        }
    }
}

fn join_names(ids: &[u32]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter().map(|&id| codeset_name(id)).collect::<Vec<_>>().join(", ")
}

/// Cmd: Encode an IOR
fn cmd_encode(type_id: String, host: String, port: u16, key: String, version: GiopVersion) -> Result<()> {
    if !version.is_supported() {
        anyhow::bail!("Unsupported GIOP version {version}");
    }
    let ior = Ior::from_iiop(type_id, host, port, version, key.into_bytes());
    println!("{}", ior.to_ior_string()?);
    Ok(())
}
