// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! GIOP command - decode message headers.

use clap::Subcommand;
use serde::Serialize;

use crate::common::{codeset_name, format_key, load_bytes, print_json, Result};
use iiopcodec::giop::{GiopHeader, MessageDetails, ServiceContextList};
use iiopcodec::GiopMessage;

/// Work with raw GIOP messages.
#[derive(Subcommand, Clone, Debug)]
pub enum GiopCmd {
    /// Decode a message header and its per-message header
    Inspect {
        /// Message file, or the message bytes as hex
        #[arg(value_name = "FILE|HEX")]
        input: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl GiopCmd {
    pub fn run(self) -> Result<()> {
        match self {
            GiopCmd::Inspect { input, json } => cmd_inspect(&input, json),
        }
    }
}

#[derive(Serialize)]
struct Inspection<'a> {
    header: &'a GiopHeader,
    details: MessageDetails,
}

/// Cmd: Inspect a message
fn cmd_inspect(input: &str, json: bool) -> Result<()> {
    let bytes = load_bytes(input)?;
    let message = GiopMessage::from_bytes(&bytes)?;
    let details = message.details()?;
    if json {
        return print_json(&Inspection {
            header: &message.header,
            details,
        });
    }

    let header = &message.header;
    println!("Message: {}", header.message_type);
    println!("Version: {}", header.version);
    println!(
        "Byte order: {}",
        if header.little_endian { "little endian" } else { "big endian" }
    );
    if header.fragment {
        println!("Fragment: more fragments follow");
    }
    println!("Body length: {}", header.body_length);

    match details {
        MessageDetails::Request(request) => {
            println!();
            println!("Request id: {}", request.request_id);
            println!("Response flags: {}", request.response_flags);
            println!("Object key: {}", format_key(&request.object_key));
            println!("Operation: {}", request.operation);
            print_contexts(&request.service_contexts);
        }
        MessageDetails::Reply(reply) => {
            println!();
            println!("Request id: {}", reply.request_id);
            println!("Status: {:?}", reply.status);
            print_contexts(&reply.service_contexts);
        }
        MessageDetails::CancelRequest(cancel) => {
            println!();
            println!("Request id: {}", cancel.request_id);
        }
        MessageDetails::LocateRequest(locate) => {
            println!();
            println!("Request id: {}", locate.request_id);
            println!("Object key: {}", format_key(&locate.object_key));
        }
        MessageDetails::LocateReply(locate) => {
            println!();
            println!("Request id: {}", locate.request_id);
            println!("Status: {:?}", locate.status);
            if let Some(forward) = &locate.forward {
                println!("Forward: {}", forward.to_ior_string()?);
            }
        }
        MessageDetails::None => {}
    }
    Ok(())
}

fn print_contexts(contexts: &ServiceContextList) {
    if contexts.is_empty() {
        return;
    }
    println!("Service contexts:");
    let code_sets = contexts.code_sets().ok().flatten();
    for context in contexts.iter() {
        match code_sets {
            Some((char_set, wchar_set)) if context.id == iiopcodec::giop::CODE_SETS_CONTEXT_ID => {
                println!(
                    "  [{}] Code sets: {} / {}",
                    context.id,
                    codeset_name(char_set),
                    codeset_name(wchar_set)
                );
            }
            _ => println!("  [{}] {} bytes", context.id, context.data.len()),
        }
    }
}
