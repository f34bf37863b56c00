// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod config;
mod giop;
mod ior;

pub use config::ConfigCmd;
pub use giop::GiopCmd;
pub use ior::IorCmd;
