// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CDR (Common Data Representation) module.
//!
//! Provides the GIOP flavour of CDR: primitive reads and writes aligned to
//! their natural size, both byte orders, nested encapsulations and
//! negotiated character codesets.

pub mod codeset;
pub mod input;
pub mod output;

pub use codeset::{CharCodeSet, CodeSetContext, WCharCodeSet};
pub use input::CdrInput;
pub use output::CdrOutput;
