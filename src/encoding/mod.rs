// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Wire encodings.
//!
//! - [`cdr`] - CDR input/output streams and character codesets

pub mod cdr;

pub use cdr::{CdrInput, CdrOutput, CodeSetContext};
