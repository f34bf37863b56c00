// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Interoperable Object References.
//!
//! - [`reference`] - the IOR itself, wire and stringified forms
//! - [`profile`] - Internet IIOP and multiple-components profiles
//! - [`component`] - tagged components and their codec registry
//! - [`codeset`] - codeset component data and negotiation

pub mod codeset;
pub mod component;
pub mod profile;
pub mod reference;

pub use codeset::{CodeSetComponent, CodeSetComponentData, TAG_CODE_SETS};
pub use component::{
    global_component_registry, ComponentCodec, ComponentData, ComponentRegistry, TaggedComponent,
};
pub use profile::{InternetIiopProfile, TaggedProfile, TAG_INTERNET_IOP, TAG_MULTIPLE_COMPONENTS};
pub use reference::Ior;
