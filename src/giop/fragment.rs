// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reassembly of fragmented GIOP messages.
//!
//! A message whose fragment flag is set is continued by `Fragment`
//! messages until one arrives with the flag cleared. GIOP 1.1 allows one
//! fragmented message at a time per connection. GIOP 1.2 fragments start
//! with the request id of the message they continue, so several messages
//! can be in progress at once. GIOP 1.0 does not fragment.

use std::collections::HashMap;
use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use tracing::{trace, warn};

use super::header::MessageType;
use super::message::GiopMessage;
use crate::core::{minor, CompletionStatus, CorbaError, Result};

/// Which in-progress message a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FragmentKey {
    /// The single slot of GIOP 1.1
    Single,
    /// A GIOP 1.2 request id
    Request(u32),
}

/// Collects fragments until the last one completes a message.
#[derive(Debug)]
pub struct FragmentAssembler {
    pending: HashMap<FragmentKey, GiopMessage>,
    max_message_size: u32,
}

impl FragmentAssembler {
    /// An assembler refusing messages larger than `max_message_size` in total.
    pub fn new(max_message_size: u32) -> Self {
        Self {
            pending: HashMap::new(),
            max_message_size,
        }
    }

    /// Number of messages still waiting for fragments.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed one message read from the wire.
    ///
    /// Returns `None` while more fragments are expected. A message that is
    /// not fragmented comes straight back.
    pub fn accept(&mut self, message: GiopMessage) -> Result<Option<GiopMessage>> {
        let is_fragment = message.header.message_type == MessageType::Fragment;
        if !is_fragment && !message.header.fragment {
            return Ok(Some(message));
        }
        if message.header.version.is_1_0() {
            return Err(CorbaError::framing("fragment", "fragmentation not allowed for GIOP 1.0"));
        }
        if is_fragment {
            self.add_fragment(message)
        } else {
            self.start(message)?;
            Ok(None)
        }
    }

    fn start(&mut self, message: GiopMessage) -> Result<()> {
        let key = fragment_key(&message)?;
        trace!(key = ?key, message_type = %message.header.message_type, "fragmented message started");
        if self.pending.insert(key, message).is_some() {
            warn!(context = "fragment", key = ?key, "unfinished fragmented message replaced");
        }
        Ok(())
    }

    fn add_fragment(&mut self, fragment: GiopMessage) -> Result<Option<GiopMessage>> {
        let key = fragment_key(&fragment)?;
        let content = match key {
            FragmentKey::Single => &fragment.body[..],
            FragmentKey::Request(_) => &fragment.body[4..],
        };
        let pending = self
            .pending
            .get_mut(&key)
            .ok_or_else(|| CorbaError::framing("fragment", format!("fragment without a started message ({key:?})")))?;
        if pending.header.version != fragment.header.version {
            return Err(CorbaError::framing("fragment", "fragment version differs from its message"));
        }
        let total = pending.body.len() + content.len();
        if total > self.max_message_size as usize {
            self.pending.remove(&key);
            warn!(context = "fragment", total, max = self.max_message_size, "reassembled message too large");
            return Err(CorbaError::marshal(minor::MESSAGE_TOO_LARGE, CompletionStatus::CompletedNo));
        }
        pending.body.extend_from_slice(content);
        if fragment.header.fragment {
            return Ok(None);
        }

        let Some(mut message) = self.pending.remove(&key) else {
            return Ok(None);
        };
        message.header.fragment = false;
        message.header.body_length = message.body.len() as u32;
        trace!(key = ?key, body_length = message.header.body_length, "fragmented message complete");
        Ok(Some(message))
    }
}

/// Key of a fragmented message or fragment: the leading request id in
/// GIOP 1.2 bodies, the single slot otherwise.
fn fragment_key(message: &GiopMessage) -> Result<FragmentKey> {
    if !message.header.version.is_1_2_or_later() {
        return Ok(FragmentKey::Single);
    }
    let Some(id_bytes) = message.body.get(..4) else {
        return Err(CorbaError::end_of_stream());
    };
    let mut cursor = Cursor::new(id_bytes);
    let request_id = if message.header.little_endian {
        cursor.read_u32::<LittleEndian>()?
    } else {
        cursor.read_u32::<BigEndian>()?
    };
    Ok(FragmentKey::Request(request_id))
}
