//! VFAT long-filename slots and chains.
//!
//! A long name is stored as UCS-2 across a run of 13-character slot
//! records placed immediately before the 8.3 anchor entry, in reverse
//! order: the slot with the highest sequence number (flagged 0x40) comes
//! first on disk. Every slot carries a checksum of the anchor's 11-byte
//! short name; a mismatch anywhere orphans the chain and the anchor falls
//! back to its short name.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{FatError, Result};
use super::raw::{Attributes, RawEntry};
use super::short::ShortName;

/// UCS-2 characters per LFN slot.
pub const CHARS_PER_SLOT: usize = 13;

/// Maximum slots in one chain, bounding names to 255 characters.
pub const MAX_SLOTS: usize = 20;

/// Maximum long-name length in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Sequence-byte flag marking the chain's last slot (stored first).
pub const SEQ_LAST: u8 = 0x40;

const SEQ_MASK: u8 = 0x1F;
const CHECKSUM_OFFSET: usize = 0x0D;
const TYPE_OFFSET: usize = 0x0C;
const CLUSTER_OFFSET: usize = 0x1A;

/// Byte offsets of the 13 UCS-2 characters within a slot record.
const CHAR_OFFSETS: [usize; CHARS_PER_SLOT] =
    [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

/// Computes the short-name checksum carried by every slot of a chain.
/// `short` is the 11-byte on-disk name form (escaped, space padded).
pub fn checksum(short: &[u8; 11]) -> u8 {
    let mut sum: u8 = 0;
    for &b in short {
        sum = ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b);
    }
    sum
}

/// Encodes a long name as UCS-2. Code points outside the BMP have no
/// UCS-2 form and are rejected rather than surrogate-encoded.
pub fn encode_ucs2(name: &str) -> Result<Vec<u16>> {
    let mut units = Vec::with_capacity(name.len());
    for ch in name.chars() {
        let cp = ch as u32;
        if cp > 0xFFFF {
            return Err(FatError::UnsupportedName);
        }
        units.push(cp as u16);
    }
    if units.is_empty() || units.len() > MAX_NAME_CHARS {
        return Err(FatError::UnsupportedName);
    }
    Ok(units)
}

/// Number of slots needed for a name of `chars` UCS-2 characters.
pub fn slot_count(chars: usize) -> usize {
    (chars + CHARS_PER_SLOT - 1) / CHARS_PER_SLOT
}

fn read_slot_chars(raw: &RawEntry) -> [u16; CHARS_PER_SLOT] {
    let mut chars = [0u16; CHARS_PER_SLOT];
    for (ch, &off) in chars.iter_mut().zip(CHAR_OFFSETS.iter()) {
        *ch = raw.read_u16(off);
    }
    chars
}

fn write_slot_chars(raw: &mut RawEntry, chars: &[u16; CHARS_PER_SLOT]) {
    for (&ch, &off) in chars.iter().zip(CHAR_OFFSETS.iter()) {
        raw.write_u16(off, ch);
    }
}

/// Builds the slot records for `long_name` in disk order: sequence
/// `k | 0x40` first, down to sequence 1, ready to be written immediately
/// before the anchor carrying `short`.
pub fn build_chain(long_name: &str, short: &ShortName) -> Result<Vec<RawEntry>> {
    let units = encode_ucs2(long_name)?;
    let total = slot_count(units.len());
    let sum = short.checksum();

    let mut slots = Vec::with_capacity(total);
    for seq in (1..=total).rev() {
        let mut raw = RawEntry::zeroed();
        let mut seq_byte = seq as u8;
        if seq == total {
            seq_byte |= SEQ_LAST;
        }
        raw.write_u8(0, seq_byte);
        raw.write_flag_byte(Attributes::LFN.bits());
        raw.write_u8(TYPE_OFFSET, 0);
        raw.write_u8(CHECKSUM_OFFSET, sum);
        raw.write_u16(CLUSTER_OFFSET, 0);

        let base = (seq - 1) * CHARS_PER_SLOT;
        let mut chars = [0xFFFFu16; CHARS_PER_SLOT];
        for (j, ch) in chars.iter_mut().enumerate() {
            let idx = base + j;
            if idx < units.len() {
                *ch = units[idx];
            } else if idx == units.len() {
                // Single terminator when the name does not fill the slot.
                *ch = 0x0000;
            }
        }
        write_slot_chars(&mut raw, &chars);
        raw.clear_dirty();
        slots.push(raw);
    }
    Ok(slots)
}

/// Incremental chain assembler fed with records in disk order.
///
/// Mirrors the scanner contract: a chain starts at a slot flagged
/// [`SEQ_LAST`], continues through decrementing sequence numbers with the
/// same checksum, and is claimed by the first non-LFN record whose
/// computed checksum matches. Anything else discards the buffered slots
/// and the scan resumes; a broken chain never loses the anchor.
#[derive(Debug)]
pub(crate) struct ChainAssembler {
    segments: Vec<[u16; CHARS_PER_SLOT]>,
    checksum: u8,
    next_seq: u8,
    active: bool,
}

impl ChainAssembler {
    pub(crate) fn new() -> Self {
        ChainAssembler { segments: Vec::new(), checksum: 0, next_seq: 0, active: false }
    }

    fn reset(&mut self) {
        self.segments.clear();
        self.active = false;
        self.next_seq = 0;
    }

    /// Feeds one record classified as an LFN slot.
    pub(crate) fn feed(&mut self, raw: &RawEntry) {
        let seq_byte = raw.first_byte();
        let seq = (seq_byte & SEQ_MASK) as usize;

        if seq_byte & SEQ_LAST != 0 {
            if self.active {
                log::warn!("LFN chain restarted before its anchor; dropping {} buffered slots",
                    self.segments.len());
            }
            self.reset();
            if seq == 0 || seq > MAX_SLOTS {
                log::warn!("LFN slot with bad ordinal {seq}; ignoring chain");
                return;
            }
            self.segments = vec![[0xFFFF; CHARS_PER_SLOT]; seq];
            self.segments[seq - 1] = read_slot_chars(raw);
            self.checksum = raw.read_u8(CHECKSUM_OFFSET);
            self.next_seq = seq as u8 - 1;
            self.active = true;
            return;
        }

        if !self.active {
            log::warn!("orphan LFN slot (sequence {seq}) outside a chain; ignoring");
            return;
        }
        if seq == 0 || seq as u8 != self.next_seq || raw.read_u8(CHECKSUM_OFFSET) != self.checksum {
            log::warn!("broken LFN chain (expected sequence {}, found {seq}); discarding",
                self.next_seq);
            self.reset();
            return;
        }
        self.segments[seq - 1] = read_slot_chars(raw);
        self.next_seq -= 1;
    }

    /// Discards any buffered slots; called when a deleted or free record
    /// interrupts a chain.
    pub(crate) fn interrupt(&mut self) {
        if self.active {
            log::warn!("LFN chain interrupted; dropping {} buffered slots", self.segments.len());
            self.reset();
        }
    }

    /// Claims the buffered chain for an anchor with the given on-disk
    /// short name. Returns the decoded long name, or `None` if no valid
    /// chain precedes the anchor.
    pub(crate) fn take(&mut self, anchor_short: &[u8; 11]) -> Option<String> {
        if !self.active {
            return None;
        }
        let complete = self.next_seq == 0;
        let sum_matches = checksum(anchor_short) == self.checksum;
        if !complete {
            log::warn!("LFN chain missing sequences down to 1; keeping short name only");
        } else if !sum_matches {
            log::warn!("LFN checksum does not match anchor; keeping short name only");
        }

        let segments = core::mem::take(&mut self.segments);
        self.reset();
        if !complete || !sum_matches {
            return None;
        }

        let mut name = String::new();
        for segment in &segments {
            for &unit in segment {
                if unit == 0x0000 || unit == 0xFFFF {
                    return Some(name);
                }
                name.push(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
        }
        Some(name)
    }
}
