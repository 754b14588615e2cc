//! Raw 32-byte directory record codec.
//!
//! A [`RawEntry`] is the uninterpreted on-disk record: a fixed buffer, a
//! dirty bit, and just enough decoding to classify the record (free,
//! deleted, long-filename slot, or short entry). Field semantics live in
//! the `short` and `lfn` modules.

use bitflags::bitflags;

/// Size in bytes of one on-disk directory record.
pub const ENTRY_SIZE: usize = 32;

/// Offset of the attribute byte within a record.
pub const ATTR_OFFSET: usize = 0x0B;

/// First-byte marker for a deleted record.
pub const DELETED_MARKER: u8 = 0xE5;

/// First-byte escape standing in for a stored 0xE5.
pub const DELETED_ESCAPE: u8 = 0x05;

bitflags! {
    /// Attribute byte flags at offset 0x0B.
    ///
    /// The exact combination `READ_ONLY | HIDDEN | SYSTEM | VOLUME_LABEL`
    /// marks a VFAT long-filename slot; no ordinary entry carries that
    /// mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attributes: u8 {
        const READ_ONLY    = 0x01;
        const HIDDEN       = 0x02;
        const SYSTEM       = 0x04;
        const VOLUME_LABEL = 0x08;
        const DIRECTORY    = 0x10;
        const ARCHIVE      = 0x20;
        /// Composite long-filename marker.
        const LFN          = 0x0F;
    }
}

/// Coarse classification of a raw record, decided by byte 0 and the
/// attribute byte alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Byte 0 is 0x00: no entry here and none after it.
    Free,
    /// Byte 0 is 0xE5: slot reusable.
    Deleted,
    /// Attribute byte is exactly 0x0F: long-filename slot.
    Lfn,
    /// Anything else: an 8.3 entry (file, directory, or volume label).
    Short,
}

/// One 32-byte on-disk record plus a dirty bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    bytes: [u8; ENTRY_SIZE],
    dirty: bool,
}

impl RawEntry {
    /// A zero-filled record (free-terminal on disk).
    pub fn zeroed() -> Self {
        RawEntry { bytes: [0; ENTRY_SIZE], dirty: false }
    }

    /// Loads a record from its on-disk bytes; the result is clean.
    pub fn load(src: &[u8; ENTRY_SIZE]) -> Self {
        RawEntry { bytes: *src, dirty: false }
    }

    /// The full record for serialization.
    pub fn bytes(&self) -> &[u8; ENTRY_SIZE] {
        &self.bytes
    }

    pub fn classify(&self) -> EntryKind {
        match self.bytes[0] {
            0x00 => EntryKind::Free,
            DELETED_MARKER => EntryKind::Deleted,
            _ if self.read_flag_byte() == Attributes::LFN.bits() => EntryKind::Lfn,
            _ => EntryKind::Short,
        }
    }

    pub fn read_flag_byte(&self) -> u8 {
        self.bytes[ATTR_OFFSET]
    }

    pub fn write_flag_byte(&mut self, flags: u8) {
        self.bytes[ATTR_OFFSET] = flags;
        self.dirty = true;
    }

    /// Attribute view preserving any unknown high bits.
    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_retain(self.read_flag_byte())
    }

    pub fn first_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// Marks the record deleted in place.
    pub fn mark_deleted(&mut self) {
        self.bytes[0] = DELETED_MARKER;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // Little-endian field accessors shared by the short and LFN views.

    pub(crate) fn read_u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub(crate) fn write_u8(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
        self.dirty = true;
    }

    pub(crate) fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    pub(crate) fn write_u16(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        self.dirty = true;
    }

    pub(crate) fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    pub(crate) fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self.dirty = true;
    }

    pub(crate) fn read_slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.bytes[offset..offset + len]
    }

    pub(crate) fn write_slice(&mut self, offset: usize, src: &[u8]) {
        self.bytes[offset..offset + src.len()].copy_from_slice(src);
        self.dirty = true;
    }
}
