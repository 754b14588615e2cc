//! 8.3 short names and the short directory entry view.
//!
//! [`ShortName`] is the canonical 11-byte name form (8 name + 3 extension,
//! space padded, uppercase). [`ShortEntry`] interprets a [`RawEntry`] as a
//! standard directory record: name, attributes, timestamps, start cluster
//! and length. The 0xE5/0x05 escape in byte 0 is applied on the way to
//! disk and reversed on the way back, so the logical name always shows
//! the real leading byte.

use alloc::string::String;
use core::fmt;

use crate::datetime::{DosDate, DosTime};
use crate::error::{FatError, Result};
use crate::fat::FatType;
use super::raw::{Attributes, RawEntry, DELETED_ESCAPE, DELETED_MARKER};

const NAME_LEN: usize = 8;
const EXT_LEN: usize = 3;

const NAME_OFFSET: usize = 0x00;
const CREATED_TIME_OFFSET: usize = 0x0E;
const CREATED_DATE_OFFSET: usize = 0x10;
const ACCESSED_DATE_OFFSET: usize = 0x12;
const CLUSTER_HI_OFFSET: usize = 0x14;
const MODIFIED_TIME_OFFSET: usize = 0x16;
const MODIFIED_DATE_OFFSET: usize = 0x18;
const CLUSTER_LO_OFFSET: usize = 0x1A;
const LENGTH_OFFSET: usize = 0x1C;

/// Canonical 11-byte 8.3 name, held in logical form (a leading 0xE5 is
/// stored as 0xE5 here; the escape is a disk-encoding detail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortName {
    bytes: [u8; NAME_LEN + EXT_LEN],
}

impl ShortName {
    /// Builds a name from separate name and extension parts. Parts are
    /// uppercased; anything non-ASCII or over-long is rejected.
    pub fn new(name: &str, ext: &str) -> Result<Self> {
        if name.len() > NAME_LEN || ext.len() > EXT_LEN {
            return Err(FatError::UnsupportedName);
        }
        let mut bytes = [b' '; NAME_LEN + EXT_LEN];
        for (dst, ch) in bytes.iter_mut().zip(name.bytes()) {
            if !ch.is_ascii() {
                return Err(FatError::UnsupportedName);
            }
            *dst = ch.to_ascii_uppercase();
        }
        for (dst, ch) in bytes[NAME_LEN..].iter_mut().zip(ext.bytes()) {
            if !ch.is_ascii() {
                return Err(FatError::UnsupportedName);
            }
            *dst = ch.to_ascii_uppercase();
        }
        Ok(ShortName { bytes })
    }

    /// Builds a volume-label name: up to 11 characters, uppercased, not
    /// split at a dot.
    pub fn label(text: &str) -> Result<Self> {
        if text.len() > NAME_LEN + EXT_LEN {
            return Err(FatError::UnsupportedName);
        }
        let mut bytes = [b' '; NAME_LEN + EXT_LEN];
        for (dst, ch) in bytes.iter_mut().zip(text.bytes()) {
            if !ch.is_ascii() {
                return Err(FatError::UnsupportedName);
            }
            *dst = ch.to_ascii_uppercase();
        }
        Ok(ShortName { bytes })
    }

    /// Decodes the on-disk 11 bytes, reversing the 0x05 escape.
    pub fn from_disk(raw: &[u8]) -> Self {
        let mut bytes = [b' '; NAME_LEN + EXT_LEN];
        bytes.copy_from_slice(&raw[..NAME_LEN + EXT_LEN]);
        if bytes[0] == DELETED_ESCAPE {
            bytes[0] = DELETED_MARKER;
        }
        ShortName { bytes }
    }

    /// Encodes to the on-disk 11 bytes, escaping a leading 0xE5.
    pub fn to_disk(&self) -> [u8; NAME_LEN + EXT_LEN] {
        let mut bytes = self.bytes;
        if bytes[0] == DELETED_MARKER {
            bytes[0] = DELETED_ESCAPE;
        }
        bytes
    }

    /// Name part with trailing pad spaces removed.
    pub fn name_bytes(&self) -> &[u8] {
        trim_padding(&self.bytes[..NAME_LEN])
    }

    /// Extension part with trailing pad spaces removed.
    pub fn ext_bytes(&self) -> &[u8] {
        trim_padding(&self.bytes[NAME_LEN..])
    }

    /// The checksum binding LFN slots to this name, computed over the
    /// on-disk byte form.
    pub fn checksum(&self) -> u8 {
        super::lfn::checksum(&self.to_disk())
    }

    /// Raw 11-character rendering with trailing padding removed. Volume
    /// labels use the full field without a dot split.
    pub fn as_label(&self) -> String {
        let mut text = String::new();
        for &b in trim_padding(&self.bytes) {
            text.push(b as char);
        }
        text
    }

    /// Case-insensitive comparison against a `NAME.EXT`-style string.
    pub fn matches(&self, name: &str) -> bool {
        let (base, ext) = match name.rfind('.') {
            Some(dot) => (&name[..dot], &name[dot + 1..]),
            None => (name, ""),
        };
        eq_ignore_case(self.name_bytes(), base) && eq_ignore_case(self.ext_bytes(), ext)
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
    &field[..end]
}

fn eq_ignore_case(field: &[u8], part: &str) -> bool {
    field.len() == part.len()
        && field
            .iter()
            .zip(part.bytes())
            .all(|(&a, b)| a.to_ascii_uppercase() == b.to_ascii_uppercase())
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.name_bytes() {
            write!(f, "{}", b as char)?;
        }
        if !self.ext_bytes().is_empty() {
            write!(f, ".")?;
            for &b in self.ext_bytes() {
                write!(f, "{}", b as char)?;
            }
        }
        Ok(())
    }
}

/// A raw record interpreted as an 8.3 directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortEntry {
    raw: RawEntry,
}

impl ShortEntry {
    /// Creates a fresh entry with the given name and attribute byte.
    /// Timestamps start at the DOS epoch (1980-01-01 00:00:00).
    pub fn new(name: &ShortName, attrs: Attributes) -> Self {
        let mut entry = ShortEntry { raw: RawEntry::zeroed() };
        entry.set_name(name);
        entry.raw.write_flag_byte(attrs.bits());
        entry.set_created(DosDate::MIN, DosTime::MIDNIGHT);
        entry.set_modified(DosDate::MIN, DosTime::MIDNIGHT);
        entry.set_accessed(DosDate::MIN);
        entry.raw.clear_dirty();
        entry
    }

    /// Wraps an already-loaded raw record.
    pub fn from_raw(raw: RawEntry) -> Self {
        ShortEntry { raw }
    }

    pub fn raw(&self) -> &RawEntry {
        &self.raw
    }

    pub fn name(&self) -> ShortName {
        ShortName::from_disk(self.raw.read_slice(NAME_OFFSET, NAME_LEN + EXT_LEN))
    }

    pub fn set_name(&mut self, name: &ShortName) {
        self.raw.write_slice(NAME_OFFSET, &name.to_disk());
    }

    pub fn attributes(&self) -> Attributes {
        self.raw.attributes()
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes().contains(Attributes::READ_ONLY)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes().contains(Attributes::HIDDEN)
    }

    pub fn is_system(&self) -> bool {
        self.attributes().contains(Attributes::SYSTEM)
    }

    pub fn is_archive(&self) -> bool {
        self.attributes().contains(Attributes::ARCHIVE)
    }

    /// A file is an entry with neither the directory nor the label bit.
    /// When both bits are set the record is malformed; it reads as a file.
    pub fn is_file(&self) -> bool {
        !self.is_directory() && !self.is_volume_label()
    }

    pub fn is_directory(&self) -> bool {
        let attrs = self.attributes();
        attrs.contains(Attributes::DIRECTORY) && !attrs.contains(Attributes::VOLUME_LABEL)
    }

    pub fn is_volume_label(&self) -> bool {
        let attrs = self.attributes();
        attrs.contains(Attributes::VOLUME_LABEL) && !attrs.contains(Attributes::DIRECTORY)
    }

    pub fn set_read_only(&mut self) {
        self.or_flags(Attributes::READ_ONLY);
    }

    pub fn set_hidden(&mut self) {
        self.or_flags(Attributes::HIDDEN);
    }

    pub fn set_system(&mut self) {
        self.or_flags(Attributes::SYSTEM);
    }

    pub fn set_archive(&mut self) {
        self.or_flags(Attributes::ARCHIVE);
    }

    /// Replaces the whole attribute byte: a fresh directory carries no
    /// other flags.
    pub fn set_directory(&mut self) {
        self.raw.write_flag_byte(Attributes::DIRECTORY.bits());
    }

    /// Replaces the whole attribute byte, like [`Self::set_directory`].
    pub fn set_label(&mut self) {
        self.raw.write_flag_byte(Attributes::VOLUME_LABEL.bits());
    }

    fn or_flags(&mut self, flag: Attributes) {
        let flags = self.raw.read_flag_byte() | flag.bits();
        self.raw.write_flag_byte(flags);
    }

    pub fn created(&self) -> (DosDate, DosTime) {
        (
            DosDate::from_raw(self.raw.read_u16(CREATED_DATE_OFFSET)),
            DosTime::from_raw(self.raw.read_u16(CREATED_TIME_OFFSET)),
        )
    }

    pub fn set_created(&mut self, date: DosDate, time: DosTime) {
        self.raw.write_u16(CREATED_DATE_OFFSET, date.to_raw());
        self.raw.write_u16(CREATED_TIME_OFFSET, time.to_raw());
    }

    /// Last-access date; FAT stores no access time.
    pub fn accessed(&self) -> DosDate {
        DosDate::from_raw(self.raw.read_u16(ACCESSED_DATE_OFFSET))
    }

    pub fn set_accessed(&mut self, date: DosDate) {
        self.raw.write_u16(ACCESSED_DATE_OFFSET, date.to_raw());
    }

    pub fn modified(&self) -> (DosDate, DosTime) {
        (
            DosDate::from_raw(self.raw.read_u16(MODIFIED_DATE_OFFSET)),
            DosTime::from_raw(self.raw.read_u16(MODIFIED_TIME_OFFSET)),
        )
    }

    pub fn set_modified(&mut self, date: DosDate, time: DosTime) {
        self.raw.write_u16(MODIFIED_DATE_OFFSET, date.to_raw());
        self.raw.write_u16(MODIFIED_TIME_OFFSET, time.to_raw());
    }

    /// Start cluster assembled from the low and high 16-bit words.
    pub fn start_cluster(&self) -> u32 {
        let lo = self.raw.read_u16(CLUSTER_LO_OFFSET) as u32;
        let hi = self.raw.read_u16(CLUSTER_HI_OFFSET) as u32;
        hi << 16 | lo
    }

    /// Stores the start cluster. On FAT12/16 the high word does not
    /// exist on disk; values above 0xFFFF are rejected before any byte
    /// is touched.
    pub fn set_start_cluster(&mut self, cluster: u32, fat_type: FatType) -> Result<()> {
        if !fat_type.cluster_fits(cluster) {
            return Err(FatError::InvalidCluster);
        }
        self.raw.write_u16(CLUSTER_LO_OFFSET, cluster as u16);
        let hi = if fat_type == FatType::Fat32 { (cluster >> 16) as u16 } else { 0 };
        self.raw.write_u16(CLUSTER_HI_OFFSET, hi);
        Ok(())
    }

    /// File length in bytes; 0 for directories.
    pub fn length(&self) -> u32 {
        self.raw.read_u32(LENGTH_OFFSET)
    }

    pub fn set_length(&mut self, length: u32) {
        self.raw.write_u32(LENGTH_OFFSET, length);
    }

    pub fn is_dirty(&self) -> bool {
        self.raw.is_dirty()
    }

    pub fn clear_dirty(&mut self) {
        self.raw.clear_dirty();
    }
}
