//! Error types for libfat.
//!
//! `FatError` covers both the structural failures of the directory codec
//! (bad names, exhausted name space, full tables) and the I/O-facing
//! conditions the filesystem façade surfaces. Recoverable on-disk damage
//! (a broken LFN chain, stray bytes after the terminator) is *not* an
//! error: it is logged and parsing continues with what could be salvaged.

use core::fmt;

/// Errors returned by directory and filesystem operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatError {
    /// Start cluster value out of range for the FAT type (FAT12/16 entries
    /// cannot address clusters above 0xFFFF).
    InvalidCluster,
    /// Long name contains a code point outside the UCS-2 BMP, or is empty
    /// or longer than 255 characters.
    UnsupportedName,
    /// Every numeric-tail candidate (`~1` through `~99998`) for the 8.3
    /// name is already taken in the directory.
    ShortNameExhausted,
    /// Not enough contiguous free or deleted slots, and the directory
    /// cannot grow (fixed-size FAT12/16 root).
    DirectoryFull,
    /// Structural violation that cannot be recovered from, such as a
    /// directory buffer whose length is not a multiple of 32.
    Corrupt,
    /// Volume label placement violates FAT rules: outside the root
    /// directory, or a label is already present.
    InvalidLabel,
    /// No entry at the given index or name, or the slot holds a deleted
    /// record.
    NotFound,
    /// The operation requires a directory entry but found a file.
    NotADirectory,
    /// Write attempted on read-only media.
    ReadOnly,
    /// Low-level block device failure (out-of-range access, short read).
    Io,
}

impl fmt::Display for FatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatError::InvalidCluster => write!(f, "cluster value out of range for FAT type"),
            FatError::UnsupportedName => write!(f, "name not representable in UCS-2"),
            FatError::ShortNameExhausted => write!(f, "no unused 8.3 name variant left"),
            FatError::DirectoryFull => write!(f, "directory has no room for new entries"),
            FatError::Corrupt => write!(f, "directory data is structurally corrupt"),
            FatError::InvalidLabel => write!(f, "volume label not allowed here"),
            FatError::NotFound => write!(f, "directory entry not found"),
            FatError::NotADirectory => write!(f, "entry is not a directory"),
            FatError::ReadOnly => write!(f, "device is read-only"),
            FatError::Io => write!(f, "block device I/O failure"),
        }
    }
}

/// Convenience result alias for directory operations.
pub type Result<T> = core::result::Result<T, FatError>;
