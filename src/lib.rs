//! libfat — FAT12/16/32 directory subsystem library.
//!
//! Implements the on-disk directory format shared by all FAT variants:
//! 32-byte records, VFAT long-filename chains bound to their 8.3 anchor
//! by checksum, unique short-name generation, and dirty-tracked
//! in-memory directory tables that serialize back slot-for-slot. The
//! block device and the cluster allocation table are collaborators
//! behind traits; this crate owns everything between the raw sector
//! stream and the logical directory entry.
//!
//! # Architecture
//!
//! - **Records** (`dir/raw.rs`) — the 32-byte codec and record classifier
//! - **Short entries** (`dir/short.rs`) — 8.3 names, attributes,
//!   timestamps, cluster and length fields
//! - **Long filenames** (`dir/lfn.rs`) — slot chains, the binding
//!   checksum, assembly and disassembly
//! - **Name generation** (`dir/shortname.rs`) — legal, unique 8.3 names
//!   for arbitrary long names
//! - **Tables** (`dir/mod.rs`) — parse, mutate, and serialize whole
//!   directories with dirty propagation
//! - **Façade** (`fs.rs`) — mounting the root, opaque entry handles, and
//!   walking subdirectories through the [`FatTable`] collaborator
//!
//! Reading a directory never fails on recoverable damage: broken LFN
//! chains degrade to the anchor's short name, and diagnostics go through
//! the `log` facade.

#![no_std]

extern crate alloc;

pub mod error;
pub mod datetime;
pub mod device;
pub mod fat;
pub mod dir;
pub mod fs;

pub use error::{FatError, Result};
pub use datetime::{DosDate, DosTime};
pub use device::{BlockDevice, MemoryDevice};
pub use fat::{FatTable, FatType};
pub use dir::raw::{Attributes, EntryKind, RawEntry, ENTRY_SIZE};
pub use dir::short::{ShortEntry, ShortName};
pub use dir::shortname::ShortNameGenerator;
pub use dir::{DirEntry, DirectoryTable, EntryMut, LogicalEntry};
pub use fs::{EntryHandle, FileSystem, RootLocation};

/// Maximum long-filename length in characters.
pub const MAX_NAME_LEN: usize = dir::lfn::MAX_NAME_CHARS;
