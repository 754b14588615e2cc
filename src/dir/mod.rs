//! In-memory directory tables.
//!
//! A [`DirectoryTable`] is the logical view of one directory: the raw
//! sector stream is parsed into an ordered sequence of entries (LFN
//! chains folded into their anchors), mutated through the table, and
//! serialized back slot-for-slot. Deleted records keep their positions
//! so a flush never shifts live entries.
//!
//! Submodules:
//! - [`raw`]: 32-byte record codec and classification
//! - [`short`]: 8.3 names and the short-entry field view
//! - [`lfn`]: long-filename slots, chains, and the binding checksum
//! - [`shortname`]: unique 8.3 name generation from long names

pub mod raw;
pub mod short;
pub mod lfn;
pub mod shortname;

use alloc::collections::BTreeSet;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use crate::error::{FatError, Result};
use crate::fat::FatType;
use self::lfn::ChainAssembler;
use self::raw::{Attributes, EntryKind, RawEntry, ENTRY_SIZE};
use self::short::{ShortEntry, ShortName};
use self::shortname::ShortNameGenerator;

// =================================================================
// Logical entries
// =================================================================

/// A live file or subdirectory: the 8.3 anchor plus an optional long
/// name carried by the LFN chain preceding it on disk.
#[derive(Debug, Clone)]
pub struct DirEntry {
    short: ShortEntry,
    long_name: Option<String>,
}

impl DirEntry {
    pub fn short(&self) -> &ShortEntry {
        &self.short
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    /// The name callers should show: the long name when one exists,
    /// otherwise the 8.3 form.
    pub fn name(&self) -> String {
        match &self.long_name {
            Some(name) => name.clone(),
            None => self.short.name().to_string(),
        }
    }

    /// Slots occupied by this entry's LFN chain (0 without one).
    fn lfn_slots(&self) -> usize {
        match &self.long_name {
            Some(name) => lfn::slot_count(name.chars().count()),
            None => 0,
        }
    }
}

/// One slot-position-preserving element of a directory table.
#[derive(Debug, Clone)]
pub enum LogicalEntry {
    /// A 0xE5 record, bytes preserved so flush keeps its slot.
    Deleted(RawEntry),
    /// The volume label record (root directory only).
    Label(ShortEntry),
    /// A live file or subdirectory.
    Entry(DirEntry),
}

impl LogicalEntry {
    /// On-disk slots this element occupies.
    fn slot_width(&self) -> usize {
        match self {
            LogicalEntry::Deleted(_) | LogicalEntry::Label(_) => 1,
            LogicalEntry::Entry(entry) => 1 + entry.lfn_slots(),
        }
    }
}

// =================================================================
// Directory table
// =================================================================

/// Ordered, dirty-tracked sequence of logical entries backing one
/// directory.
#[derive(Debug, Clone)]
pub struct DirectoryTable {
    fat_type: FatType,
    is_root: bool,
    resizable: bool,
    /// Total capacity in 32-byte slots; serialize pads up to this.
    capacity: usize,
    entries: Vec<LogicalEntry>,
    dirty: bool,
    listener: Option<Rc<Cell<bool>>>,
}

impl DirectoryTable {
    /// Creates an empty table. The FAT12/16 root is the only directory
    /// that cannot grow past its initial capacity.
    pub fn new(fat_type: FatType, is_root: bool, capacity: usize) -> Self {
        DirectoryTable {
            fat_type,
            is_root,
            resizable: !(is_root && fat_type.fixed_root()),
            capacity,
            entries: Vec::new(),
            dirty: false,
            listener: None,
        }
    }

    /// Creates a fresh subdirectory table seeded with the `.` and `..`
    /// entries pointing at the directory's own and parent clusters.
    pub fn new_subdirectory(
        fat_type: FatType,
        capacity: usize,
        cluster: u32,
        parent_cluster: u32,
    ) -> Result<Self> {
        let mut table = DirectoryTable::new(fat_type, false, capacity);

        let mut dot = ShortEntry::new(&ShortName::new(".", "")?, Attributes::DIRECTORY);
        dot.set_start_cluster(cluster, fat_type)?;
        let mut dotdot = ShortEntry::new(&ShortName::new("..", "")?, Attributes::DIRECTORY);
        dotdot.set_start_cluster(parent_cluster, fat_type)?;

        table.entries.push(LogicalEntry::Entry(DirEntry { short: dot, long_name: None }));
        table.entries.push(LogicalEntry::Entry(DirEntry { short: dotdot, long_name: None }));
        table.mark_dirty();
        Ok(table)
    }

    /// Parses a directory's backing bytes (a multiple of 32 long) into a
    /// table. Scanning stops at the first free-terminal record; LFN
    /// chains are folded into their anchors; damaged chains degrade to
    /// short-name-only entries and are never fatal.
    pub fn parse(bytes: &[u8], fat_type: FatType, is_root: bool) -> Result<Self> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(FatError::Corrupt);
        }

        let mut table = DirectoryTable::new(fat_type, is_root, bytes.len() / ENTRY_SIZE);
        let mut assembler = ChainAssembler::new();
        let mut seen_label = false;

        for (index, chunk) in bytes.chunks_exact(ENTRY_SIZE).enumerate() {
            let mut record = [0u8; ENTRY_SIZE];
            record.copy_from_slice(chunk);
            let raw = RawEntry::load(&record);

            match raw.classify() {
                EntryKind::Free => {
                    assembler.interrupt();
                    let tail_start = index * ENTRY_SIZE;
                    if bytes[tail_start + 1..].iter().any(|&b| b != 0) {
                        log::warn!(
                            "non-zero data after directory terminator at slot {index}; ignoring"
                        );
                    }
                    break;
                }
                EntryKind::Deleted => {
                    assembler.interrupt();
                    table.entries.push(LogicalEntry::Deleted(raw));
                }
                EntryKind::Lfn => assembler.feed(&raw),
                EntryKind::Short => {
                    let entry = ShortEntry::from_raw(raw);
                    let long_name = assembler
                        .take(&entry.name().to_disk())
                        .filter(|name| !name.is_empty());

                    if entry.is_volume_label() {
                        if !is_root {
                            log::warn!("volume label entry outside the root directory");
                        } else if seen_label {
                            log::warn!("duplicate volume label entry");
                        }
                        seen_label = true;
                        table.entries.push(LogicalEntry::Label(entry));
                    } else {
                        table.entries.push(LogicalEntry::Entry(DirEntry {
                            short: entry,
                            long_name,
                        }));
                    }
                }
            }
        }

        Ok(table)
    }

    /// Serializes every entry in slot order, zero-fills the remaining
    /// capacity, and clears the dirty bit.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        if self.used_slots() > self.capacity {
            return Err(FatError::Corrupt);
        }
        let mut out = vec![0u8; self.capacity * ENTRY_SIZE];
        let mut offset = 0;

        for entry in &mut self.entries {
            match entry {
                LogicalEntry::Deleted(raw) => {
                    out[offset..offset + ENTRY_SIZE].copy_from_slice(raw.bytes());
                    raw.clear_dirty();
                    offset += ENTRY_SIZE;
                }
                LogicalEntry::Label(label) => {
                    out[offset..offset + ENTRY_SIZE].copy_from_slice(label.raw().bytes());
                    label.clear_dirty();
                    offset += ENTRY_SIZE;
                }
                LogicalEntry::Entry(dir_entry) => {
                    if let Some(name) = &dir_entry.long_name {
                        for slot in lfn::build_chain(name, &dir_entry.short.name())? {
                            out[offset..offset + ENTRY_SIZE].copy_from_slice(slot.bytes());
                            offset += ENTRY_SIZE;
                        }
                    }
                    out[offset..offset + ENTRY_SIZE]
                        .copy_from_slice(dir_entry.short.raw().bytes());
                    dir_entry.short.clear_dirty();
                    offset += ENTRY_SIZE;
                }
            }
        }

        self.dirty = false;
        Ok(out)
    }

    // =================================================================
    // Mutation
    // =================================================================

    /// Inserts a new entry for `long_name`, generating a unique 8.3 name
    /// and an LFN chain when the long name needs one. Returns the entry's
    /// index. The directory is unmodified on error.
    pub fn insert(&mut self, long_name: &str, attrs: Attributes) -> Result<usize> {
        if attrs.contains(Attributes::VOLUME_LABEL) && !attrs.contains(Attributes::DIRECTORY) {
            return self.insert_label(long_name);
        }

        let used = self.used_short_names();
        let short_name = ShortNameGenerator::new(&used).generate(long_name)?;
        let anchor = ShortEntry::new(&short_name, attrs);
        self.place(long_name, anchor)
    }

    fn insert_label(&mut self, text: &str) -> Result<usize> {
        if !self.is_root || self.volume_label_index().is_some() {
            return Err(FatError::InvalidLabel);
        }
        let name = ShortName::label(text)?;
        let label = ShortEntry::new(&name, Attributes::VOLUME_LABEL);
        let position = self.claim_slots(1)?;
        self.entries.insert(position, LogicalEntry::Label(label));
        self.mark_dirty();
        Ok(position)
    }

    /// Places a prepared anchor, deriving the LFN chain from the gap
    /// between `long_name` and the anchor's 8.3 form.
    fn place(&mut self, long_name: &str, anchor: ShortEntry) -> Result<usize> {
        lfn::encode_ucs2(long_name)?;
        let long = if anchor.name().to_string() == long_name {
            None
        } else {
            Some(long_name.to_string())
        };
        let entry = DirEntry { short: anchor, long_name: long };

        let position = self.claim_slots(1 + entry.lfn_slots())?;
        self.entries.insert(position, LogicalEntry::Entry(entry));
        self.mark_dirty();
        Ok(position)
    }

    /// Marks the entry at `index` deleted: its anchor and every slot of
    /// its LFN chain get the 0xE5 marker but keep their positions.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let records: Vec<RawEntry> = match self.entries.get(index) {
            Some(LogicalEntry::Entry(entry)) => {
                let mut records = match &entry.long_name {
                    Some(name) => lfn::build_chain(name, &entry.short.name())?,
                    None => Vec::new(),
                };
                records.push(entry.short.raw().clone());
                records
            }
            Some(LogicalEntry::Label(label)) => vec![label.raw().clone()],
            _ => return Err(FatError::NotFound),
        };

        self.entries.remove(index);
        for (gap, mut record) in records.into_iter().enumerate() {
            record.mark_deleted();
            self.entries.insert(index + gap, LogicalEntry::Deleted(record));
        }
        self.mark_dirty();
        Ok(())
    }

    /// Renames the entry at `index`, regenerating the 8.3 name and LFN
    /// chain while preserving start cluster, length, timestamps, and
    /// attributes. Returns the entry's new index.
    pub fn rename(&mut self, index: usize, new_long_name: &str) -> Result<usize> {
        let old = match self.entries.get(index) {
            Some(LogicalEntry::Entry(entry)) => entry.clone(),
            _ => return Err(FatError::NotFound),
        };

        // Validate the new name fully before touching any slot.
        lfn::encode_ucs2(new_long_name)?;
        let mut used = self.used_short_names();
        used.remove(&old.short.name().to_string());
        let short_name = ShortNameGenerator::new(&used).generate(new_long_name)?;

        let mut anchor = old.short.clone();
        anchor.set_name(&short_name);

        self.remove(index)?;
        match self.place(new_long_name, anchor) {
            Ok(new_index) => Ok(new_index),
            Err(err) => {
                // The freed run is at least as large as the old entry;
                // put it back rather than losing it.
                let restore_name = old.name();
                let _ = self.place(&restore_name, old.short);
                Err(err)
            }
        }
    }

    /// Sets or replaces the volume label. Only the root table may carry
    /// one.
    pub fn set_volume_label(&mut self, text: &str) -> Result<usize> {
        if !self.is_root {
            return Err(FatError::InvalidLabel);
        }
        let name = ShortName::label(text)?;
        if let Some(index) = self.volume_label_index() {
            if let LogicalEntry::Label(label) = &mut self.entries[index] {
                label.set_name(&name);
            }
            self.mark_dirty();
            return Ok(index);
        }
        let label = ShortEntry::new(&name, Attributes::VOLUME_LABEL);
        let position = self.claim_slots(1)?;
        self.entries.insert(position, LogicalEntry::Label(label));
        self.mark_dirty();
        Ok(position)
    }

    /// Sets the table's dirty bit and signals the registered flush
    /// listener, if any.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        if let Some(flag) = &self.listener {
            flag.set(true);
        }
    }

    /// Registers a shared flag raised whenever this table turns dirty,
    /// for the enclosing filesystem's flush scheduling.
    pub fn set_flush_listener(&mut self, flag: Rc<Cell<bool>>) {
        self.listener = Some(flag);
    }

    // =================================================================
    // Queries
    // =================================================================

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Capacity in 32-byte slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots occupied by entries, including retained deleted records.
    pub fn used_slots(&self) -> usize {
        self.entries.iter().map(LogicalEntry::slot_width).sum()
    }

    /// Number of logical elements, deleted records included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All logical elements in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &LogicalEntry> {
        self.entries.iter()
    }

    /// Live file and subdirectory entries with their indices.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| match e {
            LogicalEntry::Entry(entry) => Some((i, entry)),
            _ => None,
        })
    }

    /// The live entry at `index`, if that slot holds one.
    pub fn entry(&self, index: usize) -> Option<&DirEntry> {
        match self.entries.get(index) {
            Some(LogicalEntry::Entry(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Mutable access to the live entry at `index`; every write through
    /// the guard marks the table dirty.
    pub fn entry_mut(&mut self, index: usize) -> Option<EntryMut<'_>> {
        let fat_type = self.fat_type;
        let DirectoryTable { entries, dirty, listener, .. } = self;
        match entries.get_mut(index) {
            Some(LogicalEntry::Entry(entry)) => {
                Some(EntryMut { entry, fat_type, dirty, listener })
            }
            _ => None,
        }
    }

    /// Finds a live entry by long name or 8.3 name, case-insensitively.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|element| match element {
            LogicalEntry::Entry(entry) => {
                entry
                    .long_name
                    .as_deref()
                    .is_some_and(|long| long.eq_ignore_ascii_case(name))
                    || entry.short.name().matches(name)
            }
            _ => false,
        })
    }

    /// The volume label text, if this is a root table carrying one.
    pub fn volume_label(&self) -> Option<String> {
        self.volume_label_index().and_then(|index| match &self.entries[index] {
            LogicalEntry::Label(label) => Some(label.name().as_label()),
            _ => None,
        })
    }

    fn volume_label_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, LogicalEntry::Label(_)))
    }

    /// Uppercase `NAME.EXT` forms currently taken in this table.
    pub fn used_short_names(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogicalEntry::Entry(entry) => Some(entry.short.name().to_string()),
                _ => None,
            })
            .collect()
    }

    // =================================================================
    // Slot allocation
    // =================================================================

    /// Finds room for `width` contiguous slots: the trailing free region
    /// first, then a run of deleted records (which are consumed), then
    /// growth when the directory is resizable.
    fn claim_slots(&mut self, width: usize) -> Result<usize> {
        let trailing_free = self.capacity - self.used_slots().min(self.capacity);
        if trailing_free >= width {
            return Ok(self.entries.len());
        }

        if let Some(start) = self.deleted_run(width) {
            self.entries.drain(start..start + width);
            return Ok(start);
        }

        if self.resizable {
            self.capacity += width - trailing_free;
            return Ok(self.entries.len());
        }

        Err(FatError::DirectoryFull)
    }

    /// First run of at least `width` consecutive deleted records.
    fn deleted_run(&self, width: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            if matches!(entry, LogicalEntry::Deleted(_)) {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len == width {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
        }
        None
    }
}

/// Write guard over one live entry. Setters flip the entry's dirty bit
/// and mark the owning table dirty in the same step.
pub struct EntryMut<'a> {
    entry: &'a mut DirEntry,
    fat_type: FatType,
    dirty: &'a mut bool,
    listener: &'a Option<Rc<Cell<bool>>>,
}

impl EntryMut<'_> {
    pub fn get(&self) -> &DirEntry {
        self.entry
    }

    fn touch(&mut self) {
        *self.dirty = true;
        if let Some(flag) = self.listener {
            flag.set(true);
        }
    }

    pub fn set_length(&mut self, length: u32) {
        self.entry.short.set_length(length);
        self.touch();
    }

    /// Stores the start cluster, rejecting values the directory's FAT
    /// type cannot address. A rejected write leaves the entry untouched
    /// and the table clean.
    pub fn set_start_cluster(&mut self, cluster: u32) -> Result<()> {
        self.entry.short.set_start_cluster(cluster, self.fat_type)?;
        self.touch();
        Ok(())
    }

    pub fn set_created(&mut self, date: crate::datetime::DosDate, time: crate::datetime::DosTime) {
        self.entry.short.set_created(date, time);
        self.touch();
    }

    pub fn set_accessed(&mut self, date: crate::datetime::DosDate) {
        self.entry.short.set_accessed(date);
        self.touch();
    }

    pub fn set_modified(&mut self, date: crate::datetime::DosDate, time: crate::datetime::DosTime) {
        self.entry.short.set_modified(date, time);
        self.touch();
    }

    pub fn set_read_only(&mut self) {
        self.entry.short.set_read_only();
        self.touch();
    }

    pub fn set_hidden(&mut self) {
        self.entry.short.set_hidden();
        self.touch();
    }

    pub fn set_system(&mut self) {
        self.entry.short.set_system();
        self.touch();
    }

    pub fn set_archive(&mut self) {
        self.entry.short.set_archive();
        self.touch();
    }

    pub fn set_directory(&mut self) {
        self.entry.short.set_directory();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::{DosDate, DosTime};

    fn new_table(capacity: usize) -> DirectoryTable {
        DirectoryTable::new(FatType::Fat32, false, capacity)
    }

    #[test]
    fn insert_and_find_by_both_names() {
        let mut table = new_table(8);
        let index = table.insert("Status Report.pdf", Attributes::ARCHIVE).unwrap();
        let entry = table.entry(index).unwrap();
        assert_eq!(entry.long_name(), Some("Status Report.pdf"));
        assert_eq!(entry.short().name().to_string(), "STATUS~1.PDF");

        assert_eq!(table.find("status report.pdf"), Some(index));
        assert_eq!(table.find("STATUS~1.PDF"), Some(index));
        assert_eq!(table.find("missing.txt"), None);
        assert!(table.is_dirty());
    }

    #[test]
    fn exact_83_name_carries_no_chain() {
        let mut table = new_table(4);
        let index = table.insert("README.TXT", Attributes::ARCHIVE).unwrap();
        let entry = table.entry(index).unwrap();
        assert_eq!(entry.long_name(), None);
        assert_eq!(table.used_slots(), 1);
    }

    #[test]
    fn serialize_parse_round_trip() {
        let mut table = new_table(8);
        table.insert("Status Report.pdf", Attributes::ARCHIVE).unwrap();
        table.insert("notes.txt", Attributes::ARCHIVE).unwrap();

        let bytes = table.serialize().unwrap();
        assert_eq!(bytes.len(), 8 * ENTRY_SIZE);
        assert!(!table.is_dirty());

        let reparsed = DirectoryTable::parse(&bytes, FatType::Fat32, false).unwrap();
        let names: Vec<String> =
            reparsed.live_entries().map(|(_, e)| e.name()).collect();
        assert_eq!(names, ["Status Report.pdf", "notes.txt"]);
    }

    #[test]
    fn short_names_stay_unique() {
        let mut table = new_table(16);
        let a = table.insert("collision test.txt", Attributes::ARCHIVE).unwrap();
        let b = table.insert("collision two.txt", Attributes::ARCHIVE).unwrap();
        let sa = table.entry(a).unwrap().short().name().to_string();
        let sb = table.entry(b).unwrap().short().name().to_string();
        assert_ne!(sa, sb);
        assert_eq!(sa, "COLLIS~1.TXT");
        assert_eq!(sb, "COLLIS~2.TXT");
    }

    #[test]
    fn remove_marks_chain_and_anchor_deleted() {
        let mut table = new_table(8);
        let index = table.insert("a longer file name.dat", Attributes::ARCHIVE).unwrap();
        let width = table.used_slots();
        assert!(width > 1);

        table.remove(index).unwrap();
        assert_eq!(table.used_slots(), width);
        assert_eq!(table.live_entries().count(), 0);
        let deleted = table
            .iter()
            .filter(|e| matches!(e, LogicalEntry::Deleted(_)))
            .count();
        assert_eq!(deleted, width);

        // Deleted records keep their positions across a flush cycle.
        let bytes = table.serialize().unwrap();
        let reparsed = DirectoryTable::parse(&bytes, FatType::Fat32, false).unwrap();
        assert_eq!(reparsed.len(), width);
        assert_eq!(reparsed.live_entries().count(), 0);
    }

    #[test]
    fn deleted_run_is_reused() {
        let mut table = DirectoryTable::new(FatType::Fat16, true, 4);
        let first = table.insert("old entry.txt", Attributes::ARCHIVE).unwrap();
        assert_eq!(table.used_slots(), 2);
        table.insert("KEEP.TXT", Attributes::ARCHIVE).unwrap();
        table.remove(first).unwrap();

        // Capacity 4 with 3 slots used: the two-slot replacement must
        // land in the deleted run, not the single trailing slot.
        let index = table.insert("new entry.txt", Attributes::ARCHIVE).unwrap();
        assert_eq!(index, 0);
        assert_eq!(table.used_slots(), 3);
    }

    #[test]
    fn fixed_root_reports_full() {
        let mut table = DirectoryTable::new(FatType::Fat12, true, 2);
        table.insert("A.TXT", Attributes::ARCHIVE).unwrap();
        table.insert("B.TXT", Attributes::ARCHIVE).unwrap();
        assert_eq!(
            table.insert("C.TXT", Attributes::ARCHIVE),
            Err(FatError::DirectoryFull)
        );
        // Failed insert leaves the table contents alone.
        assert_eq!(table.live_entries().count(), 2);
    }

    #[test]
    fn resizable_directory_grows() {
        let mut table = new_table(1);
        table.insert("A.TXT", Attributes::ARCHIVE).unwrap();
        table.insert("quite a long name.txt", Attributes::ARCHIVE).unwrap();
        assert!(table.capacity() >= table.used_slots());
    }

    #[test]
    fn rename_preserves_metadata() {
        let mut table = new_table(8);
        let index = table.insert("Original.txt", Attributes::ARCHIVE).unwrap();
        {
            let mut entry = table.entry_mut(index).unwrap();
            entry.set_start_cluster(42).unwrap();
            entry.set_length(1234);
            entry.set_created(DosDate::new(2001, 2, 3), DosTime::new(4, 5, 6));
        }

        let new_index = table.rename(index, "NewName.txt").unwrap();
        let entry = table.entry(new_index).unwrap();
        assert_eq!(entry.long_name(), Some("NewName.txt"));
        assert_eq!(entry.short().start_cluster(), 42);
        assert_eq!(entry.short().length(), 1234);
        assert_eq!(entry.short().created().0, DosDate::new(2001, 2, 3));
    }

    #[test]
    fn rename_respects_taken_names() {
        let mut table = new_table(8);
        table.insert("NEWNAME.TXT", Attributes::ARCHIVE).unwrap();
        let index = table.insert("Original.txt", Attributes::ARCHIVE).unwrap();
        let new_index = table.rename(index, "NewName.txt").unwrap();
        assert_eq!(
            table.entry(new_index).unwrap().short().name().to_string(),
            "NEWNAM~1.TXT"
        );
    }

    #[test]
    fn cluster_too_wide_for_fat16_leaves_table_clean() {
        let mut table = DirectoryTable::new(FatType::Fat16, false, 4);
        let index = table.insert("DATA.BIN", Attributes::ARCHIVE).unwrap();
        table.serialize().unwrap();
        assert!(!table.is_dirty());

        let mut entry = table.entry_mut(index).unwrap();
        assert_eq!(entry.set_start_cluster(0x12345), Err(FatError::InvalidCluster));
        drop(entry);
        assert!(!table.is_dirty());
        assert_eq!(table.entry(index).unwrap().short().start_cluster(), 0);
    }

    #[test]
    fn entry_mutation_propagates_to_listener() {
        let mut table = new_table(4);
        let index = table.insert("file.txt", Attributes::ARCHIVE).unwrap();
        table.serialize().unwrap();

        let flag = Rc::new(Cell::new(false));
        table.set_flush_listener(flag.clone());
        table.entry_mut(index).unwrap().set_length(99);
        assert!(table.is_dirty());
        assert!(flag.get());
        assert!(table.entry(index).unwrap().short().is_dirty());
    }

    #[test]
    fn volume_label_only_in_root() {
        let mut root = DirectoryTable::new(FatType::Fat16, true, 4);
        root.set_volume_label("MYDISK").unwrap();
        assert_eq!(root.volume_label().as_deref(), Some("MYDISK"));
        assert_eq!(root.set_volume_label("NEWDISK").map(|_| ()), Ok(()));
        assert_eq!(root.volume_label().as_deref(), Some("NEWDISK"));

        let mut sub = new_table(4);
        assert_eq!(sub.set_volume_label("NOPE"), Err(FatError::InvalidLabel));
        assert_eq!(
            sub.insert("NOPE", Attributes::VOLUME_LABEL),
            Err(FatError::InvalidLabel)
        );
    }

    #[test]
    fn duplicate_label_insert_rejected() {
        let mut root = DirectoryTable::new(FatType::Fat32, true, 8);
        root.insert("DISK", Attributes::VOLUME_LABEL).unwrap();
        assert_eq!(
            root.insert("DISK2", Attributes::VOLUME_LABEL),
            Err(FatError::InvalidLabel)
        );
    }

    #[test]
    fn parse_stops_at_terminator() {
        let mut table = new_table(4);
        table.insert("A.TXT", Attributes::ARCHIVE).unwrap();
        let mut bytes = table.serialize().unwrap();
        // Write garbage past the terminator slot; it must be ignored.
        let len = bytes.len();
        bytes[len - 1] = 0xAB;
        let reparsed = DirectoryTable::parse(&bytes, FatType::Fat32, false).unwrap();
        assert_eq!(reparsed.live_entries().count(), 1);
    }

    #[test]
    fn parse_rejects_ragged_buffer() {
        assert_eq!(
            DirectoryTable::parse(&[0u8; 33], FatType::Fat16, false).err(),
            Some(FatError::Corrupt)
        );
    }

    #[test]
    fn subdirectory_bootstrap_has_dot_entries() {
        let table =
            DirectoryTable::new_subdirectory(FatType::Fat32, 16, 7, 2).unwrap();
        let names: Vec<String> =
            table.live_entries().map(|(_, e)| e.name()).collect();
        assert_eq!(names, [".", ".."]);
        assert_eq!(table.entry(0).unwrap().short().start_cluster(), 7);
        assert_eq!(table.entry(1).unwrap().short().start_cluster(), 2);
        assert!(table.entry(0).unwrap().short().is_directory());
    }
}
