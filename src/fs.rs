//! Filesystem façade over the directory core.
//!
//! Ties a [`BlockDevice`] and a [`FatTable`] to the root directory and
//! hands out opaque [`EntryHandle`]s to individual entries and further
//! [`DirectoryTable`]s for subdirectories. The façade schedules nothing
//! itself: tables raise a shared dirty flag when mutated, and the caller
//! decides when to flush.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use core::cell::Cell;

use crate::datetime::{DosDate, DosTime};
use crate::device::BlockDevice;
use crate::dir::raw::{Attributes, ENTRY_SIZE};
use crate::dir::short::ShortName;
use crate::dir::{DirEntry, DirectoryTable, EntryMut};
use crate::error::{FatError, Result};
use crate::fat::{FatTable, FatType};

/// Where the root directory lives on the volume.
#[derive(Debug, Clone, Copy)]
pub enum RootLocation {
    /// Fixed region (FAT12/16): byte offset on the device and size in
    /// 32-byte slots.
    Region { offset: u64, slots: usize },
    /// Ordinary cluster chain (FAT32).
    Cluster(u32),
}

/// A mounted directory tree: device, cluster map, and the parsed root.
pub struct FileSystem<D: BlockDevice, F: FatTable> {
    device: D,
    fat: F,
    fat_type: FatType,
    root_location: RootLocation,
    root: DirectoryTable,
    dirty_signal: Rc<Cell<bool>>,
}

impl<D: BlockDevice, F: FatTable> FileSystem<D, F> {
    /// Reads and parses the root directory. The boot-sector fields that
    /// locate the root are the mount layer's concern and arrive here
    /// already decoded as `root_location`.
    pub fn mount(
        device: D,
        fat: F,
        fat_type: FatType,
        root_location: RootLocation,
    ) -> Result<Self> {
        let bytes = match root_location {
            RootLocation::Region { offset, slots } => {
                let mut buf = vec![0u8; slots * ENTRY_SIZE];
                device.read(offset, &mut buf)?;
                buf
            }
            RootLocation::Cluster(first) => fat.chain_bytes(first)?,
        };
        let mut root = DirectoryTable::parse(&bytes, fat_type, true)?;
        log::debug!(
            "mounted root directory: {} entries in {} slots",
            root.len(),
            root.capacity()
        );

        let dirty_signal = Rc::new(Cell::new(false));
        root.set_flush_listener(dirty_signal.clone());
        Ok(FileSystem { device, fat, fat_type, root_location, root, dirty_signal })
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    pub fn is_read_only(&self) -> bool {
        self.device.is_read_only()
    }

    pub fn root(&self) -> &DirectoryTable {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut DirectoryTable {
        &mut self.root
    }

    /// Whether any table handed out by this filesystem was mutated since
    /// the signal was last cleared.
    pub fn needs_flush(&self) -> bool {
        self.dirty_signal.get()
    }

    /// Lowers the shared dirty signal, typically after the caller has
    /// flushed every table it holds.
    pub fn clear_flush_signal(&self) {
        self.dirty_signal.set(false);
    }

    /// Opaque handle to the entry at `index` of the root directory, or
    /// `None` if that slot holds no live entry.
    pub fn root_entry(&mut self, index: usize) -> Option<EntryHandle<'_, F>> {
        let FileSystem { fat, fat_type, dirty_signal, root, .. } = self;
        root.entry(index)?;
        Some(EntryHandle { fat, fat_type: *fat_type, dirty_signal, table: root, index })
    }

    /// Opaque handle to the entry at `index` of a table previously
    /// opened through this filesystem.
    pub fn entry<'a>(
        &'a self,
        table: &'a mut DirectoryTable,
        index: usize,
    ) -> Option<EntryHandle<'a, F>> {
        table.entry(index)?;
        Some(EntryHandle {
            fat: &self.fat,
            fat_type: self.fat_type,
            dirty_signal: &self.dirty_signal,
            table,
            index,
        })
    }

    /// Opens the subdirectory behind the entry at `index` of `parent`.
    /// Fails with [`FatError::NotADirectory`] for files. The returned
    /// table shares this filesystem's dirty signal.
    pub fn open_directory(
        &self,
        parent: &DirectoryTable,
        index: usize,
    ) -> Result<DirectoryTable> {
        let entry = parent.entry(index).ok_or(FatError::NotFound)?;
        if !entry.short().is_directory() {
            return Err(FatError::NotADirectory);
        }
        let bytes = self.fat.chain_bytes(entry.short().start_cluster())?;
        let mut table = DirectoryTable::parse(&bytes, self.fat_type, false)?;
        table.set_flush_listener(self.dirty_signal.clone());
        Ok(table)
    }

    /// Serializes the root table back to its on-disk location if it is
    /// dirty.
    pub fn flush_root(&mut self) -> Result<()> {
        if !self.root.is_dirty() {
            return Ok(());
        }
        if self.device.is_read_only() {
            return Err(FatError::ReadOnly);
        }
        let bytes = self.root.serialize()?;
        match self.root_location {
            RootLocation::Region { offset, .. } => self.device.write(offset, &bytes)?,
            RootLocation::Cluster(first) => self.fat.write_chain(first, &bytes)?,
        }
        self.device.flush()
    }

    /// Serializes a subdirectory table back to its cluster chain if it
    /// is dirty.
    pub fn flush_directory(
        &mut self,
        table: &mut DirectoryTable,
        first_cluster: u32,
    ) -> Result<()> {
        if !table.is_dirty() {
            return Ok(());
        }
        if self.device.is_read_only() {
            return Err(FatError::ReadOnly);
        }
        let bytes = table.serialize()?;
        self.fat.write_chain(first_cluster, &bytes)?;
        self.device.flush()
    }

    /// Releases the device and cluster map.
    pub fn into_parts(self) -> (D, F) {
        (self.device, self.fat)
    }
}

/// Opaque reference to one live directory entry: the owning table plus
/// the entry's index, with the cluster map borrowed alongside so the
/// entry can resolve its own chain.
///
/// Getters read the anchor's fields; mutators route through the table so
/// dirty propagation works as for any other table mutation. The handle
/// holds the table exclusively, so its index stays valid for the
/// handle's whole lifetime.
pub struct EntryHandle<'a, F: FatTable> {
    fat: &'a F,
    fat_type: FatType,
    dirty_signal: &'a Rc<Cell<bool>>,
    table: &'a mut DirectoryTable,
    index: usize,
}

impl<'a, F: FatTable> EntryHandle<'a, F> {
    fn entry(&self) -> &DirEntry {
        match self.table.entry(self.index) {
            Some(entry) => entry,
            // Construction validated the index and set_long_name tracks
            // the entry when it moves.
            None => unreachable!(),
        }
    }

    fn entry_mut(&mut self) -> EntryMut<'_> {
        match self.table.entry_mut(self.index) {
            Some(entry) => entry,
            None => unreachable!(),
        }
    }

    /// The entry's current index within its table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn short_name(&self) -> ShortName {
        self.entry().short().name()
    }

    pub fn long_name(&self) -> Option<&str> {
        self.entry().long_name()
    }

    /// The long name when one exists, otherwise the 8.3 form.
    pub fn name(&self) -> String {
        self.entry().name()
    }

    pub fn attributes(&self) -> Attributes {
        self.entry().short().attributes()
    }

    pub fn is_file(&self) -> bool {
        self.entry().short().is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.entry().short().is_directory()
    }

    pub fn start_cluster(&self) -> u32 {
        self.entry().short().start_cluster()
    }

    pub fn length(&self) -> u32 {
        self.entry().short().length()
    }

    pub fn created(&self) -> (DosDate, DosTime) {
        self.entry().short().created()
    }

    pub fn accessed(&self) -> DosDate {
        self.entry().short().accessed()
    }

    pub fn modified(&self) -> (DosDate, DosTime) {
        self.entry().short().modified()
    }

    pub fn is_dirty(&self) -> bool {
        self.entry().short().is_dirty()
    }

    pub fn set_length(&mut self, length: u32) {
        self.entry_mut().set_length(length);
    }

    /// Stores the start cluster, rejecting values the volume's FAT type
    /// cannot address.
    pub fn set_start_cluster(&mut self, cluster: u32) -> Result<()> {
        self.entry_mut().set_start_cluster(cluster)
    }

    pub fn set_created(&mut self, date: DosDate, time: DosTime) {
        self.entry_mut().set_created(date, time);
    }

    pub fn set_accessed(&mut self, date: DosDate) {
        self.entry_mut().set_accessed(date);
    }

    pub fn set_modified(&mut self, date: DosDate, time: DosTime) {
        self.entry_mut().set_modified(date, time);
    }

    pub fn set_read_only(&mut self) {
        self.entry_mut().set_read_only();
    }

    pub fn set_hidden(&mut self) {
        self.entry_mut().set_hidden();
    }

    pub fn set_system(&mut self) {
        self.entry_mut().set_system();
    }

    pub fn set_archive(&mut self) {
        self.entry_mut().set_archive();
    }

    pub fn set_directory(&mut self) {
        self.entry_mut().set_directory();
    }

    /// Renames the entry, regenerating its 8.3 name and LFN chain while
    /// start cluster, length, and timestamps carry over. The handle
    /// follows the entry to its new slot.
    pub fn set_long_name(&mut self, name: &str) -> Result<()> {
        self.index = self.table.rename(self.index, name)?;
        Ok(())
    }

    /// Resolves the entry's cluster chain into a directory table. Fails
    /// with [`FatError::NotADirectory`] for files. The returned table
    /// shares the filesystem's dirty signal.
    pub fn iter_if_directory(&self) -> Result<DirectoryTable> {
        let entry = self.entry();
        if !entry.short().is_directory() {
            return Err(FatError::NotADirectory);
        }
        let bytes = self.fat.chain_bytes(entry.short().start_cluster())?;
        let mut table = DirectoryTable::parse(&bytes, self.fat_type, false)?;
        table.set_flush_listener(self.dirty_signal.clone());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use crate::device::MemoryDevice;

    /// Cluster map holding whole chains as flat buffers.
    struct TestFat {
        chains: BTreeMap<u32, Vec<u8>>,
        next: u32,
    }

    impl TestFat {
        fn new() -> Self {
            TestFat { chains: BTreeMap::new(), next: 2 }
        }

        fn with_chain(mut self, cluster: u32, bytes: Vec<u8>) -> Self {
            self.chains.insert(cluster, bytes);
            self.next = self.next.max(cluster + 1);
            self
        }
    }

    impl FatTable for TestFat {
        fn chain_bytes(&self, first_cluster: u32) -> Result<Vec<u8>> {
            self.chains.get(&first_cluster).cloned().ok_or(FatError::Io)
        }

        fn allocate_chain(&mut self, len: usize) -> Result<u32> {
            let cluster = self.next;
            self.next += 1;
            self.chains.insert(cluster, vec![0; len]);
            Ok(cluster)
        }

        fn free_chain(&mut self, first_cluster: u32) -> Result<()> {
            self.chains.remove(&first_cluster).map(|_| ()).ok_or(FatError::Io)
        }

        fn write_chain(&mut self, first_cluster: u32, bytes: &[u8]) -> Result<()> {
            self.chains.insert(first_cluster, bytes.to_vec());
            Ok(())
        }
    }

    fn region_fs() -> FileSystem<MemoryDevice, TestFat> {
        let device = MemoryDevice::new(16 * ENTRY_SIZE);
        FileSystem::mount(
            device,
            TestFat::new(),
            FatType::Fat16,
            RootLocation::Region { offset: 0, slots: 16 },
        )
        .unwrap()
    }

    #[test]
    fn mount_insert_flush_remount() {
        let mut fs = region_fs();
        fs.root_mut().insert("hello world.txt", Attributes::ARCHIVE).unwrap();
        assert!(fs.needs_flush());
        fs.flush_root().unwrap();

        let (device, fat) = fs.into_parts();
        let fs = FileSystem::mount(
            device,
            fat,
            FatType::Fat16,
            RootLocation::Region { offset: 0, slots: 16 },
        )
        .unwrap();
        let root = fs.root();
        let index = root.find("hello world.txt").unwrap();
        assert_eq!(root.entry(index).unwrap().long_name(), Some("hello world.txt"));
    }

    #[test]
    fn open_directory_resolves_chain() {
        let mut child =
            DirectoryTable::new_subdirectory(FatType::Fat32, 16, 5, 0).unwrap();
        child.insert("inner.txt", Attributes::ARCHIVE).unwrap();
        let child_bytes = child.serialize().unwrap();

        let mut root = DirectoryTable::new(FatType::Fat32, true, 16);
        let dir_index = root.insert("Sub Directory", Attributes::DIRECTORY).unwrap();
        {
            let mut entry = root.entry_mut(dir_index).unwrap();
            entry.set_start_cluster(5).unwrap();
        }
        let root_bytes = root.serialize().unwrap();

        let fat = TestFat::new()
            .with_chain(2, root_bytes)
            .with_chain(5, child_bytes);
        let fs = FileSystem::mount(
            MemoryDevice::new(512),
            fat,
            FatType::Fat32,
            RootLocation::Cluster(2),
        )
        .unwrap();

        let index = fs.root().find("sub directory").unwrap();
        let table = fs.open_directory(fs.root(), index).unwrap();
        assert!(table.find("inner.txt").is_some());
    }

    #[test]
    fn entry_handle_reads_and_mutates_through_the_table() {
        let mut fs = region_fs();
        let index = fs.root_mut().insert("Budget 2024.xls", Attributes::ARCHIVE).unwrap();
        fs.flush_root().unwrap();
        fs.clear_flush_signal();

        let mut handle = fs.root_entry(index).unwrap();
        assert_eq!(handle.long_name(), Some("Budget 2024.xls"));
        assert_eq!(handle.short_name().to_string(), "BUDGET~1.XLS");
        assert!(handle.is_file());

        handle.set_start_cluster(9).unwrap();
        handle.set_length(640);
        assert_eq!(handle.start_cluster(), 9);
        assert_eq!(handle.length(), 640);
        assert!(handle.is_dirty());
        drop(handle);

        // Handle mutations propagate dirtiness like any table mutation.
        assert!(fs.root().is_dirty());
        assert!(fs.needs_flush());
    }

    #[test]
    fn set_long_name_preserves_metadata_and_tracks_the_entry() {
        let mut fs = region_fs();
        let index = fs.root_mut().insert("draft.txt", Attributes::ARCHIVE).unwrap();
        {
            let mut handle = fs.root_entry(index).unwrap();
            handle.set_start_cluster(33).unwrap();
            handle.set_length(100);
            handle.set_created(DosDate::new(2020, 7, 1), DosTime::new(12, 0, 0));

            handle.set_long_name("final.txt").unwrap();
            assert_eq!(handle.long_name(), Some("final.txt"));
            assert_eq!(handle.start_cluster(), 33);
            assert_eq!(handle.length(), 100);
            assert_eq!(handle.created().0, DosDate::new(2020, 7, 1));
        }
        assert!(fs.root().find("final.txt").is_some());
        assert!(fs.root().find("draft.txt").is_none());
    }

    #[test]
    fn iter_if_directory_descends_and_hands_out_child_handles() {
        let mut child =
            DirectoryTable::new_subdirectory(FatType::Fat32, 16, 5, 0).unwrap();
        child.insert("inner.txt", Attributes::ARCHIVE).unwrap();
        let child_bytes = child.serialize().unwrap();

        let mut root = DirectoryTable::new(FatType::Fat32, true, 16);
        let dir_index = root.insert("Sub Directory", Attributes::DIRECTORY).unwrap();
        root.entry_mut(dir_index).unwrap().set_start_cluster(5).unwrap();
        let file_index = root.insert("plain.txt", Attributes::ARCHIVE).unwrap();
        let root_bytes = root.serialize().unwrap();

        let fat = TestFat::new()
            .with_chain(2, root_bytes)
            .with_chain(5, child_bytes);
        let mut fs = FileSystem::mount(
            MemoryDevice::new(512),
            fat,
            FatType::Fat32,
            RootLocation::Cluster(2),
        )
        .unwrap();

        let mut table = {
            let handle = fs.root_entry(dir_index).unwrap();
            assert!(handle.is_directory());
            handle.iter_if_directory().unwrap()
        };
        let inner_index = table.find("inner.txt").unwrap();
        let inner = fs.entry(&mut table, inner_index).unwrap();
        assert_eq!(inner.name(), "inner.txt");
        assert!(inner.is_file());

        let file_handle = fs.root_entry(file_index).unwrap();
        assert_eq!(
            file_handle.iter_if_directory().err(),
            Some(FatError::NotADirectory)
        );
    }

    #[test]
    fn open_file_as_directory_fails() {
        let mut fs = region_fs();
        let index = fs.root_mut().insert("plain.txt", Attributes::ARCHIVE).unwrap();
        let root = fs.root().clone();
        assert_eq!(
            fs.open_directory(&root, index).err(),
            Some(FatError::NotADirectory)
        );
    }

    #[test]
    fn read_only_device_refuses_flush() {
        let mut root = DirectoryTable::new(FatType::Fat16, true, 8);
        root.insert("A.TXT", Attributes::ARCHIVE).unwrap();
        let bytes = root.serialize().unwrap();

        let mut image = vec![0u8; 8 * ENTRY_SIZE];
        image[..bytes.len()].copy_from_slice(&bytes);
        let device = MemoryDevice::from_bytes(image).read_only();
        let mut fs = FileSystem::mount(
            device,
            TestFat::new(),
            FatType::Fat16,
            RootLocation::Region { offset: 0, slots: 8 },
        )
        .unwrap();

        fs.root_mut().remove(0).unwrap();
        assert_eq!(fs.flush_root(), Err(FatError::ReadOnly));
    }

    #[test]
    fn flush_skips_clean_tables() {
        let mut fs = region_fs();
        assert!(!fs.needs_flush());
        fs.flush_root().unwrap();

        fs.root_mut().insert("X.TXT", Attributes::ARCHIVE).unwrap();
        fs.flush_root().unwrap();
        assert!(!fs.root().is_dirty());
        fs.clear_flush_signal();
        assert!(!fs.needs_flush());
    }
}
