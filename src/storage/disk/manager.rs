use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::common::{PageId, PAGE_SIZE};
use crate::errors::StorageError;

/// Page-granular I/O on the single database file.
///
/// No caching and no locking here: the disk scheduler's worker thread is the
/// only caller once the system is wired up.
pub struct DiskManager {
    db_io: File,
    db_file_path: PathBuf,
}

impl DiskManager {
    /// Open the database file in read/write mode, creating it empty if it
    /// does not exist yet.
    pub fn open<P: AsRef<Path>>(db_file: P) -> Result<Self, StorageError> {
        let db_file = db_file.as_ref();

        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_file)?;

        log::debug!("opened database file {}", db_file.display());

        Ok(DiskManager {
            db_io,
            db_file_path: db_file.to_path_buf(),
        })
    }

    /// Number of whole pages currently in the file.
    pub fn num_pages(&self) -> Result<usize, StorageError> {
        let file_size = self.db_io.metadata()?.len();
        Ok(file_size as usize / PAGE_SIZE)
    }

    /// Read page `page_id` into `page_data`. A page that was never written
    /// lies past the end of the file and fails.
    pub fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> Result<(), StorageError> {
        debug_assert!(page_id >= 0);
        debug_assert_eq!(page_data.len(), PAGE_SIZE);

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let file_size = self.db_io.metadata()?.len();
        if offset >= file_size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of page {} past the end of {}",
                    page_id,
                    self.db_file_path.display()
                ),
            )));
        }

        self.db_io.seek(SeekFrom::Start(offset))?;
        self.db_io.read_exact(page_data)?;
        Ok(())
    }

    /// Write page `page_id`, growing the file if the offset lies past the
    /// current end, and flush to the OS.
    pub fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> Result<(), StorageError> {
        debug_assert!(page_id >= 0);
        debug_assert_eq!(page_data.len(), PAGE_SIZE);

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.db_io.seek(SeekFrom::Start(offset))?;
        self.db_io.write_all(page_data)?;
        self.db_io.flush()?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use tempfile::tempdir;

    use super::DiskManager;
    use crate::common::PAGE_SIZE;

    #[test]
    fn db_io_test() {
        let dir = tempdir().unwrap();
        let mut manager = DiskManager::open(dir.path().join("test.db")).unwrap();

        assert_eq!(manager.num_pages().unwrap(), 0);

        let data = [7u8; PAGE_SIZE];
        manager.write_page(0, &data).unwrap();
        assert_eq!(manager.num_pages().unwrap(), 1);

        let mut page_buffer = [0u8; PAGE_SIZE];
        manager
            .read_page(0, &mut page_buffer)
            .expect("Failed to read page");

        assert_eq!(data, page_buffer, "Page read mismatch!");
    }

    #[test]
    fn read_past_eof_fails() {
        let dir = tempdir().unwrap();
        let mut manager = DiskManager::open(dir.path().join("test.db")).unwrap();

        let mut page_buffer = [0u8; PAGE_SIZE];
        assert!(manager.read_page(3, &mut page_buffer).is_err());

        // The file grows when a later page is written, after which the read
        // succeeds.
        manager.write_page(3, &[1u8; PAGE_SIZE]).unwrap();
        assert_eq!(manager.num_pages().unwrap(), 4);
        assert!(manager.read_page(3, &mut page_buffer).is_ok());
    }
}
