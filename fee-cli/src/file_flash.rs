//! A [`fee::FlashDriver`] backed by a plain file on disk, standing in for
//! a memory-mapped NOR region. Same bit-clearing assertions as
//! `fee::sim::SimFlash`, since real firmware has no softer failure mode to
//! fall back on either.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LittleEndian};

use fee::{FlashDriver, FlashStatus};

pub struct FileFlash {
    file: File,
    locked: bool,
    page_size: usize,
    region_len: usize,
}

impl FileFlash {
    /// Opens `path`, creating and blank-filling it to `region_len` bytes if
    /// it doesn't already exist. An existing file shorter than
    /// `region_len` is treated as corrupt - callers should `erase` first.
    pub fn open(path: &std::path::Path, region_len: usize, page_size: usize) -> anyhow::Result<Self> {
        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        if is_new {
            file.write_all(&vec![0xFFu8; region_len])?;
            file.flush()?;
        }
        Ok(FileFlash {
            file,
            locked: true,
            page_size,
            region_len,
        })
    }

    fn read_byte(&mut self, addr: usize) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        self.file.seek(SeekFrom::Start(addr as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl FlashDriver for FileFlash {
    fn unlock(&mut self) {
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn erase_page(&mut self, addr: usize) -> FlashStatus {
        if self.locked {
            return FlashStatus::WriteProtected;
        }
        let end = core::cmp::min(addr + self.page_size, self.region_len);
        if self.file.seek(SeekFrom::Start(addr as u64)).is_err() {
            return FlashStatus::Other(3);
        }
        if self.file.write_all(&vec![0xFFu8; end - addr]).is_err() {
            return FlashStatus::Other(3);
        }
        FlashStatus::Complete
    }

    fn program_half_word(&mut self, addr: usize, value: u16) -> FlashStatus {
        if self.locked {
            return FlashStatus::WriteProtected;
        }
        if addr % 2 != 0 {
            return FlashStatus::Misaligned;
        }
        let lo = self.read_byte(addr).unwrap_or(0xFF);
        let hi = self.read_byte(addr + 1).unwrap_or(0xFF);
        let existing = LittleEndian::read_u16(&[lo, hi]);
        if existing & value != value {
            log::warn!(
                "NOR violation at {:#x}: existing {:#06x}, wanted {:#06x}",
                addr,
                existing,
                value
            );
            return FlashStatus::Other(1);
        }
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        if self.file.seek(SeekFrom::Start(addr as u64)).is_err() {
            return FlashStatus::Other(2);
        }
        if self.file.write_all(&bytes).is_err() {
            return FlashStatus::Other(2);
        }
        FlashStatus::Complete
    }

    fn read_half_word(&self, addr: usize) -> u16 {
        let mut buf = [0u8; 2];
        let mut file = self.file.try_clone().expect("clone fd for read");
        if file.seek(SeekFrom::Start(addr as u64)).is_err() {
            return 0xFFFF;
        }
        if file.read_exact(&mut buf).is_err() {
            return 0xFFFF;
        }
        LittleEndian::read_u16(&buf)
    }
}
