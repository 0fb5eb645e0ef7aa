//! The Persistence Engine: initial replay, direct writes into the
//! snapshot region, log appends, and compaction. This is the bulk of the
//! crate - everything else just names a collaborator or carries bytes
//! around.

use crate::codec::{self, EncodedEntry, Primary};
use crate::config::{Layout, ERASED_HALF_WORD, FEE_BYTE_RANGE, MAGIC_HI, MAGIC_LO};
use crate::driver::{FlashDriver, FlashStatus, Watchdog};
use crate::error::{FeeError, Result};
use crate::image::RamImage;

#[cfg(feature = "log")]
use log::{debug, trace};

/// How the persistence engine satisfied a write, cheapest first. Replaces
/// the numeric-status-or-zero style a C driver would return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The RAM image already held this value; nothing touched flash.
    Unchanged,
    /// The snapshot half-word was still unprogrammed; written directly,
    /// no log entry consumed.
    SnapshotAccepted,
    /// One or more log entries were appended.
    LogAppended,
    /// The log was full; a compaction ran and folded the new value into a
    /// fresh snapshot. The originating write is not retried - the
    /// snapshot it just wrote already reflects the value.
    Compacted,
}

fn combine(a: WriteOutcome, b: WriteOutcome) -> WriteOutcome {
    fn rank(o: WriteOutcome) -> u8 {
        match o {
            WriteOutcome::Unchanged => 0,
            WriteOutcome::SnapshotAccepted => 1,
            WriteOutcome::LogAppended => 2,
            WriteOutcome::Compacted => 3,
        }
    }
    if rank(b) >= rank(a) {
        b
    } else {
        a
    }
}

/// Kick the watchdog every `INTERVAL` iterations of a long loop rather
/// than every single one.
const WATCHDOG_INTERVAL: usize = 32;

/// A flash-backed EEPROM emulation instance. `WORDS` is the logical store
/// size in half-words (`density_bytes = WORDS * 2`); it's a const generic
/// so the RAM image is a plain array, no allocator required.
pub struct Eeprom<F: FlashDriver, W: Watchdog, const WORDS: usize> {
    layout: Layout,
    flash: F,
    watchdog: W,
    image: RamImage<WORDS>,
    empty_slot: usize,
}

impl<F: FlashDriver, W: Watchdog, const WORDS: usize> Eeprom<F, W, WORDS> {
    /// Loads the snapshot into a fresh RAM image, replays the log, and
    /// returns the ready-to-use engine along with the logical store size.
    /// If the log region's magic doesn't check out, the persistent region
    /// is wiped and reinitialized instead of replayed.
    pub fn init(layout: Layout, mut flash: F, mut watchdog: W) -> Result<(Self, usize)> {
        if layout.density_bytes != RamImage::<WORDS>::DENSITY_BYTES {
            return Err(FeeError::InvalidLayout);
        }

        let mut image = RamImage::<WORDS>::new();
        Self::load_snapshot(&layout, &flash, &mut image);

        let magic_ok = flash.read_half_word(layout.magic_addr()) == MAGIC_LO
            && flash.read_half_word(layout.magic_addr() + 2) == MAGIC_HI;

        let empty_slot = if magic_ok {
            #[cfg(feature = "log")]
            trace!("fee: magic ok, replaying log");
            Self::replay(&layout, &flash, &mut image, &mut watchdog)
        } else {
            #[cfg(feature = "log")]
            debug!("fee: magic missing, clearing persistent region");
            Self::erase_all(&layout, &mut flash, &mut watchdog)?;
            // The image already loaded from the snapshot above is kept
            // as-is - it's typically all-zero on a never-written store,
            // but whatever the snapshot region decoded to survives a
            // missing-magic recovery. Only the public `erase()` operation
            // resets the image to zero.
            layout.log_start()
        };

        let density = layout.density_bytes;
        Ok((
            Eeprom {
                layout,
                flash,
                watchdog,
                image,
                empty_slot,
            },
            density,
        ))
    }

    /// The logical store size in bytes, i.e. `DENSITY`.
    pub fn density(&self) -> usize {
        self.layout.density_bytes
    }

    fn load_snapshot(layout: &Layout, flash: &F, image: &mut RamImage<WORDS>) {
        let mut addr = 0usize;
        while addr < layout.density_bytes {
            let stored = flash.read_half_word(layout.base + addr);
            image.set_word(addr, !stored);
            addr += 2;
        }
    }

    fn replay(layout: &Layout, flash: &F, image: &mut RamImage<WORDS>, watchdog: &mut W) -> usize {
        let mut addr = layout.log_start();
        let end = layout.region_end();
        let mut iterations = 0usize;
        while addr + 2 <= end {
            iterations += 1;
            if iterations % WATCHDOG_INTERVAL == 0 {
                watchdog.kick();
            }
            let primary = flash.read_half_word(addr);
            match codec::decode_primary(primary) {
                Primary::Terminator => return addr,
                Primary::Byte { addr: a, value } => {
                    if a < layout.density_bytes {
                        image.set_byte(a, value);
                    }
                    addr += 2;
                }
                Primary::Word { addr: a, value } => {
                    if a < layout.density_bytes {
                        image.set_word(a, value);
                    }
                    addr += 2;
                }
                Primary::WordNext { addr: a } => {
                    if addr + 4 > end {
                        // Malformed tail with no room for a value word; stop here.
                        return addr;
                    }
                    let raw_value = flash.read_half_word(addr + 2);
                    if let Some(value) = codec::resolve_word_next(raw_value) {
                        if a < layout.density_bytes {
                            image.set_word(a, value);
                        }
                    }
                    addr += 4;
                }
                Primary::Reserved => addr += 2,
            }
        }
        addr
    }

    fn erase_all(layout: &Layout, flash: &mut F, watchdog: &mut W) -> Result<()> {
        flash.unlock();
        let result = (|| {
            for page in 0..layout.page_count {
                watchdog.kick();
                let addr = layout.base + page * layout.page_size;
                match flash.erase_page(addr) {
                    FlashStatus::Complete => {}
                    other => return Err(FeeError::Flash(other)),
                }
            }
            match flash.program_half_word(layout.magic_addr(), MAGIC_LO) {
                FlashStatus::Complete => {}
                other => return Err(FeeError::Flash(other)),
            }
            match flash.program_half_word(layout.magic_addr() + 2, MAGIC_HI) {
                FlashStatus::Complete => {}
                other => return Err(FeeError::Flash(other)),
            }
            Ok(())
        })();
        flash.lock();
        result
    }

    /// Wipes the persistent region and reinitializes it as an empty store.
    /// Leaves the RAM image all-zero, same as a never-written store.
    pub fn erase(&mut self) -> Result<usize> {
        Self::erase_all(&self.layout, &mut self.flash, &mut self.watchdog)?;
        self.image = RamImage::new();
        self.empty_slot = self.layout.log_start();
        Ok(self.layout.density_bytes)
    }

    pub fn read_byte(&self, addr: usize) -> u8 {
        if addr >= self.layout.density_bytes {
            0xFF
        } else {
            self.image.get_byte(addr)
        }
    }

    /// Reads a half-word at `addr`. Honours `addr`'s own alignment: an even
    /// address reads the underlying half-word directly; an odd address
    /// composes the two straddled bytes, the read-side counterpart to
    /// `write_word`'s odd-address byte split.
    pub fn read_word(&self, addr: usize) -> u16 {
        if addr + 1 >= self.layout.density_bytes {
            0xFFFF
        } else if addr & 1 == 0 {
            self.image.get_word(addr)
        } else {
            (self.image.get_byte(addr) as u16) | ((self.image.get_byte(addr + 1) as u16) << 8)
        }
    }

    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<WriteOutcome> {
        if addr >= self.layout.density_bytes {
            return Err(FeeError::BadAddress);
        }
        if self.image.get_byte(addr) == value {
            return Ok(WriteOutcome::Unchanged);
        }
        let word_addr = addr & !1;
        let old_word = self.image.get_word(word_addr);
        self.image.set_byte(addr, value);
        let new_word = self.image.get_word(word_addr);
        self.persist_word(word_addr, old_word, new_word)
    }

    /// Writes a half-word. Odd addresses are split into two independent
    /// byte writes (low byte at `addr`, high byte at `addr+1`) - this is
    /// non-atomic under power loss between the two, by design; see
    /// `DESIGN.md`.
    pub fn write_word(&mut self, addr: usize, value: u16) -> Result<WriteOutcome> {
        if addr + 1 >= self.layout.density_bytes {
            return Err(FeeError::BadAddress);
        }
        if addr & 1 != 0 {
            let lo = self.write_byte(addr, (value & 0xFF) as u8)?;
            let hi = self.write_byte(addr + 1, (value >> 8) as u8)?;
            return Ok(combine(lo, hi));
        }
        if self.image.get_word(addr) == value {
            return Ok(WriteOutcome::Unchanged);
        }
        let old_word = self.image.get_word(addr);
        self.image.set_word(addr, value);
        self.persist_word(addr, old_word, value)
    }

    pub fn update_byte(&mut self, addr: usize, value: u8) -> Result<WriteOutcome> {
        self.write_byte(addr, value)
    }

    pub fn update_word(&mut self, addr: usize, value: u16) -> Result<WriteOutcome> {
        self.write_word(addr, value)
    }

    /// Persists a half-word-sized mutation at an even `word_addr`, given
    /// its value before and after the RAM update (already applied).
    /// Implements the direct-write / log-append / compaction cascade.
    fn persist_word(&mut self, word_addr: usize, old_word: u16, new_word: u16) -> Result<WriteOutcome> {
        let snapshot_addr = self.layout.base + word_addr;
        let current_snapshot = self.flash.read_half_word(snapshot_addr);

        if current_snapshot == ERASED_HALF_WORD {
            let complement = !new_word;
            if complement == ERASED_HALF_WORD {
                // new_word == 0x0000: already represented by an untouched cell.
                return Ok(WriteOutcome::SnapshotAccepted);
            }
            self.flash.unlock();
            let status = self.flash.program_half_word(snapshot_addr, complement);
            self.flash.lock();
            return match status {
                FlashStatus::Complete => Ok(WriteOutcome::SnapshotAccepted),
                other => Err(FeeError::Flash(other)),
            };
        }

        let low_changed = (old_word & 0xFF) != (new_word & 0xFF);
        let high_changed = (old_word >> 8) != (new_word >> 8);

        if word_addr < FEE_BYTE_RANGE {
            // Both bytes of this word are individually addressable; emit
            // one Byte-Entry per changed byte. If both changed this is two
            // separate, non-atomic log entries - preserved intentionally.
            let mut outcome = WriteOutcome::Unchanged;
            if low_changed {
                outcome = combine(
                    outcome,
                    self.append_checked(codec::encode_byte(word_addr, (new_word & 0xFF) as u8))?,
                );
            }
            if high_changed {
                outcome = combine(
                    outcome,
                    self.append_checked(codec::encode_byte(word_addr + 1, (new_word >> 8) as u8))?,
                );
            }
            Ok(outcome)
        } else if new_word == 0 || new_word == 1 {
            self.append_checked(codec::encode_word01(word_addr, new_word))
        } else {
            self.append_checked(codec::encode_word_next(word_addr, new_word))
        }
    }

    fn append_checked(&mut self, entry: EncodedEntry) -> Result<WriteOutcome> {
        let needed = entry.len_half_words() * 2;
        if self.empty_slot + needed > self.layout.region_end() {
            #[cfg(feature = "log")]
            debug!("fee: log full at {:#x}, compacting", self.empty_slot);
            self.compact()?;
            return Ok(WriteOutcome::Compacted);
        }
        self.append_entry_words(entry)?;
        Ok(WriteOutcome::LogAppended)
    }

    fn append_entry_words(&mut self, entry: EncodedEntry) -> Result<()> {
        self.flash.unlock();
        let result = (|| match entry {
            EncodedEntry::Byte(word) | EncodedEntry::Word01(word) => {
                match self.flash.program_half_word(self.empty_slot, word) {
                    FlashStatus::Complete => {
                        self.empty_slot += 2;
                        Ok(())
                    }
                    other => Err(FeeError::Flash(other)),
                }
            }
            EncodedEntry::WordNext(primary, value) => {
                match self.flash.program_half_word(self.empty_slot, primary) {
                    FlashStatus::Complete => self.empty_slot += 2,
                    other => return Err(FeeError::Flash(other)),
                }
                match self.flash.program_half_word(self.empty_slot, value) {
                    FlashStatus::Complete => {
                        self.empty_slot += 2;
                        Ok(())
                    }
                    other => Err(FeeError::Flash(other)),
                }
            }
        })();
        self.flash.lock();
        result
    }

    /// Erases the whole persistent region and rebuilds a dense snapshot
    /// from the current RAM image. Destructive-then-rebuild: a power loss
    /// partway through corrupts the persistent image. The RAM image is
    /// the only recovery authority for the duration, and only while power
    /// holds - see spec note in `DESIGN.md`.
    fn compact(&mut self) -> Result<()> {
        Self::erase_all(&self.layout, &mut self.flash, &mut self.watchdog)?;
        for i in 0..WORDS {
            if i % WATCHDOG_INTERVAL == 0 {
                self.watchdog.kick();
            }
            let value = self.image.as_words()[i];
            if value == 0 {
                // An erased 0xFFFF already decodes to zero; nothing to program.
                continue;
            }
            let snapshot_addr = self.layout.base + i * 2;
            self.flash.unlock();
            let status = self.flash.program_half_word(snapshot_addr, !value);
            self.flash.lock();
            if status != FlashStatus::Complete {
                return Err(FeeError::Flash(status));
            }
        }
        self.empty_slot = self.layout.log_start();
        Ok(())
    }
}
