//! An in-memory [`FlashDriver`] that models real NOR semantics: programming
//! can only clear bits, never set them, and only `erase_page` restores a
//! page to all-ones. Used by this crate's test suite and by `fee-cli`;
//! grounded on the pack's own fake-flash test doubles (e.g.
//! `google-tock-on-titan`'s `FakeFlash`), generalized to an arbitrary
//! byte-addressed region instead of two fixed counter pages.

use std::vec;
use std::vec::Vec;

use byteorder::{ByteOrder, LittleEndian};

use crate::driver::{FlashDriver, FlashStatus};

pub struct SimFlash {
    bytes: Vec<u8>,
    page_size: usize,
    locked: bool,
    fail_next_program: bool,
    fail_next_erase: bool,
}

impl SimFlash {
    /// Creates a `len`-byte region, fully erased (all `0xFF`).
    pub fn new(len: usize) -> Self {
        SimFlash {
            bytes: vec![0xFFu8; len],
            page_size: 0,
            locked: true,
            fail_next_program: false,
            fail_next_erase: false,
        }
    }

    /// Enables page-bounds checking in `erase_page`; optional, since most
    /// tests erase the whole region through the engine's own
    /// `page_count`/`page_size` bookkeeping instead.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Raw byte snapshot, for asserting on the persistent image directly
    /// in tests (e.g. pinning the S1/S3 scenarios from the spec).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn fail_next_program(&mut self) {
        self.fail_next_program = true;
    }

    pub fn fail_next_erase(&mut self) {
        self.fail_next_erase = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl FlashDriver for SimFlash {
    fn unlock(&mut self) {
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn erase_page(&mut self, addr: usize) -> FlashStatus {
        assert!(!self.locked, "erase_page called while locked");
        if self.fail_next_erase {
            self.fail_next_erase = false;
            return FlashStatus::Other(1);
        }
        let size = if self.page_size == 0 {
            self.bytes.len()
        } else {
            self.page_size
        };
        let end = core::cmp::min(addr + size, self.bytes.len());
        for b in &mut self.bytes[addr..end] {
            *b = 0xFF;
        }
        FlashStatus::Complete
    }

    fn program_half_word(&mut self, addr: usize, value: u16) -> FlashStatus {
        assert!(!self.locked, "program_half_word called while locked");
        assert!(addr % 2 == 0, "unaligned program_half_word at {:#x}", addr);
        if self.fail_next_program {
            self.fail_next_program = false;
            return FlashStatus::Other(2);
        }
        let existing = self.read_half_word(addr);
        assert_eq!(
            existing & value,
            value,
            "NOR violation: program_half_word({:#x}, {:#06x}) would set a cleared bit (existing {:#06x})",
            addr,
            value,
            existing
        );
        LittleEndian::write_u16(&mut self.bytes[addr..addr + 2], value);
        FlashStatus::Complete
    }

    fn read_half_word(&self, addr: usize) -> u16 {
        LittleEndian::read_u16(&self.bytes[addr..addr + 2])
    }
}
