//! Human-readable hex dump of the RAM Image, for debugging only. Not on
//! the read/write hot path, gated behind the `dump` feature the way
//! `rustBoot` gates its board-specific diagnostics behind feature flags.

use core::fmt::{self, Write};

use crate::driver::{FlashDriver, Watchdog};
use crate::engine::Eeprom;

const ROW_BYTES: usize = 16;

impl<F: FlashDriver, W: Watchdog, const WORDS: usize> Eeprom<F, W, WORDS> {
    /// Writes a 16-bytes-per-row hex dump of the RAM image to `sink`.
    /// Consecutive all-zero rows collapse into a single `*` line; the
    /// final row is always printed even if it's all zero.
    pub fn dump(&self, sink: &mut dyn Write) -> fmt::Result {
        let density = self.density();
        let mut row = [0u8; ROW_BYTES];
        let mut addr = 0usize;
        let mut skipped = false;
        let mut first = true;

        while addr < density {
            let row_len = core::cmp::min(ROW_BYTES, density - addr);
            for (i, slot) in row.iter_mut().enumerate().take(row_len) {
                *slot = self.read_byte(addr + i);
            }
            let is_last_row = addr + ROW_BYTES >= density;
            let all_zero = row[..row_len].iter().all(|&b| b == 0);

            if all_zero && !is_last_row {
                if !skipped {
                    writeln!(sink, "*")?;
                    skipped = true;
                }
            } else {
                skipped = false;
                if !first {
                    // no separator needed; rows are newline-terminated.
                }
                write!(sink, "{:08x}:", addr)?;
                for b in &row[..row_len] {
                    write!(sink, " {:02x}", b)?;
                }
                writeln!(sink)?;
            }
            first = false;
            addr += ROW_BYTES;
        }
        Ok(())
    }
}
