#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![allow(clippy::needless_range_loop)]

//! Byte-addressable EEPROM emulation on top of word-programmable NOR
//! flash. Small mutations are encoded into a compacting write log so
//! flash endurance is extended across many updates; the log is replayed
//! into a RAM image on boot and folded back into a dense snapshot when it
//! fills. See `DESIGN.md` for the grounding of each module.
//!
//! This crate only ever talks to hardware through the [`driver::FlashDriver`]
//! and [`driver::Watchdog`] traits - it owns no global state and makes no
//! assumption about the target beyond "NOR-style program/erase flash".

pub mod api;
pub mod codec;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod image;

#[cfg(feature = "dump")]
pub mod dump;

#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use config::Layout;
pub use driver::{FlashDriver, FlashStatus, NoopWatchdog, Watchdog};
pub use engine::{Eeprom, WriteOutcome};
pub use error::{FeeError, Result};
