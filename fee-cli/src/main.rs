//! A hosted command-line front end for the `fee` crate, for manual
//! inspection of a persistent region without flashing real hardware.
//! Plays the role the teacher's `rbsigner` played for firmware images: a
//! small file-backed tool built on the same library the embedded target
//! uses, driven from `cargo xtask`.

mod file_flash;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use fee::{Eeprom, Layout, NoopWatchdog};

use file_flash::FileFlash;

// A stand-in board layout: 1 KiB of logical store over two 4 KiB pages.
// Real firmware would size these from its own board configuration the way
// `rustBoot/src/constants.rs` does; `fee-cli` just needs one fixed layout
// to exercise the library end to end.
const PAGE_SIZE: usize = 4096;
const PAGE_COUNT: usize = 2;
const DENSITY_BYTES: usize = 1024;
const WORDS: usize = DENSITY_BYTES / 2;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = env::args().collect::<Vec<_>>();
    let args = args.iter().map(|s| &**s).collect::<Vec<_>>();

    match &args[1..] {
        [path, "dump"] => cmd_dump(path),
        [path, "read-byte", addr] => cmd_read_byte(path, parse_addr(addr)?),
        [path, "read-word", addr] => cmd_read_word(path, parse_addr(addr)?),
        [path, "write-byte", addr, value] => {
            cmd_write_byte(path, parse_addr(addr)?, parse_u8(value)?)
        }
        [path, "write-word", addr, value] => {
            cmd_write_word(path, parse_addr(addr)?, parse_u16(value)?)
        }
        [path, "erase"] => cmd_erase(path),
        _ => {
            println!("USAGE: fee-cli <path> dump");
            println!("       fee-cli <path> read-byte <addr>");
            println!("       fee-cli <path> read-word <addr>");
            println!("       fee-cli <path> write-byte <addr> <value>");
            println!("       fee-cli <path> write-word <addr> <value>");
            println!("       fee-cli <path> erase");
            Ok(())
        }
    }
}

fn parse_addr(s: &str) -> anyhow::Result<usize> {
    parse_int(s).context("invalid address")
}

fn parse_u8(s: &str) -> anyhow::Result<u8> {
    Ok(parse_int(s).context("invalid byte value")? as u8)
}

fn parse_u16(s: &str) -> anyhow::Result<u16> {
    Ok(parse_int(s).context("invalid half-word value")? as u16)
}

fn parse_int(s: &str) -> anyhow::Result<usize> {
    if let Some(hex) = s.strip_prefix("0x") {
        Ok(usize::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse()?)
    }
}

fn open_store(path: &str) -> anyhow::Result<(Eeprom<FileFlash, NoopWatchdog, WORDS>, usize)> {
    let layout = Layout::new(0, PAGE_SIZE, PAGE_COUNT, DENSITY_BYTES)
        .map_err(|e| anyhow::anyhow!("bad layout: {}", e))?;
    let flash = FileFlash::open(&PathBuf::from(path), layout.region_end(), PAGE_SIZE)?;
    let (eeprom, density) =
        Eeprom::<FileFlash, NoopWatchdog, WORDS>::init(layout, flash, NoopWatchdog)
            .map_err(|e| anyhow::anyhow!("init failed: {}", e))?;
    Ok((eeprom, density))
}

fn cmd_dump(path: &str) -> anyhow::Result<()> {
    let (eeprom, _) = open_store(path)?;
    let mut out = String::new();
    eeprom
        .dump(&mut out)
        .map_err(|_| anyhow::anyhow!("formatting failed"))?;
    print!("{}", out);
    Ok(())
}

fn cmd_read_byte(path: &str, addr: usize) -> anyhow::Result<()> {
    let (eeprom, density) = open_store(path)?;
    if addr >= density {
        bail!("address {:#x} is out of range (density {:#x})", addr, density);
    }
    println!("{:#04x}", eeprom.read_byte(addr));
    Ok(())
}

fn cmd_read_word(path: &str, addr: usize) -> anyhow::Result<()> {
    let (eeprom, density) = open_store(path)?;
    if addr + 1 >= density {
        bail!("address {:#x} is out of range (density {:#x})", addr, density);
    }
    println!("{:#06x}", eeprom.read_word(addr));
    Ok(())
}

fn cmd_write_byte(path: &str, addr: usize, value: u8) -> anyhow::Result<()> {
    let (mut eeprom, _) = open_store(path)?;
    let outcome = eeprom
        .write_byte(addr, value)
        .map_err(|e| anyhow::anyhow!("write failed: {}", e))?;
    println!("{:?}", outcome);
    Ok(())
}

fn cmd_write_word(path: &str, addr: usize, value: u16) -> anyhow::Result<()> {
    let (mut eeprom, _) = open_store(path)?;
    let outcome = eeprom
        .write_word(addr, value)
        .map_err(|e| anyhow::anyhow!("write failed: {}", e))?;
    println!("{:?}", outcome);
    Ok(())
}

fn cmd_erase(path: &str) -> anyhow::Result<()> {
    let (mut eeprom, _) = open_store(path)?;
    let density = eeprom
        .erase()
        .map_err(|e| anyhow::anyhow!("erase failed: {}", e))?;
    println!("erased, density={:#x}", density);
    Ok(())
}
