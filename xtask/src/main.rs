#![allow(dead_code)]
#![deny(unused_must_use)]

use std::{env, path::PathBuf};

use xshell::cmd;

#[rustfmt::skip]
fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let args = args.iter().map(|s| &**s).collect::<Vec<_>>();

    match &args[..] {
        ["test"]          => test_all(),
        ["test", "std"]   => test_std(),
        ["check"]         => check(),
        ["fmt"]           => fmt(),
        _ => {
            println!("USAGE: cargo xtask test        # run the no_std-and-std test matrix");
            println!("OR");
            println!("USAGE: cargo xtask test std    # run with --features std only");
            println!("OR");
            println!("USAGE: cargo xtask check       # cargo check across the workspace");
            println!("OR");
            println!("USAGE: cargo xtask fmt         # cargo fmt --check");
            Ok(())
        }
    }
}

fn test_all() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir())?;
    cmd!("cargo test --workspace --all-features").run()?;
    Ok(())
}

fn test_std() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir().join("fee"))?;
    cmd!("cargo test --features std").run()?;
    Ok(())
}

fn check() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir())?;
    cmd!("cargo check --workspace --all-features").run()?;
    Ok(())
}

fn fmt() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir())?;
    cmd!("cargo fmt --all -- --check").run()?;
    Ok(())
}

fn root_dir() -> PathBuf {
    let mut xtask_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    xtask_dir.pop();
    xtask_dir
}
