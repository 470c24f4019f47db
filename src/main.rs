use std::{env, path::PathBuf};

use anyhow::{Result, bail};
use log::info;

use trampgen::{Catalog, Convention, write_artifacts};

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let out_dir = parse_args()?;

    let catalog = Catalog::builtin();
    let convention = Convention::wag_x86_64();
    info!("generating trampolines for {} syscalls", catalog.len());

    write_artifacts(&out_dir, &catalog, &convention)
}

fn parse_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => bail!("expected an output directory (usage: trampgen <out-dir>)"),
    }
}
