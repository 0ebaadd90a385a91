mod catalog;
mod data;
mod displace;
mod flowline;
mod interp;
mod options;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use options::{Cli, Command};
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::init();
    match &cli.cmd {
        Command::Regions => catalog::regions(cli.format),
        Command::Years(years) => years.run(&cli),
        Command::Vars(vars) => vars.run(&cli),
        Command::Data(data) => data.run(&cli),
        Command::Interp(interp) => interp.run(&cli),
        Command::Flowline(flowline) => flowline.run(&cli),
        Command::Displace(displace) => displace.run(&cli),
    }
}
