pub mod catalog;
pub mod config;
pub mod console;
pub mod importer;
pub mod product;
pub mod reference;
#[cfg(test)]
mod test;

use crate::console::{init, run, Cli};
use clap::Parser;
use log::error;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init(cli.verbose) {
        eprintln!("{}", e);
    }
    match run(cli) {
        Ok(_) => (),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
