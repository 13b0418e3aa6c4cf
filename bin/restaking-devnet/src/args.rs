//! Parses command-line arguments for the devnet.

use std::path::PathBuf;

use clap::{crate_version, Parser};

#[derive(Debug, Parser)]
#[clap(
    name = "restaking-devnet",
    about = "Runs a local restaking network against a random workload",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'p',
        help = "The file containing the network params",
        default_value = "params.toml"
    )]
    pub params: PathBuf,

    #[clap(
        long,
        short = 'c',
        help = "The file containing the devnet configuration",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[clap(long, help = "Overrides the number of blocks to run")]
    pub blocks: Option<u64>,
}
