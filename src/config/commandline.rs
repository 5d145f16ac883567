use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use super::primitives::LogFormat;

/// Run the vid-rs video hosting service
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub(super) struct Args {
    /// Path to the vid-rs configuration file
    #[arg(short, long)]
    pub(super) config_file: Option<PathBuf>,

    /// Address and port to bind the server
    #[arg(short, long)]
    pub(super) address: Option<SocketAddr>,

    /// Format of console logs
    #[arg(long)]
    pub(super) log_format: Option<LogFormat>,
}
