use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "mailman", version, about = "Mailing dispatch service")]
pub struct Cli {
    /// Comma-separated list of JSON configuration files, applied in order.
    #[arg(long = "config-file", value_delimiter = ',')]
    pub config_files: Vec<PathBuf>,

    /// Default log level; `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
