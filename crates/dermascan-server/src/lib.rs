//! Dermascan API server
//!
//! Accepts skin-lesion image uploads, classifies them with a remotely
//! stored model that is fetched and cached on first use, and serves the
//! accumulated prediction history.

use clap::Parser;
use std::path::PathBuf;

pub mod config;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "dermascan-server")]
#[command(about = "Dermascan lesion classification API", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Bucket holding the model artifact
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Object prefix of the model artifact within the bucket
    #[arg(long)]
    pub prefix: Option<String>,

    /// Directory for the prediction history file
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
