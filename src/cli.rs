use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "immich-sync", about = "Sync an Immich album to a local directory")]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short = 'c', long, default_value = "immich-sync.toml")]
    pub config: String,

    /// Immich server URL, e.g. https://immich.example.com
    #[arg(long, env = "IMMICH_URL")]
    pub url: Option<String>,

    /// Immich API key.
    /// WARNING: passing via --api-key is visible in process listings.
    /// Prefer the IMMICH_API_KEY environment variable or the config file.
    #[arg(long, env = "IMMICH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Local directory the album is mirrored into
    #[arg(short = 'd', long)]
    pub photodir: Option<String>,

    /// Name of the album to sync
    #[arg(short = 'a', long)]
    pub album: Option<String>,

    /// Extract embedded JPEG previews from raw files after download
    #[arg(long)]
    pub raw: bool,

    /// Do not extract previews, even if the config file enables them
    #[arg(long, conflicts_with = "raw")]
    pub no_raw: bool,

    /// Maximum concurrent requests to the server
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Tries per remote call before the sync gives up
    #[arg(long)]
    pub retries: Option<u32>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress_bar: bool,
}

impl Cli {
    /// The `--raw`/`--no-raw` pair collapses to a tri-state: forced on,
    /// forced off, or `None` to defer to the config file.
    pub fn raw_override(&self) -> Option<bool> {
        if self.raw {
            Some(true)
        } else if self.no_raw {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}
