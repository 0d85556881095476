use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "traffic-monitor",
    version,
    about = "Proxy for data.gov.sg checkpoint traffic cameras"
)]
pub struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long)]
    pub static_root: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub print_openapi: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "traffic-watch",
    version,
    about = "Terminal viewer that polls the traffic-monitor proxy"
)]
pub struct WatchArgs {
    #[arg(long, default_value = "http://127.0.0.1:8080/api/traffic")]
    pub endpoint: String,
    #[arg(long, default_value_t = 20)]
    pub interval_seconds: u64,
    /// Render tiles without fetching each camera image.
    #[arg(long, default_value_t = false)]
    pub no_image_probe: bool,
    /// Per-image request timeout; a stalled image shows as failed.
    #[arg(long, default_value_t = 10)]
    pub image_timeout_seconds: u64,
}
