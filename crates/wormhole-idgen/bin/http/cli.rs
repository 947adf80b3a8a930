use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use wormhole_telemetry::LogFormat;

pub const LISTEN_ADDR_ENV: &str = "WORMHOLE_IDGEN_LISTEN_ADDR";
pub const NODE_ID_ENV: &str = "WORMHOLE_IDGEN_NODE_ID";
pub const MAX_CLOCK_WAIT_MS_ENV: &str = "WORMHOLE_IDGEN_MAX_CLOCK_WAIT_MS";
pub const LOG_FORMAT_ENV: &str = "WORMHOLE_LOG_FORMAT";
pub const LOG_LEVEL_ENV: &str = "WORMHOLE_LOG_LEVEL";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8081";
pub const DEFAULT_NODE_ID: u16 = 1;
pub const DEFAULT_MAX_CLOCK_WAIT_MS: u64 = 1000;

#[derive(Debug, Parser)]
#[command(name = "wormhole-id-service")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Node id embedded in every identifier, 0..=1023.
    #[arg(long, env = NODE_ID_ENV, default_value_t = DEFAULT_NODE_ID)]
    pub node_id: u16,

    /// Upper bound on waiting for the clock to catch up; 0 waits forever.
    #[arg(long, env = MAX_CLOCK_WAIT_MS_ENV, default_value_t = DEFAULT_MAX_CLOCK_WAIT_MS)]
    pub max_clock_wait_ms: u64,

    /// `json` or `text`.
    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    #[arg(long, env = LOG_LEVEL_ENV, default_value_t = LevelFilter::INFO)]
    pub log_level: LevelFilter,
}

impl CLI {
    pub fn max_clock_wait(&self) -> Option<Duration> {
        match self.max_clock_wait_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
