use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "htsget-slice")]
#[command(about = "htsget ticket server for indexed BAM, VCF and BCF files")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HTSGET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "HTSGET_PORT", default_value = "8080")]
    pub port: u16,

    /// Base URL for ticket URLs (e.g., https://example.com)
    #[arg(long, env = "HTSGET_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory containing data files
    #[arg(long, env = "HTSGET_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Enable CORS for all origins
    #[arg(long, env = "HTSGET_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Maximum payload size in bytes
    #[arg(long, env = "HTSGET_MAX_PAYLOAD", default_value = "10485760")]
    pub max_payload: usize,

    /// Number of parsed indexes kept in memory
    #[arg(long, env = "HTSGET_INDEX_CACHE_CAPACITY", default_value = "128")]
    pub index_cache_capacity: u64,

    /// Seconds a failed index load is remembered before retrying
    #[arg(long, env = "HTSGET_INDEX_FAILURE_TTL", default_value = "30")]
    pub index_failure_ttl: u64,

    /// Body ranges separated by at most this many bytes are merged
    #[arg(long, env = "HTSGET_MERGE_GAP", default_value = "0")]
    pub merge_gap: u64,

    /// Largest byte range a single ticket URL covers; longer body ranges are split
    #[arg(
        long,
        env = "HTSGET_BLOCK_SIZE",
        default_value = "1073741824",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub block_size: u64,

    /// Sign data URLs and require signatures on /data/
    #[arg(long, env = "HTSGET_SIGN_URLS", default_value = "false")]
    pub sign_urls: bool,

    /// HMAC secret for signed URLs. If unset, a per-process key is derived
    /// from the std hasher's random state, which is not a CSPRNG; set this in
    /// production.
    #[arg(long, env = "HTSGET_URL_SIGNING_SECRET")]
    pub url_signing_secret: Option<String>,

    /// Lifetime of signed URLs in seconds
    #[arg(long, env = "HTSGET_URL_EXPIRY", default_value = "3600")]
    pub url_expiry: u64,

    /// Bearer tokens accepted on ticket endpoints (comma separated)
    #[arg(long = "auth-token", env = "HTSGET_AUTH_TOKENS", value_delimiter = ',')]
    pub auth_tokens: Vec<String>,
}

impl Config {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    pub fn index_failure_ttl(&self) -> Duration {
        Duration::from_secs(self.index_failure_ttl)
    }

    pub fn url_lifetime(&self) -> Duration {
        Duration::from_secs(self.url_expiry)
    }
}
