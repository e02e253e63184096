use serde::Deserialize;

/// Global application settings loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Redis connection URL for the projection store.
    pub redis_url: String,

    /// JSON-RPC endpoint URL for the chain the BartMart contract lives on.
    pub rpc_url: String,

    /// BartMart contract address (hex, 0x-prefixed).
    pub contract_address: String,

    /// How many blocks to look back on the very first indexer run.
    pub lookback_blocks: u64,

    /// How many orders to read concurrently during a full sync sweep.
    pub sync_batch_size: usize,

    /// Seconds between incremental indexing passes in the daemon.
    pub poll_interval_secs: u64,

    /// Port for the API server.
    pub api_port: u16,
}

impl Settings {
    /// Load settings from environment variables (with optional `.env` file).
    pub fn from_env() -> eyre::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            rpc_url: std::env::var("RPC_URL")
                .unwrap_or_else(|_| "https://mainnet.base.org".into()),
            contract_address: std::env::var("CONTRACT_ADDRESS")
                .unwrap_or_else(|_| "0x03735E64c156d8C0D79a0cc5Fd979A95f67FC94C".into()),
            lookback_blocks: std::env::var("LOOKBACK_BLOCKS")
                .unwrap_or_else(|_| "1000".into())
                .parse()?,
            sync_batch_size: std::env::var("SYNC_BATCH_SIZE")
                .unwrap_or_else(|_| "50".into())
                .parse()?,
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "12".into())
                .parse()?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
        })
    }
}
