use std::net::SocketAddr;

use clap::Parser;

/// In-memory key-value server speaking RESP.
#[derive(Parser, Debug, Clone)]
#[command(name = "ember-server", version, about)]
pub struct Config {
    /// Address the listener binds to.
    #[arg(long, default_value = "127.0.0.1:6379")]
    pub bind: SocketAddr,

    /// Upper bound on one readiness wait, in milliseconds. Also the cadence
    /// of active expiration passes.
    #[arg(long, default_value_t = 100)]
    pub loop_timeout_ms: u64,

    /// Keys sampled per active expiration pass.
    #[arg(long, default_value_t = 20)]
    pub ttl_sample_size: usize,

    /// Max elements held by one quicklist node.
    #[arg(long, default_value_t = 128)]
    pub quicklist_node_cap: usize,

    /// Per-connection outbound buffer limit; a connection whose buffer grows
    /// past this is closed.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pub max_outbound_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 6379)),
            loop_timeout_ms: 100,
            ttl_sample_size: 20,
            quicklist_node_cap: 128,
            max_outbound_bytes: 64 * 1024 * 1024,
        }
    }
}
