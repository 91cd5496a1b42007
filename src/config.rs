use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

/// Server settings, read from the command line with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 18080)]
    pub port: u16,

    /// Reported by /health
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Route cache size above which writes sweep expired entries
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 1000)]
    pub cache_capacity: u64,

    /// Requests allowed per client per window on /api
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 100)]
    pub rate_limit_max: u32,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "BODY_LIMIT_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub body_limit_bytes: usize,

    /// Allowed CORS origin; repeatable. Any origin when unset.
    #[arg(long = "cors-origin", env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 9] = [
        "HOST",
        "PORT",
        "APP_ENV",
        "CACHE_TTL_SECS",
        "CACHE_CAPACITY",
        "RATE_LIMIT_MAX",
        "RATE_LIMIT_WINDOW_SECS",
        "BODY_LIMIT_BYTES",
        "CORS_ORIGINS",
    ];

    #[test]
    fn test_defaults() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
        let config = Config::parse_from(["transit-planner"]);
        assert_eq!(config.socket_addr(), "0.0.0.0:18080".parse().unwrap());
        assert_eq!(config.environment, "development");
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(900));
        assert_eq!(config.body_limit_bytes, 10 * 1024 * 1024);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::parse_from([
            "transit-planner",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--cors-origin",
            "http://localhost:3000",
            "--cors-origin",
            "https://example.tw",
        ]);
        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.cors_origins.len(), 2);
    }
}
