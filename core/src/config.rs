use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite path or `file:` URI. `:memory:` selects a single-connection
    /// in-memory database.
    pub url: String,
    /// Upper bound on open connections.
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "holders.db".to_string(),
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_per_page: i64,
    pub min_per_page: i64,
    pub max_per_page: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            min_per_page: 5,
            max_per_page: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatsConfig {
    /// Rows kept per company / policy type / city distribution.
    pub top_n: i64,
    pub top_companies: i64,
    pub expiring_soon_limit: i64,
    pub recent_limit: i64,
    pub expiring_window_days: i64,
    pub expiring_late_window_days: i64,
    pub new_policy_window_days: i64,
    pub recent_activity_days: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            top_companies: 5,
            expiring_soon_limit: 10,
            recent_limit: 8,
            expiring_window_days: 30,
            expiring_late_window_days: 90,
            new_policy_window_days: 30,
            recent_activity_days: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
    pub stats: StatsConfig,
}

impl AppConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DATABASE_URL` and `BIND_ADDR` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(addr) = std::env::var("BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.server.bind_addr = addr;
            }
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.pagination;
        if p.min_per_page < 1 || p.min_per_page > p.max_per_page {
            anyhow::bail!(
                "pagination bounds invalid: min={} max={}",
                p.min_per_page,
                p.max_per_page
            );
        }
        if p.default_per_page < p.min_per_page || p.default_per_page > p.max_per_page {
            anyhow::bail!(
                "default_per_page {} outside [{}, {}]",
                p.default_per_page,
                p.min_per_page,
                p.max_per_page
            );
        }
        let s = &self.stats;
        if s.expiring_window_days < 0 || s.expiring_late_window_days <= s.expiring_window_days {
            anyhow::bail!("expiring windows must satisfy 0 <= early < late");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be at least 1");
        }
        Ok(())
    }

    /// Defaults with an in-memory database, for tests.
    pub fn default_test() -> Self {
        Self {
            database: DatabaseConfig {
                url: ":memory:".to_string(),
                pool_size: 4,
            },
            ..Self::default()
        }
    }
}
