use energy_core::tariff::PricingConfig;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_threshold_pct")]
    pub default_threshold_pct: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            default_threshold_pct: default_threshold_pct(),
        }
    }
}

fn default_threshold_pct() -> f64 {
    crate::engine::anomaly::DEFAULT_THRESHOLD_PCT
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("ENERGY_CONFIG").unwrap_or_else(|_| "energy-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}
