//! # Inventory Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKROOM_DB_PATH=/var/lib/stockroom/stockroom.db                  │
//! │     STOCKROOM_BALANCING_BATCH_SIZE=200                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockroom/stockroom.toml (Linux)                         │
//! │     ~/Library/Application Support/com.stockroom.stockroom/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # stockroom.toml
//! [database]
//! path = "stockroom.db"
//! max_connections = 5
//!
//! [balancing]
//! batch_size = 50
//!
//! [counts]
//! default_lead_hours = 24
//!
//! [items]
//! valuation_method = "fifo"
//! item_type = "material"
//! unit_of_measure = "unit"
//! ```
//!
//! The variance epsilon is not configurable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use stockroom_core::{ValuationMethod, DEFAULT_BALANCING_BATCH_SIZE, DEFAULT_CYCLE_COUNT_LEAD_HOURS};
use stockroom_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Run embedded migrations on connect.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("stockroom.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Balancing / Count Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancingSettings {
    /// Items per keyset page in a tenant-wide run.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_batch_size() -> u32 {
    DEFAULT_BALANCING_BATCH_SIZE
}

impl Default for BalancingSettings {
    fn default() -> Self {
        BalancingSettings {
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountSettings {
    /// How far out a cycle count is scheduled when no time is given.
    #[serde(default = "default_lead_hours")]
    pub default_lead_hours: i64,
}

fn default_lead_hours() -> i64 {
    DEFAULT_CYCLE_COUNT_LEAD_HOURS
}

impl Default for CountSettings {
    fn default() -> Self {
        CountSettings {
            default_lead_hours: default_lead_hours(),
        }
    }
}

// =============================================================================
// Item Defaults
// =============================================================================

/// Values stamped on items created lazily from a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefaults {
    #[serde(default)]
    pub valuation_method: ValuationMethod,

    #[serde(default = "default_item_type")]
    pub item_type: String,

    /// Used when the product carries no unit.
    #[serde(default = "default_unit_of_measure")]
    pub unit_of_measure: String,
}

fn default_item_type() -> String {
    "material".to_string()
}

fn default_unit_of_measure() -> String {
    "unit".to_string()
}

impl Default for ItemDefaults {
    fn default() -> Self {
        ItemDefaults {
            valuation_method: ValuationMethod::default(),
            item_type: default_item_type(),
            unit_of_measure: default_unit_of_measure(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub balancing: BalancingSettings,

    #[serde(default)]
    pub counts: CountSettings,

    #[serde(default)]
    pub items: ItemDefaults,
}

impl InventoryConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stockroom.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading inventory config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load inventory config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Inventory config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if self.balancing.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "balancing.batch_size must be greater than 0".into(),
            ));
        }

        if self.counts.default_lead_hours <= 0 {
            return Err(ConfigError::Invalid(
                "counts.default_lead_hours must be greater than 0".into(),
            ));
        }

        if self.items.item_type.trim().is_empty() || self.items.unit_of_measure.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "items.item_type and items.unit_of_measure must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOCKROOM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("STOCKROOM_DB_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.database.max_connections = m;
            }
        }

        if let Ok(size) = std::env::var("STOCKROOM_BALANCING_BATCH_SIZE") {
            if let Ok(s) = size.parse::<u32>() {
                debug!(batch_size = s, "Overriding balancing batch size from environment");
                self.balancing.batch_size = s;
            }
        }

        if let Ok(hours) = std::env::var("STOCKROOM_COUNT_LEAD_HOURS") {
            if let Ok(h) = hours.parse::<i64>() {
                self.counts.default_lead_hours = h;
            }
        }

        if let Ok(method) = std::env::var("STOCKROOM_VALUATION_METHOD") {
            match method.parse::<ValuationMethod>() {
                Ok(parsed) => self.items.valuation_method = parsed,
                Err(e) => warn!(method = %method, "{}", e),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockroom", "stockroom")
            .map(|dirs| dirs.config_dir().join("stockroom.toml"))
    }

    /// Pool settings for [`stockroom_db::Database::new`].
    pub fn to_db_config(&self) -> DbConfig {
        let config = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path)
                .max_connections(self.database.max_connections)
                .min_connections(self.database.min_connections)
        };
        config
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .run_migrations(self.database.run_migrations)
    }
}
