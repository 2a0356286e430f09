use serde::Deserialize;
use settlement_core::config as core_config;
use settlement_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    pub worker: WorkerConfig,
    pub profiles: ProfilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// When unset the service falls back to the in-process store.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub profile_ttl_seconds: u64,
    pub job_ttl_seconds: u64,
}

impl CacheConfig {
    pub fn profile_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_ttl_seconds)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Max rows for the synchronous no-profile batch endpoint.
    pub sync_batch_max: usize,
    /// Max rows for the synchronous profile-aware batch endpoint.
    pub sync_batch_profile_max: usize,
    /// Max rows accepted by the asynchronous job pipeline.
    pub async_batch_max_rows: usize,
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub worker_count: usize,
    pub queue_size: usize,
    /// Per-row time assumption used for completion estimates.
    pub per_row_estimate_ms: u64,
    /// Optional per-row pacing; keeps a large job from starving the runtime.
    pub row_throttle_ms: u64,
}

impl WorkerConfig {
    pub fn row_throttle(&self) -> Option<Duration> {
        (self.row_throttle_ms > 0).then(|| Duration::from_millis(self.row_throttle_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesConfig {
    /// Optional JSON file of dealer profiles loaded at startup.
    pub seed_path: Option<String>,
}

impl SettlementConfig {
    pub fn load() -> Result<Self, AppError> {
        // Common config handles .env and the APP__ prefix.
        let common_config = core_config::Config::load()?;

        let is_prod = common_config.environment.is_prod();

        Ok(SettlementConfig {
            common: common_config,
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok(),
            },
            cache: CacheConfig {
                profile_ttl_seconds: get_env("PROFILE_CACHE_TTL_SECONDS", Some("300"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("PROFILE_CACHE_TTL_SECONDS", e))?,
                job_ttl_seconds: get_env("JOB_TTL_SECONDS", Some("3600"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("JOB_TTL_SECONDS", e))?,
            },
            limits: LimitsConfig {
                sync_batch_max: get_env("SYNC_BATCH_MAX", Some("50"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("SYNC_BATCH_MAX", e))?,
                sync_batch_profile_max: get_env("SYNC_BATCH_PROFILE_MAX", Some("100"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("SYNC_BATCH_PROFILE_MAX", e))?,
                async_batch_max_rows: get_env("ASYNC_BATCH_MAX_ROWS", Some("10000"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("ASYNC_BATCH_MAX_ROWS", e))?,
                rate_limit_per_minute: get_env("RATE_LIMIT_PER_MINUTE", Some("120"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("RATE_LIMIT_PER_MINUTE", e))?,
            },
            worker: WorkerConfig {
                enabled: get_env("WORKER_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("WORKER_ENABLED", e))?,
                worker_count: get_env("WORKER_COUNT", Some("4"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("WORKER_COUNT", e))?,
                queue_size: get_env("WORKER_QUEUE_SIZE", Some("64"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("WORKER_QUEUE_SIZE", e))?,
                per_row_estimate_ms: get_env("PER_ROW_ESTIMATE_MS", Some("5"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("PER_ROW_ESTIMATE_MS", e))?,
                row_throttle_ms: get_env("ROW_THROTTLE_MS", Some("0"), is_prod)?
                    .parse()
                    .map_err(|e| config_parse_error("ROW_THROTTLE_MS", e))?,
            },
            profiles: ProfilesConfig {
                seed_path: env::var("PROFILE_SEED_PATH").ok(),
            },
        })
    }
}

fn config_parse_error(key: &str, err: impl std::fmt::Display) -> AppError {
    AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, err))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
