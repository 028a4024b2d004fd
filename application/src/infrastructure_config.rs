use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::error::{AppError, AppResult};

/// Interval between cycle starts: 30·(1+√5) ≈ 97.08 s, deliberately
/// dissonant with the upstream's 30-second refresh period.
#[must_use]
pub fn default_cycle_interval_secs() -> f64 {
    30.0 * (1.0 + 5.0_f64.sqrt())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub nest: NestConfig,
    pub upstream: UpstreamConfig,
    pub engine: EngineLoopConfig,
    pub queue: QueueConfig,
    pub db: DbConfig,
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
}

/// The nest is the root directory under which all persistent state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Tile URL template with `{x}` and `{y}` placeholders.
    pub url_template: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineLoopConfig {
    pub cycle_interval_secs: f64,
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub min_hottest_bucket: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub pool_size: u32,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_location: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nest: NestConfig {
                root: PathBuf::from("./nest"),
            },
            upstream: UpstreamConfig {
                url_template: "https://backend.wplace.live/files/s0/tiles/{x}/{y}.png"
                    .to_string(),
                connect_timeout_secs: 10,
                request_timeout_secs: 30,
            },
            engine: EngineLoopConfig {
                cycle_interval_secs: default_cycle_interval_secs(),
                max_consecutive_failures: 3,
            },
            queue: QueueConfig {
                min_hottest_bucket: 5,
            },
            db: DbConfig {
                pool_size: 4,
                query_timeout_secs: 5,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: false,
            },
            environment: EnvironmentConfig {
                env: "development".to_string(),
            },
        }
    }
}

impl Config {
    pub fn validate(&self) -> AppResult<()> {
        if self.nest.root.as_os_str().is_empty() {
            return Err(AppError::Config {
                message: "nest root cannot be empty".to_string(),
            });
        }

        if !self.upstream.url_template.contains("{x}")
            || !self.upstream.url_template.contains("{y}")
        {
            return Err(AppError::Config {
                message: "upstream url_template must contain {x} and {y} placeholders"
                    .to_string(),
            });
        }

        if url::Url::parse(&self.upstream.url_template.replace(['{', '}'], "")).is_err() {
            return Err(AppError::Config {
                message: "upstream url_template is not a valid URL".to_string(),
            });
        }

        if self.upstream.connect_timeout_secs == 0 || self.upstream.request_timeout_secs == 0 {
            return Err(AppError::Config {
                message: "upstream timeouts must be greater than 0".to_string(),
            });
        }

        if self.engine.cycle_interval_secs <= 0.0 {
            return Err(AppError::Config {
                message: "cycle_interval_secs must be greater than 0".to_string(),
            });
        }

        if self.engine.max_consecutive_failures == 0 {
            return Err(AppError::Config {
                message: "max_consecutive_failures must be greater than 0".to_string(),
            });
        }

        if self.queue.min_hottest_bucket == 0 {
            return Err(AppError::Config {
                message: "min_hottest_bucket must be greater than 0".to_string(),
            });
        }

        if self.db.pool_size == 0 {
            return Err(AppError::Config {
                message: "db pool_size must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// SQLite database file inside the nest.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.nest.root.join("data").join("pixel-hawk.db")
    }

    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            cycle_interval: Duration::from_secs_f64(self.engine.cycle_interval_secs),
            max_consecutive_failures: self.engine.max_consecutive_failures,
            min_hottest_bucket: self.queue.min_hottest_bucket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_interval_is_off_phase_with_upstream() {
        let interval = default_cycle_interval_secs();
        assert!((interval - 97.082_039).abs() < 1e-5);
        // never a whole multiple of the upstream's 30 s period
        assert!((interval / 30.0).fract() > 0.01);
    }

    #[test]
    fn rejects_template_without_placeholders() {
        let mut config = Config::default();
        config.upstream.url_template = "https://example.com/tiles.png".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn database_path_lives_under_nest() {
        let mut config = Config::default();
        config.nest.root = PathBuf::from("/srv/hawk");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/hawk/data/pixel-hawk.db")
        );
    }
}
