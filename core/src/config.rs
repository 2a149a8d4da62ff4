//! Process configuration, loaded once at startup from the environment (with
//! an optional `.env` file underneath it, same discovery the teacher's
//! `arg0` crate does via `dotenvy`). Parse failures are fatal: a malformed
//! value is never silently defaulted.

use std::env;
use std::time::Duration;

use judge_protocol::submission::SandboxLimits;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is set but could not be parsed: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub prefix: String,
}

impl RedisConfig {
    pub fn queue_key(&self) -> String {
        format!("{}_submission_queue", self.prefix)
    }

    pub fn failed_key(&self) -> String {
        format!("{}_failed_jobs", self.prefix)
    }

    pub fn workers_key(&self) -> String {
        format!("{}_workers", self.prefix)
    }

    pub fn completed_channel(&self) -> String {
        format!("{}_submission_completed", self.prefix)
    }

    pub fn connection_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct SandboxDefaults {
    pub limits: SandboxLimits,
    pub max_additional_files: u32,
    pub max_additional_files_size: u64,
}

/// Governs the per-client-IP token bucket the HTTP layer enforces on every
/// request (§6, `RATE_LIMIT_*`).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub worker_concurrency: u32,
    pub sandbox_defaults: SandboxDefaults,
    pub wait_mode_timeout: Duration,
    pub scratch_dir: std::path::PathBuf,
    pub http_bind_addr: String,
    pub rate_limit: RateLimitConfig,
}

fn env_var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env_var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw.clone())),
    }
}

impl Config {
    /// Loads `.env` (if present) into the process environment, then parses
    /// every recognized variable. Called once, at process start.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = match env_var("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = env_var("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
                let port: u16 = parse_env("POSTGRES_PORT", 5432)?;
                let db = env_var("POSTGRES_DB").unwrap_or_else(|| "judge".to_string());
                let user = env_var("POSTGRES_USER").unwrap_or_else(|| "judge".to_string());
                let password = env_var("POSTGRES_PASSWORD").unwrap_or_default();
                format!("postgres://{user}:{password}@{host}:{port}/{db}")
            }
        };

        let redis = RedisConfig {
            host: env_var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_env("REDIS_PORT", 6379)?,
            prefix: env_var("REDIS_PREFIX").unwrap_or_else(|| "judge".to_string()),
        };

        let limits = SandboxLimits {
            cpu_time_limit: parse_env("SANDBOX_CPU_TIME_LIMIT", 2.0)?,
            cpu_extra_time: parse_env("SANDBOX_CPU_EXTRA_TIME", 0.5)?,
            wall_time_limit: parse_env("SANDBOX_WALL_TIME_LIMIT", 5.0)?,
            memory_limit: parse_env("SANDBOX_MEMORY_LIMIT", 128_000)?,
            max_processes_and_or_threads: parse_env("SANDBOX_MAX_PROCESSES", 128)?,
            max_file_size: parse_env("SANDBOX_MAX_FILE_SIZE", 10_240)?,
            number_of_runs: parse_env("SANDBOX_NUMBER_OF_RUNS", 1)?,
            enable_per_process_and_thread_time_limit: parse_env("SANDBOX_ENABLE_PER_PROCESS_TIME_LIMIT", false)?,
            enable_per_process_and_thread_memory_limit: parse_env(
                "SANDBOX_ENABLE_PER_PROCESS_MEMORY_LIMIT",
                false,
            )?,
            redirect_stderr_to_stdout: parse_env("SANDBOX_REDIRECT_STDERR_TO_STDOUT", false)?,
            enable_network: parse_env("SANDBOX_ENABLE_NETWORK", false)?,
        };

        let sandbox_defaults = SandboxDefaults {
            limits,
            max_additional_files: parse_env("SANDBOX_MAX_ADDITIONAL_FILES", 10)?,
            max_additional_files_size: parse_env("SANDBOX_MAX_ADDITIONAL_FILES_SIZE", 2_048)?,
        };

        let wait_mode_timeout_ms: u64 = parse_env("WAIT_MODE_TIMEOUT_MS", 15_000)?;

        let rate_limit = RateLimitConfig {
            enabled: parse_env("RATE_LIMIT_ENABLED", true)?,
            requests_per_second: parse_env("RATE_LIMIT_REQUESTS_PER_SECOND", 10)?,
            burst: parse_env("RATE_LIMIT_BURST", 20)?,
        };

        Ok(Config {
            database: DatabaseConfig { url: database_url },
            redis,
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 4)?,
            sandbox_defaults,
            wait_mode_timeout: Duration::from_millis(wait_mode_timeout_ms),
            scratch_dir: env_var("SCRATCH_DIR")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            http_bind_addr: env_var("HTTP_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:2358".to_string()),
            rate_limit,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        for (key, _) in env::vars() {
            if key.starts_with("SANDBOX_") || key.starts_with("POSTGRES_") || key.starts_with("REDIS_") {
                unsafe { env::remove_var(key) };
            }
        }
        unsafe { env::remove_var("DATABASE_URL") };
        unsafe { env::remove_var("WORKER_CONCURRENCY") };

        let config = Config::from_env().unwrap();
        assert_eq!(config.worker_concurrency, 4);
        assert_eq!(config.sandbox_defaults.limits.cpu_time_limit, 2.0);
        assert_eq!(config.redis.queue_key(), "judge_submission_queue");
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_second, 10);
    }

    #[test]
    fn malformed_value_is_a_fatal_parse_error() {
        unsafe { env::set_var("WORKER_CONCURRENCY", "not-a-number") };
        let result = Config::from_env();
        unsafe { env::remove_var("WORKER_CONCURRENCY") };
        assert!(matches!(result, Err(ConfigError::Invalid("WORKER_CONCURRENCY", _))));
    }
}
