//! Configuration module
//!
//! Configuration is read from the environment (after loading `.env` with `dotenvy`)
//! into `TranscoderConfig`, wrapped by `Config` which exposes convenience getters.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::StreamFormat;
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 2048;
const SIGNED_URL_TTL_SECS: u64 = 3600;
const JOB_QUEUE_SIZE: usize = 1000;
const MAX_CONCURRENT_JOBS: usize = 2;
const ENCODE_TIMEOUT_SECS: u64 = 3600;
const PROBE_TIMEOUT_SECS: u64 = 60;
const VISIBILITY_MAX_ATTEMPTS: u32 = 5;
const VISIBILITY_RETRY_DELAY_SECS: u64 = 10;

/// Server and database settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

/// Blob store selection and credentials
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, etc.)
    pub gcs_service_account_path: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// Base for predicted public URLs; derived from the backend when unset.
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    /// Base URL that public object URLs are built from.
    pub fn resolved_public_base_url(&self) -> Option<String> {
        if let Some(base) = &self.public_base_url {
            return Some(base.trim_end_matches('/').to_string());
        }
        match self.backend {
            StorageBackend::Gcs => self
                .bucket
                .as_ref()
                .map(|bucket| format!("https://storage.googleapis.com/{}", bucket)),
            StorageBackend::S3 => {
                let bucket = self.bucket.as_ref()?;
                match &self.s3_endpoint {
                    Some(endpoint) => {
                        Some(format!("{}/{}", endpoint.trim_end_matches('/'), bucket))
                    }
                    None => {
                        let region = self.s3_region.as_deref().unwrap_or("us-east-1");
                        Some(format!("https://{}.s3.{}.amazonaws.com", bucket, region))
                    }
                }
            }
            StorageBackend::Local => self
                .local_storage_base_url
                .as_ref()
                .map(|base| base.trim_end_matches('/').to_string()),
        }
    }
}

/// Settings consumed by the job orchestrator and the encoder.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub encode_timeout: Duration,
    pub probe_timeout: Duration,
    pub staging_dir: PathBuf,
    pub visibility_max_attempts: u32,
    pub visibility_retry_delay: Duration,
    pub delete_source_after_publish: bool,
    /// Formats encoded per asset, in order.
    pub target_formats: Vec<StreamFormat>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            encode_timeout: Duration::from_secs(ENCODE_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            staging_dir: env::temp_dir().join("packetized-staging"),
            visibility_max_attempts: VISIBILITY_MAX_ATTEMPTS,
            visibility_retry_delay: Duration::from_secs(VISIBILITY_RETRY_DELAY_SECS),
            delete_source_after_publish: true,
            target_formats: StreamFormat::ALL.to_vec(),
        }
    }
}

/// Full service configuration
#[derive(Clone, Debug)]
pub struct TranscoderConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub max_upload_size_bytes: usize,
    pub signed_url_ttl: Duration,
    pub job_queue_size: usize,
    pub max_concurrent_jobs: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<TranscoderConfig>);

impl Config {
    fn inner(&self) -> &TranscoderConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.inner().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = TranscoderConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.inner().storage
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.inner().pipeline
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().max_upload_size_bytes
    }

    pub fn signed_url_ttl(&self) -> Duration {
        self.inner().signed_url_ttl
    }

    pub fn job_queue_size(&self) -> usize {
        self.inner().job_queue_size
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.inner().max_concurrent_jobs
    }
}

/// Read `name` and parse it, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|value| {
            matches!(
                value.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

/// Parse a comma separated list such as `HLS,DASH`, keeping order and dropping duplicates.
pub fn parse_target_formats(value: &str) -> Result<Vec<StreamFormat>, anyhow::Error> {
    let mut formats = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let format: StreamFormat = item.to_uppercase().parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}

impl TranscoderConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Gcs,
        };

        let storage = StorageConfig {
            backend,
            bucket: env::var("STORAGE_BUCKET")
                .or_else(|_| env::var("GCS_BUCKET"))
                .or_else(|_| env::var("S3_BUCKET"))
                .ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            gcs_service_account_path: env::var("GOOGLE_SERVICE_ACCOUNT_PATH")
                .or_else(|_| env::var("GOOGLE_APPLICATION_CREDENTIALS"))
                .ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            public_base_url: env::var("PUBLIC_BASE_URL").ok(),
        };

        let defaults = PipelineConfig::default();
        let target_formats = match env::var("TARGET_FORMATS") {
            Ok(value) => parse_target_formats(&value)?,
            Err(_) => defaults.target_formats.clone(),
        };

        let pipeline = PipelineConfig {
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            encode_timeout: Duration::from_secs(env_or(
                "ENCODE_TIMEOUT_SECS",
                ENCODE_TIMEOUT_SECS,
            )),
            probe_timeout: Duration::from_secs(env_or("PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS)),
            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            visibility_max_attempts: env_or("VISIBILITY_MAX_ATTEMPTS", VISIBILITY_MAX_ATTEMPTS),
            visibility_retry_delay: Duration::from_secs(env_or(
                "VISIBILITY_RETRY_DELAY_SECS",
                VISIBILITY_RETRY_DELAY_SECS,
            )),
            delete_source_after_publish: env_bool(
                "DELETE_SOURCE_AFTER_PUBLISH",
                defaults.delete_source_after_publish,
            ),
            target_formats,
        };

        Ok(TranscoderConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage,
            pipeline,
            max_upload_size_bytes: env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB) * 1024 * 1024,
            signed_url_ttl: Duration::from_secs(env_or("SIGNED_URL_TTL_SECS", SIGNED_URL_TTL_SECS)),
            job_queue_size: env_or("JOB_QUEUE_SIZE", JOB_QUEUE_SIZE),
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", MAX_CONCURRENT_JOBS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage.backend {
            StorageBackend::Gcs | StorageBackend::S3 => {
                if self.storage.bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BUCKET must be set when using {} storage backend",
                        self.storage.backend
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.storage.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.pipeline.visibility_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "VISIBILITY_MAX_ATTEMPTS must be at least 1"
            ));
        }
        if self.pipeline.target_formats.is_empty() {
            return Err(anyhow::anyhow!("TARGET_FORMATS must name at least one format"));
        }
        if self.max_concurrent_jobs == 0 || self.job_queue_size == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_JOBS and JOB_QUEUE_SIZE must be greater than zero"
            ));
        }
        if self.pipeline.encode_timeout.is_zero() {
            return Err(anyhow::anyhow!("ENCODE_TIMEOUT_SECS must be greater than zero"));
        }
        if self.pipeline.probe_timeout.is_zero() {
            return Err(anyhow::anyhow!("PROBE_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(())
    }
}
