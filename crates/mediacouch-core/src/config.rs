//! Configuration module
//!
//! Connection settings for the document database, the optional external file
//! store and the retry policy of the database client.

use std::env;

use crate::storage_types::FileStoreKind;

const DATABASE_NAME: &str = "media";
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const DB_MAX_RETRIES: u32 = 3;
const DB_RETRY_BASE_DELAY_MS: u64 = 100;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the database server; may embed credentials.
    pub database_url: String,
    pub database_name: String,
    /// Run the bootstrap procedure before serving operations.
    pub initialize_database: bool,
    /// `None` stores attachments inside the documents.
    pub file_store: Option<FileStoreKind>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub db_timeout_seconds: u64,
    /// Attempts after the first one when the database throttles a request.
    pub db_max_retries: u32,
    pub db_retry_base_delay_ms: u64,
}

impl Config {
    pub fn new(database_url: impl Into<String>, database_name: impl Into<String>) -> Self {
        Config {
            database_url: database_url.into(),
            database_name: database_name.into(),
            initialize_database: false,
            file_store: None,
            local_storage_path: None,
            local_storage_base_url: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            db_max_retries: DB_MAX_RETRIES,
            db_retry_base_delay_ms: DB_RETRY_BASE_DELAY_MS,
        }
    }

    pub fn with_initialize_database(mut self, initialize: bool) -> Self {
        self.initialize_database = initialize;
        self
    }

    pub fn with_local_file_store(
        mut self,
        path: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        self.file_store = Some(FileStoreKind::Local);
        self.local_storage_path = Some(path.into());
        self.local_storage_base_url = Some(base_url.into());
        self
    }

    pub fn with_s3_file_store(
        mut self,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        self.file_store = Some(FileStoreKind::S3);
        self.s3_bucket = Some(bucket.into());
        self.s3_region = Some(region.into());
        self.s3_endpoint = endpoint;
        self
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source (environment, test maps).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let file_store = match lookup("FILE_STORE") {
            None => None,
            Some(value) if value.trim().is_empty() || value.eq_ignore_ascii_case("none") => None,
            Some(value) => Some(value.parse::<FileStoreKind>()?),
        };

        let config = Config {
            database_url,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| DATABASE_NAME.to_string()),
            initialize_database: lookup("INITIALIZE_DATABASE")
                .map(|v| v.trim().to_lowercase())
                .map(|v| v == "true" || v == "1" || v == "yes")
                .unwrap_or(false),
            file_store,
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL"),
            s3_bucket: lookup("S3_BUCKET"),
            s3_region: lookup("S3_REGION"),
            s3_endpoint: lookup("S3_ENDPOINT"),
            aws_region: lookup("AWS_REGION"),
            db_timeout_seconds: lookup("DB_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            db_max_retries: lookup("DB_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_MAX_RETRIES),
            db_retry_base_delay_ms: lookup("DB_RETRY_BASE_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_RETRY_BASE_DELAY_MS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("DATABASE_URL must not be empty"));
        }

        validate_database_name(&self.database_name)?;

        match self.file_store {
            Some(FileStoreKind::Local) => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set for the local file store"
                    ));
                }
            }
            Some(FileStoreKind::S3) => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!("S3_BUCKET must be set for the s3 file store"));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set for the s3 file store"
                    ));
                }
            }
            None => {}
        }

        Ok(())
    }
}

/// Database names start with a lowercase letter and continue with
/// lowercase letters, digits or any of `_$()+-/`.
pub fn validate_database_name(name: &str) -> Result<(), anyhow::Error> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid database name '{}': must start with a lowercase letter",
                name
            ))
        }
    }
    if let Some(bad) = chars.find(|c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(*c))
    }) {
        return Err(anyhow::anyhow!(
            "Invalid database name '{}': character '{}' is not allowed",
            name,
            bad
        ));
    }
    Ok(())
}
