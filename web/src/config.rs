//! Server configuration read from the environment.
//!
//! `.env` is loaded by the binary before [`ServerConfig::from_env`] runs, so
//! values there behave exactly like exported variables. Every variable is
//! optional; a value that is present but malformed is a startup error.

use datasift_processing::{CleaningPolicy, ConfigValidationError, PipelineConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Link from a report page to the cleaned CSV next to it.
pub const REPORT_DOWNLOAD_HREF: &str = "download";

/// Errors raised while reading the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Pipeline(#[from] ConfigValidationError),
}

/// Settings of the web shell plus the pipeline it drives.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        };

        let host = match var("HOST") {
            Some((key, value)) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value,
                reason: "expected an IP address",
            })?,
            None => DEFAULT_HOST,
        };

        let port = var("PORT").map(parse_number::<u16>).transpose()?;
        let max_upload_bytes = var("DATASIFT_MAX_UPLOAD_BYTES")
            .map(parse_number::<usize>)
            .transpose()?;

        let mut builder = PipelineConfig::builder()
            .report_download_href(REPORT_DOWNLOAD_HREF)
            .artifact_dir(
                var("DATASIFT_ARTIFACT_DIR")
                    .map(|(_, v)| PathBuf::from(v))
                    .unwrap_or_else(|| PathBuf::from("static")),
            );

        if let Some((_, dir)) = var("DATASIFT_UPLOAD_DIR") {
            builder = builder.upload_dir(dir);
        }

        if let Some(entry) = var("DATASIFT_CHUNK_SIZE") {
            let rows = parse_number::<usize>(entry)?;
            builder = builder.chunk_size((rows > 0).then_some(rows));
        }

        let defaults = CleaningPolicy::default();
        builder = builder.cleaning(CleaningPolicy {
            remove_duplicates: var("DATASIFT_REMOVE_DUPLICATES")
                .map(parse_flag)
                .transpose()?
                .unwrap_or(defaults.remove_duplicates),
            drop_missing_rows: var("DATASIFT_DROP_MISSING")
                .map(parse_flag)
                .transpose()?
                .unwrap_or(defaults.drop_missing_rows),
        });

        if let Some(entry) = var("DATASIFT_NAMESPACE_ARTIFACTS") {
            builder = builder.namespace_artifacts(parse_flag(entry)?);
        }

        if let Some(entry) = var("DATASIFT_FETCH_TIMEOUT_SECS") {
            builder = builder.fetch_timeout_secs(parse_number::<u64>(entry)?);
        }

        Ok(Self {
            host,
            port: port.unwrap_or(DEFAULT_PORT),
            max_upload_bytes: max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            pipeline: builder.build()?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(
    (key, value): (&'static str, String),
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value,
        reason: "expected a non-negative integer",
    })
}

fn parse_flag((key, value): (&'static str, String)) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 10000);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:10000");
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.pipeline.chunk_size, Some(5000));
        assert_eq!(config.pipeline.artifact_dir, PathBuf::from("static"));
        assert_eq!(
            config.pipeline.report_download_href.as_deref(),
            Some("download")
        );
        assert!(config.pipeline.cleaning.remove_duplicates);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("DATASIFT_CHUNK_SIZE", "0"),
            ("DATASIFT_REMOVE_DUPLICATES", "false"),
            ("DATASIFT_DROP_MISSING", "No"),
            ("DATASIFT_NAMESPACE_ARTIFACTS", "off"),
            ("DATASIFT_ARTIFACT_DIR", "/srv/artifacts"),
            ("DATASIFT_MAX_UPLOAD_BYTES", "1024"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.pipeline.chunk_size, None);
        assert!(!config.pipeline.cleaning.is_enabled());
        assert!(!config.pipeline.namespace_artifacts);
        assert_eq!(config.pipeline.artifact_dir, PathBuf::from("/srv/artifacts"));
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = from_pairs(&[("PORT", "  "), ("DATASIFT_CHUNK_SIZE", "")]).unwrap();
        assert_eq!(config.port, 10000);
        assert_eq!(config.pipeline.chunk_size, Some(5000));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = from_pairs(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));

        let err = from_pairs(&[("DATASIFT_DROP_MISSING", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("DATASIFT_DROP_MISSING"));

        let err = from_pairs(&[("DATASIFT_FETCH_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Pipeline(_)));
    }
}
