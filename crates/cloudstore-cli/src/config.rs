//! Settings loading
//!
//! Store settings come from an optional TOML (or JSON/YAML) file, overlaid
//! with `CLOUDSTORE__*` environment variables, where `__` separates nested
//! keys (e.g. `CLOUDSTORE__DEFAULT_BUCKET`).

use cloudstore_client::StoreSettings;
use std::path::Path;
use thiserror::Error;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "CLOUDSTORE";

/// Default settings file name, looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "cloudstore.toml";

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("settings file not found: {0}")]
    Missing(String),
}

/// Load settings from `path` (or the default file when present) plus the environment
pub fn load_settings(path: Option<&Path>) -> Result<StoreSettings, SettingsError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(SettingsError::Missing(path.display().to_string()));
            }
            builder = builder.add_source(config::File::from(path));
        }
        None => {
            builder = builder
                .add_source(config::File::with_name(DEFAULT_SETTINGS_FILE).required(false));
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<StoreSettings>()?;

    tracing::debug!(
        profiles = settings.connections.len(),
        default_bucket = ?settings.default_bucket,
        "loaded settings"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_toml_profiles() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
default_bucket = "results"
file_encryption_key = "file-secret"
allowed_buckets = ["results", "uploads"]

[connections.S3_DEFAULT]
host = "s3.store.com"
host_suffix = "/v1"
access_key = "AKID"
secret_key = "secret"

[connections.S3_UPLOAD]
host = "proxy.store.com"
object_service = "tests3"
client_id = "abc"
client_secret = "abcd"
upstream_host = "s3.store.com"

[uploader]
bucket = "assets"
"#
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.default_bucket.as_deref(), Some("results"));
        assert_eq!(settings.allowed_buckets.len(), 2);

        let direct = settings.connection("S3_DEFAULT").unwrap();
        assert_eq!(direct.host_suffix, "/v1");
        assert!(!direct.is_proxied());

        let proxied = settings.connection("S3_UPLOAD").unwrap();
        assert!(proxied.is_proxied());
        assert_eq!(proxied.object_service_name(), "tests3");
        assert_eq!(settings.uploader.bucket.as_deref(), Some("assets"));
        assert_eq!(settings.uploader.connection_profile, "S3_UPLOAD");
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = load_settings(Some(Path::new("/nonexistent/cloudstore.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Missing(_)));
    }
}
