use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::studio::generator::ImageModels;
use crate::studio::location::valid_coordinates;
use crate::studio::pipeline::Models;
use crate::studio::types::Coordinates;

/// Environment variables checked for a key, in order.
pub const KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    /// Gemini API key. Falls back to GEMINI_API_KEY / API_KEY.
    api_key: Option<String>,
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    models: ModelsFile,
    /// Directory for logs. Defaults to current directory.
    data_dir: Option<String>,
    /// Where exported images go. Defaults to `<data_dir>/images`.
    output_dir: Option<String>,
    /// Max history entries kept in a session (unset = unbounded).
    history_capacity: Option<usize>,
    /// Fixed coordinates for maps grounding.
    location: Option<LocationFile>,
    /// IP geolocation endpoint used when no fixed location is set.
    location_endpoint: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelsFile {
    text: Option<String>,
    maps: Option<String>,
    image: Option<String>,
    image_hq: Option<String>,
}

#[derive(Deserialize)]
struct LocationFile {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Raw key text; the credential gate decides whether it is usable.
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
    pub models: Models,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub history_capacity: Option<usize>,
    pub location: Option<Coordinates>,
    pub location_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default()).expect("default config is valid")
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadFile { path: path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: path.clone(), source: e })?;
        Self::from_file(file)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let timeout_secs = file.request_timeout_secs.unwrap_or(120);
        if timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be greater than 0".into()));
        }

        let location = match file.location {
            Some(LocationFile { latitude, longitude }) => {
                if !valid_coordinates(latitude, longitude) {
                    return Err(ConfigError::Validation(format!(
                        "location out of range: latitude {latitude}, longitude {longitude}"
                    )));
                }
                Some(Coordinates { latitude, longitude })
            }
            None => None,
        };

        let models = Models {
            text: model_name("models.text", file.models.text, "gemini-3-flash-preview")?,
            maps: model_name("models.maps", file.models.maps, "gemini-2.5-flash")?,
            image: ImageModels {
                standard: model_name("models.image", file.models.image, "gemini-2.5-flash-image")?,
                high_quality: model_name(
                    "models.image_hq",
                    file.models.image_hq,
                    "gemini-3-pro-image-preview",
                )?,
            },
        };

        let data_dir = file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        let output_dir = file
            .output_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("images"));

        Ok(Self {
            api_key: file.api_key,
            base_url: file
                .base_url
                .unwrap_or_else(|| crate::studio::gemini::DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            models,
            data_dir,
            output_dir,
            history_capacity: file.history_capacity,
            location,
            location_endpoint: file.location_endpoint.filter(|e| !e.trim().is_empty()),
        })
    }

    /// Key from the config file, else the first key environment variable set.
    pub fn raw_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| KEY_ENV_VARS.iter().find_map(|var| std::env::var(var).ok()))
    }
}

fn model_name(field: &str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    match value {
        Some(name) if name.trim().is_empty() => {
            Err(ConfigError::Validation(format!("{field} must not be empty")))
        }
        Some(name) => Ok(name.trim().to_string()),
        None => Ok(default.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let file = write_config("{}");
        let config = Config::load(file.path()).expect("should load empty config");
        assert_eq!(config.models.image.standard, "gemini-2.5-flash-image");
        assert_eq!(config.models.image.high_quality, "gemini-3-pro-image-preview");
        assert_eq!(config.models.text, "gemini-3-flash-preview");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.output_dir, PathBuf::from("./images"));
        assert!(config.history_capacity.is_none());
        assert!(config.location.is_none());
    }

    #[test]
    fn test_full_config() {
        let file = write_config(r#"{
            "api_key": "AIza-test",
            "base_url": "http://localhost:8080/v1beta",
            "request_timeout_secs": 30,
            "models": { "image_hq": "custom-pro" },
            "data_dir": "/tmp/cv",
            "history_capacity": 50,
            "location": { "latitude": 30.0444, "longitude": 31.2357 }
        }"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("AIza-test"));
        assert_eq!(config.raw_api_key().as_deref(), Some("AIza-test"));
        assert_eq!(config.base_url, "http://localhost:8080/v1beta");
        assert_eq!(config.models.image.high_quality, "custom-pro");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/cv/images"));
        assert_eq!(config.history_capacity, Some(50));
        assert_eq!(config.location.unwrap().latitude, 30.0444);
    }

    #[test]
    fn test_zero_timeout() {
        let file = write_config(r#"{ "request_timeout_secs": 0 }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_location_out_of_range() {
        let file = write_config(r#"{ "location": { "latitude": 120.0, "longitude": 31.0 } }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_blank_model_name() {
        let file = write_config(r#"{ "models": { "image": "  " } }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(err.to_string().contains("models.image"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{ "theme": "dark" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/path/config.json").unwrap();
        assert_eq!(config.base_url, crate::studio::gemini::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
