use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "models/star_type_pipeline.json";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://star-type.streamlit.app";
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Fitted predictor artifact, loaded once before the server binds.
    pub model_path: PathBuf,
    /// Origins allowed to call the API from a browser.
    pub allowed_origins: Vec<String>,
    /// Upper bound for JSON request bodies. Bulk uploads are not limited.
    pub max_payload_size: usize,
    pub log_level: log::LevelFilter,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            log_level: log::LevelFilter::Info,
        }
    }
}

impl ServerConfig {
    /// Normalizes origins (trailing `/` removed) and checks every field.
    pub fn validated(mut self) -> ConfigResult<Self> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "host".to_string(),
            });
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "model_path".to_string(),
            });
        }
        if self.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        self.allowed_origins = self
            .allowed_origins
            .into_iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if let Some(bad) = self
            .allowed_origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(ConfigError::InvalidValue {
                field: "allowed_origins".to_string(),
                value: bad.clone(),
                reason: "origin must start with http:// or https://".to_string(),
            });
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default().validated().unwrap();
        assert_eq!(config.allowed_origins, vec![DEFAULT_ALLOWED_ORIGIN]);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_origins_are_normalized() {
        let config = ServerConfig {
            allowed_origins: vec![
                "https://star-type.streamlit.app/".to_string(),
                " http://localhost:8501 ".to_string(),
                "".to_string(),
            ],
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://star-type.streamlit.app", "http://localhost:8501"]
        );
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let err = ServerConfig {
            allowed_origins: vec!["star-type.streamlit.app".to_string()],
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "allowed_origins"));
    }

    #[test]
    fn test_zero_payload_size_is_rejected() {
        let err = ServerConfig {
            max_payload_size: 0,
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(err.to_string().contains("max_payload_size"));
    }

    #[test]
    fn test_empty_model_path_is_rejected() {
        let err = ServerConfig {
            model_path: PathBuf::new(),
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }
}
