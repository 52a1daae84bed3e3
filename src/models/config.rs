//! Configuration model loaded from external sources.

use std::path::Path;

use config::Config;
use serde::Deserialize;
use validator::Validate;

const DEFAULT_ROOT_FOLDER: &str = "Customer Upload";
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";
const DEFAULT_ROOT_URL: &str = "https://www.googleapis.com/";

#[derive(Clone, Debug, Deserialize)]
/// Basic configuration shared across handlers.
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Origins allowed to post to the upload endpoint from a browser.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub drive: DriveConfig,
}

/// Which provider backs the upload endpoint.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DriveBackend {
    #[default]
    Google,
    Memory,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub backend: DriveBackend,
    /// Folder holding the numbered upload batches.
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
    #[serde(default)]
    pub google: GoogleDriveConfig,
}

/// OAuth client and endpoints for the Google Drive backend.
#[derive(Clone, Deserialize, Validate)]
pub struct GoogleDriveConfig {
    #[validate(length(min = 1))]
    #[serde(default)]
    pub client_id: String,
    #[validate(length(min = 1))]
    #[serde(default)]
    pub client_secret: String,
    #[validate(url)]
    #[serde(default)]
    pub redirect_uri: String,
    #[validate(length(min = 1))]
    #[serde(default)]
    pub refresh_token: String,
    /// Drive v3 API prefix, ending in `/`.
    #[validate(url)]
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Host prefix for media uploads (`upload/drive/v3/...` is appended).
    #[validate(url)]
    #[serde(default = "default_root_url")]
    pub root_url: String,
}

impl Default for GoogleDriveConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            refresh_token: String::new(),
            base_url: default_base_url(),
            root_url: default_root_url(),
        }
    }
}

impl std::fmt::Debug for GoogleDriveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &"***")
            .field("base_url", &self.base_url)
            .field("root_url", &self.root_url)
            .finish()
    }
}

fn default_root_folder() -> String {
    DEFAULT_ROOT_FOLDER.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_root_url() -> String {
    DEFAULT_ROOT_URL.to_string()
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load settings")]
    Load(#[from] config::ConfigError),
    #[error("invalid google drive credentials: {0}")]
    Credentials(#[from] validator::ValidationErrors),
}

impl ServerConfig {
    /// Layer `default.yaml`, an optional `{app_env}.yaml` and `APP_*`
    /// environment variables (`__` separates nested keys).
    pub fn load(config_dir: &Path, app_env: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::from(config_dir.join("default")))
            .add_source(config::File::from(config_dir.join(app_env)).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let server_config = settings.try_deserialize::<ServerConfig>()?;
        server_config.validate()?;
        Ok(server_config)
    }

    /// Credentials are only required when the Google backend is selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drive.backend == DriveBackend::Google {
            self.drive.google.validate()?;
        }
        Ok(())
    }
}
